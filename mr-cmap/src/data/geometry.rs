//! 几何变换: 方向校正与水平切片居中裁剪/填充.

use ndarray::{s, Array3, ArrayView3, Axis};

use crate::{CmapError, CmapResult, Idx2d};

/// 在 (H, W) 平面内顺时针旋转 90 度, 深度轴不变.
///
/// 等价于 numpy 的 `rot90(v, -1)`: `out[i, j, k] = v[H - 1 - j, i, k]`,
/// 输出形状为 `(W, H, D)`. 源数据集的方向约定需要该校正.
pub fn rot90_cw(volume: Array3<f32>) -> Array3<f32> {
    let mut out = volume.permuted_axes([1, 0, 2]);
    out.invert_axis(Axis(1));
    out.as_standard_layout().into_owned()
}

/// 一个轴向上的 `(源起点, 目标起点, 长度)`.
///
/// 源较长时居中裁剪, 源较短时居中放置 (其余部分填 0).
#[inline]
fn span(src: usize, dst: usize) -> (usize, usize, usize) {
    if src >= dst {
        ((src - dst) / 2, 0, dst)
    } else {
        (0, (dst - src) / 2, src)
    }
}

/// 将每个水平切片居中裁剪或填充到 `target` 形状 `(h, w)`. 深度轴保持不变.
///
/// # 错误
///
/// `target` 的任一边长为 0, 或 `volume` 为空时返回 [`CmapError::Shape`].
pub fn crop_or_pad(volume: ArrayView3<f32>, target: Idx2d) -> CmapResult<Array3<f32>> {
    let (h, w, d) = volume.dim();
    let (th, tw) = target;
    if th == 0 || tw == 0 {
        return Err(CmapError::Shape(format!(
            "crop target must be non-empty, got {target:?}"
        )));
    }
    if h == 0 || w == 0 || d == 0 {
        return Err(CmapError::Shape(format!(
            "cannot crop an empty volume of shape {:?}",
            volume.dim()
        )));
    }

    let (src_h, dst_h, len_h) = span(h, th);
    let (src_w, dst_w, len_w) = span(w, tw);
    let mut out = Array3::zeros((th, tw, d));
    out.slice_mut(s![dst_h..dst_h + len_h, dst_w..dst_w + len_w, ..])
        .assign(&volume.slice(s![src_h..src_h + len_h, src_w..src_w + len_w, ..]));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp(shape: (usize, usize, usize)) -> Array3<f32> {
        let mut i = 0.0;
        Array3::from_shape_simple_fn(shape, || {
            i += 1.0;
            i
        })
    }

    #[test]
    fn test_rot90_cw() {
        // 2 x 3 平面:
        // 1 2 3
        // 4 5 6
        let v = ramp((2, 3, 1));
        let r = rot90_cw(v.clone());
        assert_eq!(r.dim(), (3, 2, 1));
        // 顺时针旋转后:
        // 4 1
        // 5 2
        // 6 3
        let expected = [[4.0, 1.0], [5.0, 2.0], [6.0, 3.0]];
        for (i, row) in expected.iter().enumerate() {
            for (j, &e) in row.iter().enumerate() {
                assert_eq!(r[[i, j, 0]], e);
                assert_eq!(r[[i, j, 0]], v[[2 - 1 - j, i, 0]]);
            }
        }
        assert!(r.is_standard_layout());

        // 旋转四次回到原样.
        let back = rot90_cw(rot90_cw(rot90_cw(r)));
        assert_eq!(back, v);
    }

    #[test]
    fn test_crop_center() {
        let v = ramp((6, 5, 2));
        let out = crop_or_pad(v.view(), (2, 3)).unwrap();
        assert_eq!(out.dim(), (2, 3, 2));
        // 高: (6 - 2) / 2 = 2; 宽: (5 - 3) / 2 = 1.
        assert_eq!(out.slice(s![.., .., ..]), v.slice(s![2..4, 1..4, ..]));
    }

    #[test]
    fn test_pad_center() {
        let v = Array3::<f32>::ones((2, 3, 4));
        let out = crop_or_pad(v.view(), (6, 3)).unwrap();
        assert_eq!(out.dim(), (6, 3, 4));
        assert_eq!(out.sum(), v.sum());
        assert!(out.slice(s![2..4, .., ..]).iter().all(|&x| x == 1.0));
        assert!(out.slice(s![..2, .., ..]).iter().all(|&x| x == 0.0));
        assert!(out.slice(s![4.., .., ..]).iter().all(|&x| x == 0.0));

        // 一轴裁剪, 一轴填充.
        let out = crop_or_pad(ramp((7, 2, 1)).view(), (3, 4)).unwrap();
        assert_eq!(out.dim(), (3, 4, 1));
        assert!(out.slice(s![.., 0, ..]).iter().all(|&x| x == 0.0));
        assert!(out.slice(s![.., 3, ..]).iter().all(|&x| x == 0.0));
        assert_eq!(out[[0, 1, 0]], 5.0);
    }

    #[test]
    fn test_crop_errors() {
        let v = Array3::<f32>::ones((4, 4, 4));
        assert!(matches!(
            crop_or_pad(v.view(), (0, 4)),
            Err(CmapError::Shape(_))
        ));
        let empty = Array3::<f32>::zeros((4, 4, 0));
        assert!(matches!(
            crop_or_pad(empty.view(), (2, 2)),
            Err(CmapError::Shape(_))
        ));
    }
}
