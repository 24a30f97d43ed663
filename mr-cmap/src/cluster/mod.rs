//! 参数聚类: 将多对比度体数据约简为约束图.
//!
//! 流程为 PCA 降维 → 全局 min-max 归一化 → 逐主成分 TV 去噪 → mini-batch K-means.
//! 每个体素的 T 维强度向量先被压缩为 P 维主成分, 空间上平滑后再聚类.

use log::{debug, info};
use ndarray::{Array3, Array4, ArrayViewD, Axis, Ix4};

use crate::consts::{DEFAULT_NUM_CLUSTER, DEFAULT_RETAINED_COMPONENTS, DEFAULT_SEED};
use crate::data::intensity::normalize;
use crate::{CmapError, CmapResult, ConstraintMap};

mod eigen;
pub mod kmeans;
pub mod pca;
pub mod tv;

pub use eigen::symmetric_eigen;
pub use kmeans::{KMeansModel, MiniBatchKMeans, MiniBatchParams};
pub use pca::Pca;
pub use tv::{denoise_channels, denoise_tv_chambolle, TvParams};

/// 聚类参数.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// 聚类个数 K.
    pub num_cluster: usize,

    /// 保留的主成分个数. 大于对比度个数时取对比度个数.
    pub retained_components: usize,

    /// 随机种子. 相同输入与相同种子给出相同的约束图.
    pub seed: u64,

    /// TV 去噪参数.
    pub tv: TvParams,

    /// mini-batch K-means 参数.
    pub kmeans: MiniBatchParams,

    /// 是否将第 0 个通道 `<= 0` 的背景体素的特征清零, 使背景聚为一类.
    pub mask_background: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            num_cluster: DEFAULT_NUM_CLUSTER,
            retained_components: DEFAULT_RETAINED_COMPONENTS,
            seed: DEFAULT_SEED,
            tv: TvParams::default(),
            kmeans: MiniBatchParams::default(),
            mask_background: false,
        }
    }
}

impl ClusterParams {
    /// 使用 `num_cluster` 个聚类, 其它参数取默认值.
    #[inline]
    pub fn new(num_cluster: usize) -> Self {
        Self {
            num_cluster,
            ..Self::default()
        }
    }
}

/// 由 `(H, W, D, T)` 形状的多对比度体数据生成约束图.
///
/// # 错误
///
/// 1. `volume` 不是 4D, 或为空时返回 [`CmapError::Shape`].
/// 2. `num_cluster` 或 `retained_components` 为 0 时返回 [`CmapError::InvalidParameter`].
pub fn generate_clusters(
    volume: ArrayViewD<f32>,
    params: &ClusterParams,
) -> CmapResult<ConstraintMap> {
    let shape = volume.shape().to_vec();
    let volume = volume.into_dimensionality::<Ix4>().map_err(|_| {
        CmapError::Shape(format!(
            "clustering needs a 4D (H, W, D, T) volume, got shape {shape:?}"
        ))
    })?;
    if volume.is_empty() {
        return Err(CmapError::Shape(format!(
            "cannot cluster an empty volume of shape {:?}",
            volume.dim()
        )));
    }
    if params.num_cluster == 0 {
        return Err(CmapError::InvalidParameter(
            "number of clusters must be positive".to_string(),
        ));
    }

    let (h, w, d, t) = volume.dim();
    let n = h * w * d;
    let samples = volume
        .as_standard_layout()
        .into_shape((n, t))?
        .to_owned();

    info!("Performing PCA on {n} voxels x {t} contrasts");
    let pca = Pca::fit(samples.view(), params.retained_components)?;
    debug!(
        "PCA explained variance ratio: {}",
        pca.explained_variance_ratio()
    );
    let reduced = pca.transform(samples.view())?;
    drop(samples);
    let p = reduced.ncols();
    let reduced = reduced.into_shape((h, w, d, p))?;

    let mut features: Array4<f32> = normalize(reduced.view());
    drop(reduced);

    info!("Denoising {p} principal components");
    denoise_channels(&mut features, &params.tv);

    if params.mask_background {
        let foreground = volume.index_axis(Axis(3), 0).mapv(|v| v > 0.0);
        for mut channel in features.axis_iter_mut(Axis(3)) {
            channel.zip_mut_with(&foreground, |f, &m| {
                if !m {
                    *f = 0.0;
                }
            });
        }
    }

    info!("Performing MiniBatchKMeans with {} clusters", params.num_cluster);
    let features = features.into_shape((n, p))?;
    let model = MiniBatchKMeans::new(params.num_cluster, params.kmeans, params.seed)
        .fit(features.view())?;
    let labels = model.predict(features.view());
    let labels: Array3<u32> = labels.into_shape((h, w, d))?;

    Ok(ConstraintMap::new(params.num_cluster, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    /// 左右两半强度不同的小体数据, 各通道强度比例不同.
    fn two_halves(h: usize, w: usize, d: usize, t: usize) -> Array4<f32> {
        Array4::from_shape_fn((h, w, d, t), |(_, j, _, c)| {
            let base = if j < w / 2 { 0.2 } else { 0.9 };
            base * (c + 1) as f32 / t as f32
        })
    }

    fn fast_params(num_cluster: usize) -> ClusterParams {
        ClusterParams {
            tv: TvParams::with_weight(0.1),
            ..ClusterParams::new(num_cluster)
        }
    }

    #[test]
    fn test_shape_invariant() {
        let vol = two_halves(8, 10, 3, 4);
        let map = generate_clusters(vol.view().into_dyn(), &fast_params(2)).unwrap();
        assert_eq!(map.shape(), (8, 10, 3));
        assert_eq!(map.num_cluster(), 2);
        assert!(map.labels().iter().all(|&l| l < 2));
        // 两半分属不同的类.
        assert_ne!(map[(0, 0, 0)], map[(0, 9, 0)]);
        assert_eq!(map.count(map[(0, 0, 0)]), 8 * 5 * 3);
    }

    #[test]
    fn test_rejects_non_4d() {
        let vol = Array::<f32, _>::zeros(IxDyn(&[4, 4, 4]));
        assert!(matches!(
            generate_clusters(vol.view(), &ClusterParams::default()),
            Err(CmapError::Shape(_))
        ));
        let empty = Array::<f32, _>::zeros(IxDyn(&[0, 4, 4, 2]));
        assert!(matches!(
            generate_clusters(empty.view(), &ClusterParams::default()),
            Err(CmapError::Shape(_))
        ));
        let vol = two_halves(2, 2, 1, 1);
        assert!(matches!(
            generate_clusters(vol.view().into_dyn(), &ClusterParams::new(0)),
            Err(CmapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let vol = Array4::from_shape_fn((6, 6, 2, 3), |(i, j, k, c)| {
            ((i * 31 + j * 17 + k * 7 + c * 3) % 13) as f32
        });
        let params = ClusterParams {
            seed: 3,
            ..fast_params(4)
        };
        let a = generate_clusters(vol.view().into_dyn(), &params).unwrap();
        let b = generate_clusters(vol.view().into_dyn(), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_cases() {
        // 保留的主成分多于对比度个数.
        let vol = two_halves(4, 6, 2, 2);
        let params = ClusterParams {
            retained_components: 8,
            ..fast_params(2)
        };
        let map = generate_clusters(vol.view().into_dyn(), &params).unwrap();
        assert_eq!(map.populated(), 2);

        // K 大于不同特征向量的个数. 不做去噪, 特征向量只有两种.
        let params = ClusterParams {
            tv: TvParams::with_weight(0.0),
            ..ClusterParams::new(5)
        };
        let map = generate_clusters(vol.view().into_dyn(), &params).unwrap();
        assert_eq!(map.num_cluster(), 5);
        assert!(map.populated() <= 2);
        assert!(map.labels().iter().all(|&l| l < 5));

        // 常数体数据只有一类.
        let flat = Array4::<f32>::from_elem((3, 3, 2, 2), 0.5);
        let map = generate_clusters(flat.view().into_dyn(), &fast_params(3)).unwrap();
        assert_eq!(map.populated(), 1);
    }

    #[test]
    fn test_mask_background() {
        // 第 0 个通道左半为 0 (背景); 背景内第 1 个通道有变化.
        let vol = Array4::from_shape_fn((6, 8, 2, 2), |(i, j, _, c)| match (c, j < 4) {
            (0, true) => 0.0,
            (0, false) => 1.0,
            (_, true) => (i % 2) as f32,
            (_, false) => 0.5,
        });
        let params = ClusterParams {
            mask_background: true,
            tv: TvParams::with_weight(0.0),
            ..ClusterParams::new(2)
        };
        let map = generate_clusters(vol.view().into_dyn(), &params).unwrap();
        let bg = map[(0, 0, 0)];
        for ((_, j, _), &l) in map.labels().indexed_iter() {
            assert_eq!(l == bg, j < 4);
        }
    }
}
