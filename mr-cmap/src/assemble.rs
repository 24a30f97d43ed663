//! 多对比度体数据组装.
//!
//! 对协议中的每个对比度依次执行: 加载 → 方向校正 → 居中裁剪/填充 → min-max 归一化 →
//! 基于脑掩膜的对比度拉伸, 最后沿末尾轴堆叠. 脑掩膜只由第一个对比度导出.

use log::{debug, info};
use ndarray::ArrayView3;

use crate::consts::{DEFAULT_LOWER_PERCENTILE, DEFAULT_OP_SHAPE, DEFAULT_UPPER_PERCENTILE};
use crate::data::geometry::{crop_or_pad, rot90_cw};
use crate::data::intensity::{brain_mask, contrast_stretch, normalize};
use crate::dataset::{ContrastProtocol, VolumeSource};
use crate::{BrainMask, CmapError, CmapResult, ContrastVolume, Idx2d, MultiContrastVolume};

/// 体数据组装器.
#[derive(Debug, Clone)]
pub struct Assembler {
    protocol: ContrastProtocol,
    target: Idx2d,
    lower_percentile: f64,
    upper_percentile: f64,
}

impl Default for Assembler {
    /// BraTS 协议, 目标形状 `(160, 160)`, 百分位 `(0.01, 99.9)`.
    fn default() -> Self {
        Self::new(
            ContrastProtocol::brats(),
            (DEFAULT_OP_SHAPE, DEFAULT_OP_SHAPE),
        )
    }
}

impl Assembler {
    /// 使用默认百分位创建组装器. 每个水平切片将被裁剪/填充到 `target`.
    pub fn new(protocol: ContrastProtocol, target: Idx2d) -> Self {
        Self {
            protocol,
            target,
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
        }
    }

    /// 更换对比度拉伸的百分位.
    ///
    /// 不满足 `0 <= lower < upper <= 100` 时返回 [`CmapError::InvalidParameter`].
    pub fn with_percentiles(mut self, lower: f64, upper: f64) -> CmapResult<Self> {
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
            return Err(CmapError::InvalidParameter(format!(
                "percentile bounds must satisfy 0 <= lower < upper <= 100, got ({lower}, {upper})"
            )));
        }
        self.lower_percentile = lower;
        self.upper_percentile = upper;
        Ok(self)
    }

    /// 对比度协议.
    #[inline]
    pub fn protocol(&self) -> &ContrastProtocol {
        &self.protocol
    }

    /// 水平切片目标形状.
    #[inline]
    pub fn target_shape(&self) -> Idx2d {
        self.target
    }

    /// 单个对比度的几何与强度预处理: 方向校正, 裁剪/填充, 归一化.
    pub fn preprocess(&self, raw: ContrastVolume) -> CmapResult<ContrastVolume> {
        let rotated = rot90_cw(raw);
        let cropped = crop_or_pad(rotated.view(), self.target)?;
        Ok(normalize(cropped.view()))
    }

    fn stretch(&self, volume: ArrayView3<f32>, mask: &BrainMask) -> CmapResult<ContrastVolume> {
        contrast_stretch(
            volume,
            mask.view(),
            self.lower_percentile,
            self.upper_percentile,
        )
    }

    /// 组装受试者 `subject` 的多对比度体数据.
    ///
    /// # 错误
    ///
    /// 1. 某个对比度缺失: 由 `source` 返回的 [`CmapError::MissingVolume`].
    /// 2. 各对比度的深度不一致: [`CmapError::Shape`].
    pub fn assemble<S: VolumeSource + ?Sized>(
        &self,
        source: &S,
        subject: &str,
    ) -> CmapResult<MultiContrastVolume> {
        info!("Loading MP-MR images for {subject}");

        let mut mask: Option<BrainMask> = None;
        let mut channels = Vec::with_capacity(self.protocol.len());
        for channel in self.protocol.iter() {
            let raw = source.load(subject, channel)?;
            debug!("{subject}/{}: raw shape {:?}", channel.name(), raw.dim());
            let volume = self.preprocess(raw)?;

            let mask = mask.get_or_insert_with(|| brain_mask(volume.view()));
            if mask.dim() != volume.dim() {
                return Err(CmapError::Shape(format!(
                    "channel `{}` of {subject} has shape {:?}, expected {:?}",
                    channel.name(),
                    volume.dim(),
                    mask.dim()
                )));
            }
            let volume = self.stretch(volume.view(), mask)?;
            channels.push((channel.name().to_string(), volume));
        }

        let ans = MultiContrastVolume::stack(channels)?;
        if ans.len_t() != self.protocol.len() {
            return Err(CmapError::Shape(format!(
                "assembled {} contrasts, expected {}",
                ans.len_t(),
                self.protocol.len()
            )));
        }
        Ok(ans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemorySource;
    use ndarray::Array3;

    /// 形状为 `(h, w, d)` 的体数据: 中央方块为 `fg`, 其余为 0.
    fn phantom(h: usize, w: usize, d: usize, fg: f32) -> ContrastVolume {
        Array3::from_shape_fn((h, w, d), |(i, j, _)| {
            if (h / 4..h * 3 / 4).contains(&i) && (w / 4..w * 3 / 4).contains(&j) {
                fg + (i + j) as f32
            } else {
                0.0
            }
        })
    }

    fn source(channels: &[&str], depth: &[usize]) -> InMemorySource {
        let mut src = InMemorySource::new();
        for (k, (&c, &d)) in channels.iter().zip(depth).enumerate() {
            src.insert("s1", c, phantom(12, 10, d, 10.0 * (k + 1) as f32));
        }
        src
    }

    #[test]
    fn test_assemble_order_and_shape() {
        let names = ["t1ce", "t2", "t1", "flair"];
        let src = source(&names, &[3, 3, 3, 3]);
        let asm = Assembler::new(ContrastProtocol::brats(), (8, 8));
        let mcv = asm.assemble(&src, "s1").unwrap();

        assert_eq!(mcv.shape(), (8, 8, 3));
        assert_eq!(mcv.len_t(), 4);
        assert_eq!(mcv.channels(), names);
        for t in 0..4 {
            let c = mcv.channel(t);
            assert!(c.iter().all(|v| (0.0..=1.0).contains(v)));
            // 背景保持为 0, 前景被拉伸到 [0, 1] 的两端.
            assert_eq!(c[[0, 0, 0]], 0.0);
            assert!(c.iter().any(|&v| v == 1.0));
        }
    }

    #[test]
    fn test_assemble_errors() {
        let asm = Assembler::new(ContrastProtocol::brats(), (8, 8));

        let src = source(&["t1ce", "t2", "t1"], &[3, 3, 3]);
        match asm.assemble(&src, "s1") {
            Err(CmapError::MissingVolume { channel, .. }) => assert_eq!(channel, "flair"),
            other => panic!("expected a missing volume, got {other:?}"),
        }

        let src = source(&["t1ce", "t2", "t1", "flair"], &[3, 3, 4, 3]);
        assert!(matches!(
            asm.assemble(&src, "s1"),
            Err(CmapError::Shape(_))
        ));
    }

    #[test]
    fn test_preprocess_rotates_and_crops() {
        let asm = Assembler::new(ContrastProtocol::brats(), (2, 4));
        // (H, W, D) = (4, 2, 1); 旋转后为 (2, 4, 1), 正好等于目标形状.
        let raw = Array3::from_shape_fn((4, 2, 1), |(i, j, _)| (i * 2 + j) as f32);
        let out = asm.preprocess(raw).unwrap();
        assert_eq!(out.dim(), (2, 4, 1));
        // out[i, j] = raw[3 - j, i], 归一化后最大值 7 -> 1.
        assert_eq!(out[[0, 0, 0]], 6.0 / 7.0);
        assert_eq!(out[[1, 0, 0]], 1.0);
        assert_eq!(out[[0, 3, 0]], 0.0);
    }

    #[test]
    fn test_percentile_validation() {
        assert!(Assembler::default().with_percentiles(1.0, 99.0).is_ok());
        assert!(Assembler::default().with_percentiles(50.0, 50.0).is_err());
        assert!(Assembler::default().with_percentiles(-1.0, 99.0).is_err());
    }
}
