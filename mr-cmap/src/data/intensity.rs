//! 强度变换: min-max 归一化, 脑掩膜, 基于掩膜的百分位对比度拉伸.
//!
//! 所有函数都把结果放到参考区间 `[0, 1]` 中, 使不同扫描仪、不同对比度的体数据具有可比的数值尺度.

use itertools::{Itertools, MinMaxResult};
use log::warn;
use ndarray::{Array, Array3, ArrayView, ArrayView3, Dimension, Zip};
use ordered_float::OrderedFloat;

use super::{BrainMask, IntensityWindow};
use crate::{CmapError, CmapResult};

/// 求所有有限值的最小值和最大值. 若不存在有限值, 则返回 `None`.
pub fn finite_min_max<'a, I: IntoIterator<Item = &'a f32>>(it: I) -> Option<(f32, f32)> {
    match it
        .into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .minmax_by(f32::total_cmp)
    {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(v) => Some((v, v)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

/// 按 `(v - min) / (max - min)` 将数组归一化到 `[0, 1]`. min/max 在整个数组上求得.
///
/// # 退化情形
///
/// 1. 数组为常数 (或不含有限值) 时, 结果全为 0.
/// 2. 非有限值 (inf, NaN) 不参与 min/max 的计算, 并被映射为 0.
///
/// 该变换对有限值是单调不减的.
pub fn normalize<D: Dimension>(data: ArrayView<f32, D>) -> Array<f32, D> {
    match finite_min_max(data.iter()).and_then(|(lo, hi)| IntensityWindow::new(lo, hi)) {
        Some(win) => win.apply(data),
        None => Array::zeros(data.raw_dim()),
    }
}

/// 从 (归一化后的) 体数据导出脑掩膜: 体素值 `> 0` 即为前景.
#[inline]
pub fn brain_mask(volume: ArrayView3<f32>) -> BrainMask {
    volume.mapv(|v| v > 0.0)
}

/// 在升序排列的 `sorted` 上求第 `q` (0 <= q <= 100) 百分位数, 使用线性插值.
///
/// 与 numpy `percentile` 的默认行为一致. `sorted` 为空时返回 `None`.
pub fn percentile(sorted: &[f32], q: f64) -> Option<f32> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (q.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// 求掩膜前景内有限强度的第 `lower` 和第 `upper` 百分位数.
///
/// 前景为空时返回 `None`.
///
/// # Panics
///
/// `volume` 与 `mask` 形状不一致时 panic.
pub fn foreground_percentiles(
    volume: ArrayView3<f32>,
    mask: ArrayView3<bool>,
    lower: f64,
    upper: f64,
) -> Option<(f32, f32)> {
    let mut fg = Vec::with_capacity(volume.len() / 2);
    Zip::from(&volume).and(&mask).for_each(|&v, &m| {
        if m && v.is_finite() {
            fg.push(OrderedFloat(v));
        }
    });
    fg.sort_unstable();
    let fg: Vec<f32> = fg.into_iter().map(|v| v.0).collect();
    Some((percentile(&fg, lower)?, percentile(&fg, upper)?))
}

/// 基于脑掩膜的百分位对比度拉伸.
///
/// 在掩膜前景上求 `lower`/`upper` 百分位数 `(lo, hi)`, 将整个体数据截断到 `[lo, hi]`,
/// 再线性映射回 `[0, 1]`. 背景不参与百分位的估计, 因此不会拉偏结果.
///
/// # 退化情形
///
/// 1. 掩膜前景为空: 原样返回 `volume` 并记录警告.
/// 2. `hi <= lo` (前景强度几乎为常数): 返回全 0 体数据.
///
/// # 错误
///
/// 1. 百分位不满足 `0 <= lower < upper <= 100` 时返回 [`CmapError::InvalidParameter`].
/// 2. `volume` 与 `mask` 形状不一致时返回 [`CmapError::Shape`].
pub fn contrast_stretch(
    volume: ArrayView3<f32>,
    mask: ArrayView3<bool>,
    lower: f64,
    upper: f64,
) -> CmapResult<Array3<f32>> {
    if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
        return Err(CmapError::InvalidParameter(format!(
            "percentile bounds must satisfy 0 <= lower < upper <= 100, got ({lower}, {upper})"
        )));
    }
    if volume.dim() != mask.dim() {
        return Err(CmapError::Shape(format!(
            "volume shape {:?} does not match mask shape {:?}",
            volume.dim(),
            mask.dim()
        )));
    }

    let Some((lo, hi)) = foreground_percentiles(volume, mask, lower, upper) else {
        warn!("empty brain mask, contrast stretching skipped");
        return Ok(volume.to_owned());
    };
    Ok(match IntensityWindow::new(lo, hi) {
        Some(win) => win.apply(volume),
        None => Array3::zeros(volume.dim()),
    })
}
