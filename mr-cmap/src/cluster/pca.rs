//! 主成分分析 (PCA).
//!
//! 样本为体素, 特征为各对比度强度. 协方差矩阵在 `f64` 上计算, 投影结果转回 `f32`.

use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::eigen::symmetric_eigen;
use crate::{CmapError, CmapResult};

/// 拟合得到的主成分.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// 形状为 `(P, T)`, 每一行是一个主成分方向.
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    total_variance: f64,
}

impl Pca {
    /// 在形状为 `(N, T)` 的样本矩阵 `x` 上拟合, 保留 `min(n_components, T)` 个主成分.
    ///
    /// 主成分按方差降序排列. 每个主成分中绝对值最大的分量被规定为正数, 使结果与特征分解的实现无关.
    ///
    /// # 错误
    ///
    /// 1. `x` 没有样本或没有特征时返回 [`CmapError::Shape`].
    /// 2. `n_components` 为 0 时返回 [`CmapError::InvalidParameter`].
    pub fn fit(x: ArrayView2<f32>, n_components: usize) -> CmapResult<Self> {
        let (n, t) = x.dim();
        if n == 0 || t == 0 {
            return Err(CmapError::Shape(format!(
                "PCA needs a non-empty sample matrix, got {:?}",
                x.dim()
            )));
        }
        if n_components == 0 {
            return Err(CmapError::InvalidParameter(
                "PCA must retain at least one component".to_string(),
            ));
        }

        let x = x.mapv(f64::from);
        let mean = x.sum_axis(Axis(0)) / n as f64;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n.max(2) - 1) as f64;
        let (values, vectors) = symmetric_eigen(&cov)?;

        let mut order: Vec<usize> = (0..t).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
        let p = n_components.min(t);

        let mut components = Array2::zeros((p, t));
        for (mut row, &k) in components.outer_iter_mut().zip(order.iter()) {
            row.assign(&vectors.column(k));
            let pivot = row
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }
        let explained_variance: Array1<f64> =
            order.iter().take(p).map(|&k| values[k].max(0.0)).collect();
        let total_variance = values.iter().map(|v| v.max(0.0)).sum();
        debug!("PCA explained variance: {explained_variance}");

        Ok(Self {
            mean,
            components,
            explained_variance,
            total_variance,
        })
    }

    /// 保留的主成分个数 P.
    #[inline]
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// 主成分方向, 形状为 `(P, T)`.
    #[inline]
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// 各主成分的方差, 降序.
    #[inline]
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// 各主成分方差占总方差的比例. 总方差为 0 时全为 0.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        if self.total_variance > 0.0 {
            &self.explained_variance / self.total_variance
        } else {
            Array1::zeros(self.explained_variance.len())
        }
    }

    /// 将形状为 `(N, T)` 的样本投影到主成分上, 得到 `(N, P)`.
    ///
    /// 特征个数与拟合时不一致时返回 [`CmapError::Shape`].
    pub fn transform(&self, x: ArrayView2<f32>) -> CmapResult<Array2<f32>> {
        if x.ncols() != self.mean.len() {
            return Err(CmapError::Shape(format!(
                "PCA was fitted on {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        let centered = x.mapv(f64::from) - &self.mean;
        Ok(centered.dot(&self.components.t()).mapv(|v| v as f32))
    }
}
