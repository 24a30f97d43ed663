//! 可复现的 mini-batch K-means.
//!
//! 每次只用一小批随机抽取的样本更新聚类中心, 适合体素数以十万计的输入.
//! 所有随机性来自以 `seed` 初始化的 [`StdRng`], 相同输入与相同种子总是给出相同结果.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{CmapError, CmapResult};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// mini-batch K-means 参数.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniBatchParams {
    /// 每批样本数. 超过样本总数时取样本总数.
    pub batch_size: usize,

    /// 最多遍历整个数据集的轮数 (epoch).
    pub max_iter: usize,

    /// 平滑惯量连续这么多批没有改进时提前停止.
    pub max_no_improvement: usize,

    /// 独立初始化的次数, 取初始惯量最小的一次.
    pub n_init: usize,
}

impl Default for MiniBatchParams {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            max_iter: 100,
            max_no_improvement: 10,
            n_init: 3,
        }
    }
}

#[inline]
fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 距 `point` 最近的中心及其平方距离. 距离相同时取下标较小者.
#[inline]
fn nearest(point: ArrayView1<f32>, centers: &Array2<f32>) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (k, c) in centers.outer_iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (k, d);
        }
    }
    best
}

/// mini-batch K-means 求解器.
#[derive(Debug, Clone)]
pub struct MiniBatchKMeans {
    num_cluster: usize,
    params: MiniBatchParams,
    seed: u64,
}

/// 拟合得到的聚类模型.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    centers: Array2<f32>,
    steps: usize,
}

impl MiniBatchKMeans {
    /// 创建求解器.
    pub fn new(num_cluster: usize, params: MiniBatchParams, seed: u64) -> Self {
        Self {
            num_cluster,
            params,
            seed,
        }
    }

    /// 在形状为 `(N, P)` 的样本矩阵上拟合 `num_cluster` 个中心.
    ///
    /// 不同的样本少于 `num_cluster` 个时不会出错, 只是部分中心重合.
    ///
    /// # 错误
    ///
    /// 1. `num_cluster`, `batch_size`, `max_iter` 或 `n_init` 为 0 时返回 [`CmapError::InvalidParameter`].
    /// 2. 没有样本或特征时返回 [`CmapError::Shape`].
    pub fn fit(&self, x: ArrayView2<f32>) -> CmapResult<KMeansModel> {
        let k = self.num_cluster;
        let p = self.params;
        if k == 0 {
            return Err(CmapError::InvalidParameter(
                "number of clusters must be positive".to_string(),
            ));
        }
        if p.batch_size == 0 || p.max_iter == 0 || p.n_init == 0 {
            return Err(CmapError::InvalidParameter(format!(
                "invalid mini-batch parameters {p:?}"
            )));
        }
        let (n, dim) = x.dim();
        if n == 0 || dim == 0 {
            return Err(CmapError::Shape(format!(
                "K-means needs a non-empty sample matrix, got {:?}",
                x.dim()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let batch = p.batch_size.min(n);
        let init_size = (3 * batch).max(3 * k).min(n);

        // 多次初始化, 在同一个验证子集上比较惯量.
        let valid: Vec<usize> = (0..init_size).map(|_| rng.gen_range(0..n)).collect();
        let x_valid = x.select(Axis(0), &valid);
        let mut init = || {
            let sub: Vec<usize> = (0..init_size).map(|_| rng.gen_range(0..n)).collect();
            let centers = kmeans_plusplus(x.select(Axis(0), &sub).view(), k, &mut rng);
            (inertia(x_valid.view(), &centers), centers)
        };
        let (mut init_inertia, mut centers) = init();
        for _ in 1..p.n_init {
            let (cand_inertia, cand) = init();
            if cand_inertia < init_inertia {
                init_inertia = cand_inertia;
                centers = cand;
            }
        }
        debug!("K-means init inertia {init_inertia:.4} on {init_size} samples");

        let mut counts = vec![0usize; k];
        let n_steps = (p.max_iter * n).div_ceil(batch);
        let alpha = (batch as f64 * 2.0 / (n as f64 + 1.0)).min(1.0);
        let mut ewa: Option<f64> = None;
        let mut ewa_min = f64::INFINITY;
        let mut no_improvement = 0;
        let mut steps = 0;

        let mut sums = Array2::<f64>::zeros((k, dim));
        let mut batch_counts = vec![0usize; k];
        for _ in 0..n_steps {
            steps += 1;
            sums.fill(0.0);
            batch_counts.iter_mut().for_each(|c| *c = 0);

            let mut batch_inertia = 0.0f64;
            for _ in 0..batch {
                let point = x.row(rng.gen_range(0..n));
                let (label, d) = nearest(point, &centers);
                batch_inertia += f64::from(d);
                batch_counts[label] += 1;
                sums.row_mut(label)
                    .iter_mut()
                    .zip(point.iter())
                    .for_each(|(s, &v)| *s += f64::from(v));
            }

            // 每个中心维护到目前为止分配给它的所有样本的均值.
            for c in 0..k {
                let bc = batch_counts[c];
                if bc == 0 {
                    continue;
                }
                let old = counts[c] as f64;
                let total = (counts[c] + bc) as f64;
                for (center, &s) in centers.row_mut(c).iter_mut().zip(sums.row(c).iter()) {
                    *center = ((f64::from(*center) * old + s) / total) as f32;
                }
                counts[c] += bc;
            }

            let batch_inertia = batch_inertia / batch as f64;
            let smoothed = match ewa {
                None => batch_inertia,
                Some(prev) => prev * (1.0 - alpha) + batch_inertia * alpha,
            };
            ewa = Some(smoothed);
            if smoothed < ewa_min {
                ewa_min = smoothed;
                no_improvement = 0;
            } else {
                no_improvement += 1;
                if no_improvement >= p.max_no_improvement {
                    debug!("K-means converged after {steps} mini-batches");
                    break;
                }
            }
        }

        Ok(KMeansModel { centers, steps })
    }
}

/// k-means++ 初始化 (带局部多次尝试的贪心版本).
///
/// 剩余样本与已选中心的距离全为 0 时, 随机选取一个样本作为新中心.
fn kmeans_plusplus(x: ArrayView2<f32>, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let n = x.nrows();
    let trials = 2 + (k as f64).ln().floor() as usize;
    let mut centers = Array2::zeros((k, x.ncols()));

    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&x.row(first));
    let mut closest: Vec<f64> = x
        .outer_iter()
        .map(|r| f64::from(squared_distance(r, x.row(first))))
        .collect();
    let mut potential: f64 = closest.iter().sum();

    for c in 1..k {
        let mut best: Option<(f64, usize, Vec<f64>)> = None;
        for _ in 0..trials {
            let cand = if potential > 0.0 {
                let target = rng.gen::<f64>() * potential;
                let mut acc = 0.0;
                closest
                    .iter()
                    .position(|&d| {
                        acc += d;
                        acc > target
                    })
                    .unwrap_or(n - 1)
            } else {
                rng.gen_range(0..n)
            };
            let dist: Vec<f64> = x
                .outer_iter()
                .zip(closest.iter())
                .map(|(r, &old)| old.min(f64::from(squared_distance(r, x.row(cand)))))
                .collect();
            let pot: f64 = dist.iter().sum();
            if best.as_ref().map_or(true, |(b, _, _)| pot < *b) {
                best = Some((pot, cand, dist));
            }
        }
        if let Some((pot, cand, dist)) = best {
            centers.row_mut(c).assign(&x.row(cand));
            closest = dist;
            potential = pot;
        }
    }
    centers
}

/// 所有样本到最近中心的平方距离之和.
fn inertia(x: ArrayView2<f32>, centers: &Array2<f32>) -> f64 {
    x.outer_iter()
        .map(|r| f64::from(nearest(r, centers).1))
        .sum()
}

impl KMeansModel {
    /// 聚类中心, 形状为 `(K, P)`.
    #[inline]
    pub fn centers(&self) -> &Array2<f32> {
        &self.centers
    }

    /// 实际执行的 mini-batch 步数.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// 每个样本所属的中心下标. 距离相同时取下标较小者.
    ///
    /// # Panics
    ///
    /// 特征个数与中心不一致时 panic.
    pub fn predict(&self, x: ArrayView2<f32>) -> Array1<u32> {
        assert_eq!(x.ncols(), self.centers.ncols());
        let mut labels = Array1::zeros(x.nrows());

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                labels
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .zip(x.axis_iter(Axis(0)).into_par_iter())
                    .for_each(|(mut l, r)| l[()] = nearest(r, &self.centers).0 as u32);
            } else {
                labels
                    .iter_mut()
                    .zip(x.outer_iter())
                    .for_each(|(l, r)| *l = nearest(r, &self.centers).0 as u32);
            }
        }
        labels
    }

    /// 所有样本到最近中心的平方距离之和.
    pub fn inertia(&self, x: ArrayView2<f32>) -> f64 {
        inertia(x, &self.centers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 围绕三个中心的紧凑点团, 每团 `m` 个点.
    fn blobs(m: usize) -> Array2<f32> {
        let centers = [[0.0f32, 0.0], [5.0, 5.0], [0.0, 10.0]];
        Array2::from_shape_fn((3 * m, 2), |(i, j)| {
            let c = centers[i % 3][j];
            let jitter = ((i * 7 + j * 13) % 11) as f32 / 11.0 - 0.5;
            c + 0.4 * jitter
        })
    }

    #[test]
    fn test_separates_blobs() {
        let x = blobs(200);
        let model = MiniBatchKMeans::new(3, MiniBatchParams::default(), 0)
            .fit(x.view())
            .unwrap();
        let labels = model.predict(x.view());
        assert_eq!(labels.len(), 600);

        // 同一点团内标签一致, 不同点团标签不同.
        let ids: Vec<u32> = (0..3).map(|b| labels[b]).collect();
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
        for (i, &l) in labels.iter().enumerate() {
            assert_eq!(l, ids[i % 3]);
        }
        assert!(model.inertia(x.view()) < 600.0 * 0.1);
        assert!(model.steps() > 0);
    }

    #[test]
    fn test_deterministic() {
        let x = blobs(100);
        let params = MiniBatchParams {
            batch_size: 32,
            ..MiniBatchParams::default()
        };
        let a = MiniBatchKMeans::new(4, params, 7).fit(x.view()).unwrap();
        let b = MiniBatchKMeans::new(4, params, 7).fit(x.view()).unwrap();
        assert_eq!(a.centers(), b.centers());
        assert_eq!(a.predict(x.view()), b.predict(x.view()));
    }

    #[test]
    fn test_more_clusters_than_points() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0f32, 0.0, 1.0, 1.0]).unwrap();
        let model = MiniBatchKMeans::new(6, MiniBatchParams::default(), 0)
            .fit(x.view())
            .unwrap();
        assert_eq!(model.centers().nrows(), 6);
        let labels = model.predict(x.view());
        assert!(labels.iter().all(|&l| l < 6));
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_invalid_input() {
        let x = blobs(2);
        assert!(matches!(
            MiniBatchKMeans::new(0, MiniBatchParams::default(), 0).fit(x.view()),
            Err(CmapError::InvalidParameter(_))
        ));
        let params = MiniBatchParams {
            n_init: 0,
            ..MiniBatchParams::default()
        };
        assert!(MiniBatchKMeans::new(2, params, 0).fit(x.view()).is_err());
        assert!(matches!(
            MiniBatchKMeans::new(2, MiniBatchParams::default(), 0)
                .fit(Array2::<f32>::zeros((0, 2)).view()),
            Err(CmapError::Shape(_))
        ));
    }

    #[test]
    fn test_nearest_tie_breaks_low() {
        let centers = Array2::from_shape_vec((3, 1), vec![1.0f32, -1.0, 1.0]).unwrap();
        let p = ndarray::arr1(&[0.0f32]);
        assert_eq!(nearest(p.view(), &centers), (0, 1.0));
    }
}
