//! 实对称矩阵的特征分解.
//!
//! 默认使用纯 Rust 的循环 Jacobi 迭代. 协方差矩阵只有 T x T (T 为对比度个数) 大小,
//! 迭代几轮即可收敛. 打开 `lapack` feature 后改用 `ndarray-linalg` 的 `eigh`.

use ndarray::{Array1, Array2};

use crate::{CmapError, CmapResult};

/// Jacobi 迭代的最大轮数.
const MAX_SWEEPS: usize = 100;

/// 求实对称矩阵 `a` 的全部特征值与特征向量.
///
/// 返回 `(特征值, 特征向量)`, 第 `i` 列特征向量对应第 `i` 个特征值. 不保证排序.
///
/// # 错误
///
/// 1. `a` 不是方阵时返回 [`CmapError::Shape`].
/// 2. `a` 含有非有限值, 或迭代不收敛时返回 [`CmapError::Numeric`].
pub fn symmetric_eigen(a: &Array2<f64>) -> CmapResult<(Array1<f64>, Array2<f64>)> {
    if !a.is_square() {
        return Err(CmapError::Shape(format!(
            "eigen decomposition needs a square matrix, got {:?}",
            a.dim()
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(CmapError::Numeric(
            "covariance matrix contains non-finite values".to_string(),
        ));
    }

    cfg_if::cfg_if! {
        if #[cfg(feature = "lapack")] {
            use ndarray_linalg::{Eigh, UPLO};
            a.eigh(UPLO::Lower)
                .map_err(|e| CmapError::Numeric(e.to_string()))
        } else {
            jacobi(a)
        }
    }
}

/// 循环 Jacobi 迭代. 每次旋转消去一个非对角元 `a[p, q]`.
#[cfg_attr(feature = "lapack", allow(dead_code))]
fn jacobi(a: &Array2<f64>) -> CmapResult<(Array1<f64>, Array2<f64>)> {
    let n = a.nrows();
    let mut a = a.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let total: f64 = a.iter().map(|x| x * x).sum();

    for _ in 0..MAX_SWEEPS {
        let off: f64 = a
            .indexed_iter()
            .filter(|((i, j), _)| i != j)
            .map(|(_, x)| x * x)
            .sum();
        if off <= f64::EPSILON * f64::EPSILON * total {
            return Ok((a.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(CmapError::Numeric(format!(
        "Jacobi eigen solver did not converge in {MAX_SWEEPS} sweeps"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_jacobi_reconstruction() {
        let a = array![
            [4.0, 1.0, -2.0, 0.5],
            [1.0, 3.0, 0.0, 1.0],
            [-2.0, 0.0, 5.0, -1.0],
            [0.5, 1.0, -1.0, 2.0]
        ];
        let (w, v) = jacobi(&a).unwrap();

        // A v_i = w_i v_i
        for i in 0..4 {
            let vi = v.column(i);
            let av = a.dot(&vi);
            for k in 0..4 {
                assert!(close(av[k], w[i] * vi[k]));
            }
        }
        // V 正交.
        let vtv = v.t().dot(&v);
        for ((i, j), &x) in vtv.indexed_iter() {
            assert!(close(x, if i == j { 1.0 } else { 0.0 }));
        }
        // 迹不变.
        assert!(close(w.sum(), 14.0));
    }

    #[test]
    fn test_diagonal_and_degenerate() {
        let (w, v) = jacobi(&array![[2.0, 0.0], [0.0, 7.0]]).unwrap();
        assert_eq!(w, array![2.0, 7.0]);
        assert_eq!(v, Array2::eye(2));

        let (w, _) = jacobi(&Array2::zeros((3, 3))).unwrap();
        assert!(w.iter().all(|&x| x == 0.0));

        let (w, _) = jacobi(&array![[1.0, 1.0], [1.0, 1.0]]).unwrap();
        let mut w = w.to_vec();
        w.sort_by(f64::total_cmp);
        assert!(close(w[0], 0.0) && close(w[1], 2.0));
    }

    #[test]
    fn test_symmetric_eigen_errors() {
        assert!(matches!(
            symmetric_eigen(&Array2::zeros((2, 3))),
            Err(CmapError::Shape(_))
        ));
        assert!(matches!(
            symmetric_eigen(&array![[f64::NAN, 0.0], [0.0, 1.0]]),
            Err(CmapError::Numeric(_))
        ));
    }
}
