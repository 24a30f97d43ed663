use ndarray::{Array, ArrayView, Dimension};

/// 强度窗口, 包含下界 (lower) 和上界 (upper).
///
/// 窗口外的强度被截断到边界, 窗口内的强度线性映射到 `[0, 1]`.
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f32,
    upper: f32,
}

impl IntensityWindow {
    /// 构建强度窗.
    ///
    /// `lower` 和 `upper` 必须是有限值且 `lower < upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<IntensityWindow> {
        (lower.is_finite() && upper.is_finite() && lower < upper).then_some(Self { lower, upper })
    }

    /// 窗口 `[0, 1]`, 即归一化后体数据的参考区间.
    #[inline]
    pub const fn unit() -> IntensityWindow {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 判断强度 `v` 是否落在窗口内 (含边界).
    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        (self.lower..=self.upper).contains(&v)
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的相对位置 (0.0 <= value <= 1.0).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        let clipped = num::clamp(v, self.lower, self.upper);
        Some((clipped - self.lower) / self.width())
    }

    /// 对整个数组逐元素求 [`Self::eval`]. 无意义的强度被映射为 0.
    pub fn apply<D: Dimension>(&self, data: ArrayView<f32, D>) -> Array<f32, D> {
        data.mapv(|v| self.eval(v).unwrap_or(0.0))
    }
}
