//! 多对比度 MR 体数据与约束图的基础数据结构.

use std::collections::BTreeSet;
use std::ops::Index;

use ndarray::{Array3, Array4, ArrayView2, ArrayView3, ArrayView4, ArrayViewD, Axis};

use crate::{CmapError, CmapResult, Idx3d};

pub mod geometry;
pub mod intensity;
mod save;
pub mod window;

pub use save::{MapSink, NpzDirSink};
pub use window::IntensityWindow;

/// 单个对比度的 3D 体数据, 轴顺序为 (H, W, D).
pub type ContrastVolume = Array3<f32>;

/// 脑掩膜. 与单个 [`ContrastVolume`] 的空间形状相同.
pub type BrainMask = Array3<bool>;

/// 按声明顺序堆叠的多对比度体数据, 轴顺序为 (H, W, D, T).
///
/// 通道顺序是一个不变量: 下游代码按下标访问通道, 且脑掩膜约定由第 0 个通道导出.
#[derive(Debug, Clone)]
pub struct MultiContrastVolume {
    data: Array4<f32>,
    channels: Vec<String>,
}

impl MultiContrastVolume {
    /// 沿新增的末尾轴按给定顺序堆叠各对比度.
    ///
    /// 若 `channels` 为空, 或各对比度的空间形状不一致, 则返回 [`CmapError::Shape`].
    pub fn stack(channels: Vec<(String, ContrastVolume)>) -> CmapResult<Self> {
        let Some((_, first)) = channels.first() else {
            return Err(CmapError::Shape("no contrast to stack".to_string()));
        };
        let shape = first.dim();
        if let Some((name, v)) = channels.iter().find(|(_, v)| v.dim() != shape) {
            return Err(CmapError::Shape(format!(
                "channel `{name}` has shape {:?}, expected {shape:?}",
                v.dim()
            )));
        }
        let views: Vec<ArrayView3<f32>> = channels.iter().map(|(_, v)| v.view()).collect();
        let data = ndarray::stack(Axis(3), &views)?;
        let channels = channels.into_iter().map(|(name, _)| name).collect();
        Ok(Self { data, channels })
    }

    /// 由现成的 4D 数组和通道名创建.
    ///
    /// 末尾轴长度必须等于通道名个数, 否则返回 [`CmapError::Shape`].
    pub fn from_array(data: Array4<f32>, channels: Vec<String>) -> CmapResult<Self> {
        if data.len_of(Axis(3)) != channels.len() {
            return Err(CmapError::Shape(format!(
                "volume has {} channels but {} names were given",
                data.len_of(Axis(3)),
                channels.len()
            )));
        }
        Ok(Self { data, channels })
    }

    /// 空间形状 (H, W, D).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let (h, w, d, _) = self.data.dim();
        (h, w, d)
    }

    /// 对比度个数 T.
    #[inline]
    pub fn len_t(&self) -> usize {
        self.channels.len()
    }

    /// 按堆叠顺序排列的通道名.
    #[inline]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// 第 `t` 个对比度通道. 越界时 panic.
    #[inline]
    pub fn channel(&self, t: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(3), t)
    }

    /// 按名字查找对比度通道.
    pub fn channel_by_name(&self, name: &str) -> Option<ArrayView3<'_, f32>> {
        let t = self.channels.iter().position(|c| c == name)?;
        Some(self.channel(t))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 获得动态维度的视图, 即聚类器的输入形式.
    #[inline]
    pub fn view_dyn(&self) -> ArrayViewD<'_, f32> {
        self.data.view().into_dyn()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// 约束图: 每个体素的聚类标签, 取值范围为 `[0, num_cluster)`.
///
/// 标签值只在一次聚类内部有意义. 不同随机种子 (或不同运行) 之间,
/// 同一组织可能被分到不同编号的类.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMap {
    num_cluster: usize,
    labels: Array3<u32>,
}

impl Index<Idx3d> for ConstraintMap {
    type Output = u32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.labels[index]
    }
}

impl ConstraintMap {
    /// 由聚类结果直接创建. 调用方保证所有标签小于 `num_cluster`.
    #[inline]
    pub(crate) fn new(num_cluster: usize, labels: Array3<u32>) -> Self {
        debug_assert!(labels.iter().all(|&l| (l as usize) < num_cluster));
        Self {
            num_cluster,
            labels,
        }
    }

    /// 由裸标签数据创建.
    ///
    /// 若存在不小于 `num_cluster` 的标签, 则返回 [`CmapError::InvalidParameter`].
    pub fn from_labels(num_cluster: usize, labels: Array3<u32>) -> CmapResult<Self> {
        match labels.iter().find(|&&l| l as usize >= num_cluster) {
            Some(l) => Err(CmapError::InvalidParameter(format!(
                "label {l} out of range for {num_cluster} clusters"
            ))),
            None => Ok(Self::new(num_cluster, labels)),
        }
    }

    /// 请求的聚类个数 K.
    #[inline]
    pub fn num_cluster(&self) -> usize {
        self.num_cluster
    }

    /// 空间形状 (H, W, D).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.labels.dim()
    }

    /// 获得标签数据的一份不可变 shallow copy.
    #[inline]
    pub fn labels(&self) -> ArrayView3<'_, u32> {
        self.labels.view()
    }

    /// 消费自我, 获得底层标签数据.
    #[inline]
    pub fn into_labels(self) -> Array3<u32> {
        self.labels
    }

    /// 获取第 `z_index` 个水平切片 (深度轴). 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, u32> {
        self.labels.index_axis(Axis(2), z_index)
    }

    /// 获取标签为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u32) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// 各标签的体素个数, 长度为 `num_cluster`.
    pub fn histogram(&self) -> Vec<usize> {
        let mut ans = vec![0; self.num_cluster];
        for &l in self.labels.iter() {
            ans[l as usize] += 1;
        }
        ans
    }

    /// 实际出现的不同标签.
    pub fn distinct_labels(&self) -> BTreeSet<u32> {
        self.labels.iter().copied().collect()
    }

    /// 实际被占用的标签个数. 当不同的体素特征少于 K 时, 该值可能小于 K.
    #[inline]
    pub fn populated(&self) -> usize {
        self.histogram().iter().filter(|&&c| c != 0).count()
    }

    /// 持久化记录名, 形如 `Constraint_map_20`.
    #[inline]
    pub fn record_name(&self) -> String {
        format!("{}{}", crate::consts::CONSTRAINT_MAP_PREFIX, self.num_cluster)
    }
}
