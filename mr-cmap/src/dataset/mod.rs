//! 数据集操作.
//!
//! [`ContrastProtocol`] 是通道顺序与文件名后缀的唯一描述, 组装器和数据源都从它读取约定;
//! [`VolumeSource`] 是原始体数据的读取端.

use std::collections::HashSet;

use crate::consts::brats;
use crate::{CmapError, CmapResult, ContrastVolume};

mod memory;
pub mod natsort;
mod nifti_dir;

pub use memory::InMemorySource;
pub use nifti_dir::{open_volume, NiftiDirSource};

/// 一个对比度通道: 通道名和对应的文件名后缀.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContrastChannel {
    name: String,
    suffix: String,
}

impl ContrastChannel {
    /// 通道名, 如 `t1ce`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 文件名后缀, 如 `_t1ce.nii.gz`. 完整文件名为 `{subject}{suffix}`.
    #[inline]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// 受试者 `subject` 的该通道文件名.
    #[inline]
    pub fn file_name(&self, subject: &str) -> String {
        format!("{subject}{}", self.suffix)
    }
}

/// 有序的对比度通道列表.
///
/// 通道顺序即堆叠顺序. 第 0 个通道用来导出脑掩膜.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContrastProtocol {
    channels: Vec<ContrastChannel>,
}

impl ContrastProtocol {
    /// 由 `(通道名, 文件名后缀)` 序列创建.
    ///
    /// # 错误
    ///
    /// 以下情况返回 [`CmapError::Configuration`]:
    ///
    /// 1. 序列为空;
    /// 2. 存在空的通道名或后缀;
    /// 3. 通道名或后缀重复.
    pub fn new<I, N, S>(channels: I) -> CmapResult<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let channels: Vec<ContrastChannel> = channels
            .into_iter()
            .map(|(n, s)| ContrastChannel {
                name: n.into(),
                suffix: s.into(),
            })
            .collect();
        if channels.is_empty() {
            return Err(CmapError::Configuration(
                "contrast protocol needs at least one channel".to_string(),
            ));
        }
        if let Some(c) = channels
            .iter()
            .find(|c| c.name.is_empty() || c.suffix.is_empty())
        {
            return Err(CmapError::Configuration(format!(
                "contrast channel {c:?} has an empty name or suffix"
            )));
        }
        let mut names = HashSet::new();
        let mut suffixes = HashSet::new();
        for c in channels.iter() {
            if !names.insert(c.name.as_str()) || !suffixes.insert(c.suffix.as_str()) {
                return Err(CmapError::Configuration(format!(
                    "duplicated contrast channel `{}` ({})",
                    c.name, c.suffix
                )));
            }
        }
        Ok(Self { channels })
    }

    /// BraTS 约定: `[T1Gd, T2w, T1w, T2-FLAIR]`.
    pub fn brats() -> Self {
        Self {
            channels: brats::CHANNELS
                .iter()
                .map(|(n, s)| ContrastChannel {
                    name: n.to_string(),
                    suffix: s.to_string(),
                })
                .collect(),
        }
    }

    /// 通道个数 T.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// 协议总是非空的, 该方法恒返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// 按堆叠顺序迭代通道.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ContrastChannel> {
        self.channels.iter()
    }

    /// 按堆叠顺序排列的通道名.
    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// 用来导出脑掩膜的通道, 即第 0 个通道.
    #[inline]
    pub fn mask_channel(&self) -> &ContrastChannel {
        &self.channels[0]
    }
}

/// 原始体数据的读取端.
pub trait VolumeSource {
    /// 列出所有受试者标识. 不保证顺序.
    fn subjects(&self) -> CmapResult<Vec<String>>;

    /// 读取受试者 `subject` 的 `channel` 对比度原始 3D 体数据.
    ///
    /// 文件不存在时应返回 [`CmapError::MissingVolume`].
    fn load(&self, subject: &str, channel: &ContrastChannel) -> CmapResult<ContrastVolume>;
}
