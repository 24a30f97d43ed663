//! 内存中的数据源. 用于合成体模实验和测试.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::{ContrastChannel, VolumeSource};
use crate::{CmapError, CmapResult, ContrastVolume};

/// 以 `受试者 -> 通道名 -> 体数据` 组织的内存数据源.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    subjects: BTreeMap<String, HashMap<String, ContrastVolume>>,
}

impl InMemorySource {
    /// 创建空数据源.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个受试者 (可以没有任何体数据).
    pub fn add_subject<S: Into<String>>(&mut self, subject: S) -> &mut Self {
        self.subjects.entry(subject.into()).or_default();
        self
    }

    /// 为受试者 `subject` 的 `channel` 通道放入体数据. 已存在则覆盖.
    pub fn insert<S: Into<String>, C: Into<String>>(
        &mut self,
        subject: S,
        channel: C,
        volume: ContrastVolume,
    ) -> &mut Self {
        self.subjects
            .entry(subject.into())
            .or_default()
            .insert(channel.into(), volume);
        self
    }

    /// 受试者个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// 是否没有任何受试者.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl VolumeSource for InMemorySource {
    fn subjects(&self) -> CmapResult<Vec<String>> {
        Ok(self.subjects.keys().cloned().collect())
    }

    fn load(&self, subject: &str, channel: &ContrastChannel) -> CmapResult<ContrastVolume> {
        self.subjects
            .get(subject)
            .and_then(|vols| vols.get(channel.name()))
            .cloned()
            .ok_or_else(|| CmapError::MissingVolume {
                subject: subject.to_string(),
                channel: channel.name().to_string(),
                path: PathBuf::from(subject).join(channel.file_name(subject)),
            })
    }
}
