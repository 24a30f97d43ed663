//! 批处理: 按自然序逐个受试者生成并保存约束图.
//!
//! 单个受试者的失败 (文件缺失, 形状不符, 甚至 panic) 只会记录在 [`BatchReport`] 中,
//! 不会中断整个批次. 只有列举受试者失败时 [`run_batch`] 才返回错误.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use log::{error, info};

use crate::assemble::Assembler;
use crate::cluster::{generate_clusters, ClusterParams};
use crate::data::MapSink;
use crate::dataset::natsort::natural_sort;
use crate::dataset::VolumeSource;
use crate::CmapResult;

/// 批处理配置.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// 体数据组装器.
    pub assembler: Assembler,

    /// 聚类参数.
    pub cluster: ClusterParams,
}

/// 单个受试者的处理结果.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectOutcome {
    /// 约束图已保存.
    Success {
        /// 受试者标识.
        subject: String,
        /// 约束图的保存位置.
        artifact: PathBuf,
        /// 实际被占用的标签个数.
        populated: usize,
    },

    /// 处理失败, 附带原因.
    Failure {
        /// 受试者标识.
        subject: String,
        /// 失败原因.
        reason: String,
    },
}

impl SubjectOutcome {
    /// 受试者标识.
    #[inline]
    pub fn subject(&self) -> &str {
        match self {
            Self::Success { subject, .. } | Self::Failure { subject, .. } => subject,
        }
    }

    /// 是否成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl fmt::Display for SubjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                subject,
                artifact,
                populated,
            } => write!(
                f,
                "{subject}: {populated} labels -> {}",
                artifact.display()
            ),
            Self::Failure { subject, reason } => write!(f, "{subject}: FAILED ({reason})"),
        }
    }
}

/// 整个批次的汇总.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<SubjectOutcome>,
}

impl BatchReport {
    /// 按处理顺序排列的所有结果.
    #[inline]
    pub fn outcomes(&self) -> &[SubjectOutcome] {
        &self.outcomes
    }

    /// 成功的受试者个数.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// 失败的受试者个数.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// 所有失败的结果.
    pub fn failures(&self) -> impl Iterator<Item = &SubjectOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// 是否没有任何失败.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// 按自然序排列的受试者列表.
pub fn subject_order<S: VolumeSource + ?Sized>(source: &S) -> CmapResult<Vec<String>> {
    let mut subjects = source.subjects()?;
    natural_sort(&mut subjects);
    Ok(subjects)
}

fn try_process<S, K>(
    source: &S,
    sink: &K,
    subject: &str,
    config: &BatchConfig,
) -> CmapResult<SubjectOutcome>
where
    S: VolumeSource + ?Sized,
    K: MapSink + ?Sized,
{
    let volume = config.assembler.assemble(source, subject)?;
    let map = generate_clusters(volume.view_dyn(), &config.cluster)?;
    drop(volume);
    let artifact = sink.persist(subject, &map)?;
    info!("Saved {} for {subject} to {}", map.record_name(), artifact.display());
    Ok(SubjectOutcome::Success {
        subject: subject.to_string(),
        artifact,
        populated: map.populated(),
    })
}

/// 处理单个受试者: 组装, 聚类, 保存. 任何错误 (包括 panic) 都被转换为 [`SubjectOutcome::Failure`].
pub fn process_subject<S, K>(
    source: &S,
    sink: &K,
    subject: &str,
    config: &BatchConfig,
) -> SubjectOutcome
where
    S: VolumeSource + ?Sized,
    K: MapSink + ?Sized,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        try_process(source, sink, subject, config)
    }));
    let reason = match result {
        Ok(Ok(outcome)) => return outcome,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(msg) => format!("panicked: {msg}"),
            None => match payload.downcast_ref::<String>() {
                Some(msg) => format!("panicked: {msg}"),
                None => "panicked".to_string(),
            },
        },
    };
    error!("Error processing {subject}: {reason}");
    SubjectOutcome::Failure {
        subject: subject.to_string(),
        reason,
    }
}

/// 处理 `source` 中的所有受试者, 约束图交给 `sink` 保存.
///
/// 只有列举受试者失败时返回错误; 单个受试者的失败记录在返回的 [`BatchReport`] 中.
pub fn run_batch<S, K>(source: &S, sink: &K, config: &BatchConfig) -> CmapResult<BatchReport>
where
    S: VolumeSource + ?Sized,
    K: MapSink + ?Sized,
{
    let subjects = subject_order(source)?;
    let total = subjects.len();
    let mut report = BatchReport::default();
    for (i, subject) in subjects.iter().enumerate() {
        info!("[{}/{total}] Processing {subject}", i + 1);
        report
            .outcomes
            .push(process_subject(source, sink, subject, config));
    }
    info!(
        "Batch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(report)
}
