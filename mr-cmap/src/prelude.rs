//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{BrainMask, CmapError, CmapResult, ConstraintMap, ContrastVolume};
pub use crate::{IntensityWindow, MultiContrastVolume};

pub use crate::data::{MapSink, NpzDirSink};
pub use crate::dataset::{ContrastProtocol, InMemorySource, NiftiDirSource, VolumeSource};

pub use crate::assemble::Assembler;
pub use crate::cluster::{generate_clusters, ClusterParams, MiniBatchParams, TvParams};

pub use crate::batch::{process_subject, run_batch, BatchConfig, BatchReport, SubjectOutcome};

pub use crate::consts::{DEFAULT_NUM_CLUSTER, DEFAULT_OP_SHAPE};
