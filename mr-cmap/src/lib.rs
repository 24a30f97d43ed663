#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将同一受试者的多对比度 3D MR 扫描归纳为一张离散标签的约束图
//! (constraint map), 供下游对比学习作为监督信号使用.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 目前主要负责处理 BraTS 格式的数据 (每个受试者一个目录,
//!   四个对比度各一个 nifti 文件). 其它数据集只要按相同模式组织,
//!   并提供对应的 [`dataset::ContrastProtocol`], 也可以工作.
//! 2. 数据层面的异常 (文件缺失, 形状不符等) 均以 [`CmapError`] 返回, 不会 panic.
//!
//! # 开发计划
//!
//! ### 体数据预处理 ✅
//!
//! 旋转校正, 居中裁剪/填充, min-max 归一化, 基于脑掩膜的百分位对比度拉伸.
//!
//! 实现位于 `mr-cmap/src/data/{geometry, intensity, window}.rs`.
//!
//! ### 多对比度体数据组装 ✅
//!
//! 按 [`dataset::ContrastProtocol`] 声明的顺序加载并堆叠各对比度.
//! 脑掩膜由第一个对比度导出, 所有对比度共用.
//!
//! 实现位于 `mr-cmap/src/assemble.rs`.
//!
//! ### 参数聚类 ✅
//!
//! PCA 降维 → 归一化 → 逐通道 TV 去噪 → mini-batch K-means.
//! 特征分解默认使用纯 Rust 的 Jacobi 迭代, 打开 `lapack` feature 后改用
//! `ndarray-linalg`.
//!
//! 实现位于 `mr-cmap/src/cluster/*`.
//!
//! ### 批处理 ✅
//!
//! 按自然序遍历受试者, 单个受试者失败不会中断整个批次,
//! 最终汇总为 [`batch::BatchReport`].
//!
//! 实现位于 `mr-cmap/src/batch.rs`.
//!
//! ### 约束图持久化 ✅
//!
//! 以 npz 格式存储 (`Constraint_map_<K>.npz`, 字段名 `param`),
//! 可选地输出中间切片的 PNG 预览.
//!
//! 实现位于 `mr-cmap/src/data/save.rs`.

/// 二维索引, 同时也用作水平切片形状 `(H, W)`.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也用作体数据空间形状 `(H, W, D)`.
pub type Idx3d = (usize, usize, usize);

pub mod assemble;
pub mod batch;
pub mod cluster;
pub mod consts;
pub mod data;
pub mod dataset;
mod error;
pub mod prelude;

pub use data::{BrainMask, ConstraintMap, ContrastVolume, IntensityWindow, MultiContrastVolume};
pub use error::{CmapError, CmapResult};
