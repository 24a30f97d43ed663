//! 通用常量与默认参数.

/// 水平切片的默认目标边长 (像素). 裁剪后的切片形状为 `(160, 160)`.
pub const DEFAULT_OP_SHAPE: usize = 160;

/// K-means 默认聚类个数. 经验上 20 或 30 效果较好.
pub const DEFAULT_NUM_CLUSTER: usize = 20;

/// PCA 默认保留的主成分个数.
pub const DEFAULT_RETAINED_COMPONENTS: usize = 4;

/// 默认随机种子.
pub const DEFAULT_SEED: u64 = 0;

/// TV 去噪的默认正则化权重.
pub const DEFAULT_TV_WEIGHT: f32 = 40.0;

/// 对比度拉伸的默认下百分位.
pub const DEFAULT_LOWER_PERCENTILE: f64 = 0.01;

/// 对比度拉伸的默认上百分位.
pub const DEFAULT_UPPER_PERCENTILE: f64 = 99.9;

/// 约束图记录中唯一字段的名字.
pub const CONSTRAINT_MAP_FIELD: &str = "param";

/// 约束图文件名前缀. 完整文件名形如 `Constraint_map_20.npz`.
pub const CONSTRAINT_MAP_PREFIX: &str = "Constraint_map_";

/// BraTS 数据集的对比度约定.
pub mod brats {
    /// 增强 T1 (T1Gd). 脑掩膜由该对比度导出, 因此必须排在首位.
    pub const T1CE: (&str, &str) = ("t1ce", "_t1ce.nii.gz");

    /// T2 加权.
    pub const T2: (&str, &str) = ("t2", "_t2.nii.gz");

    /// T1 加权.
    pub const T1: (&str, &str) = ("t1", "_t1.nii.gz");

    /// T2-FLAIR.
    pub const FLAIR: (&str, &str) = ("flair", "_flair.nii.gz");

    /// `(通道名, 文件名后缀)`, 按堆叠顺序排列.
    pub const CHANNELS: [(&str, &str); 4] = [T1CE, T2, T1, FLAIR];
}
