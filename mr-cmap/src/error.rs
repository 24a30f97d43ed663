//! 运行时错误.

use std::path::PathBuf;
use thiserror::Error;

/// 约束图生成过程中的运行时错误.
#[derive(Error, Debug)]
pub enum CmapError {
    /// 配置错误, 如缺少输入/输出目录. 在处理任何受试者之前出现, 属于致命错误.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 某个对比度的体数据文件不存在.
    #[error("subject `{subject}` has no `{channel}` volume at {}", path.display())]
    MissingVolume {
        /// 受试者标识.
        subject: String,

        /// 对比度通道名.
        channel: String,

        /// 期望的文件位置.
        path: PathBuf,
    },

    /// nifti 文件无法读取或解析.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 形状不满足要求, 如聚类输入不是 4D, 或各对比度空间形状不一致.
    #[error("shape error: {0}")]
    Shape(String),

    /// 参数取值非法, 如聚类个数为 0.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 数值计算失败.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// npz 写入错误.
    #[error("npz write error: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 预览图写入错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<ndarray::ShapeError> for CmapError {
    #[inline]
    fn from(e: ndarray::ShapeError) -> Self {
        Self::Shape(e.to_string())
    }
}

/// 约束图生成的运行时结果.
pub type CmapResult<T> = Result<T, CmapError>;
