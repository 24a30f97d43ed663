//! 每个受试者一个目录的 nifti 数据集.
//!
//! 目录结构形如:
//!
//! ```text
//! data_dir/
//! ├── BraTS20_001/
//! │   ├── BraTS20_001_t1ce.nii.gz
//! │   ├── BraTS20_001_t2.nii.gz
//! │   ├── BraTS20_001_t1.nii.gz
//! │   └── BraTS20_001_flair.nii.gz
//! └── BraTS20_002/
//!     └── ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use super::{ContrastChannel, VolumeSource};
use crate::{CmapError, CmapResult, ContrastVolume};

/// 打开 nii (或 nii.gz) 文件格式的 3D 体数据. 强度以 `f32` 保存, 轴顺序与文件一致.
///
/// 末尾长度为 1 的第四维 (单时间点) 会被去掉. 其它非 3D 数据返回 [`CmapError::Shape`].
pub fn open_volume<P: AsRef<Path>>(path: P) -> CmapResult<ContrastVolume> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let mut data = obj.into_volume().into_ndarray::<f32>()?;
    if data.ndim() == 4 && data.len_of(Axis(3)) == 1 {
        data = data.index_axis_move(Axis(3), 0);
    }
    let ndim = data.ndim();
    let data = data.into_dimensionality::<Ix3>().map_err(|_| {
        CmapError::Shape(format!(
            "{} holds a {ndim}D volume, expected 3D",
            path.as_ref().display()
        ))
    })?;

    // nifti 体数据在内存中是列优先的.
    Ok(data.as_standard_layout().into_owned())
}

/// 每个受试者一个子目录的 nifti 数据源.
#[derive(Debug, Clone)]
pub struct NiftiDirSource {
    root: PathBuf,
}

impl NiftiDirSource {
    /// 以 `root` 为数据集根目录.
    ///
    /// `root` 不是目录时返回 [`CmapError::Configuration`].
    pub fn new<P: AsRef<Path>>(root: P) -> CmapResult<Self> {
        let root = root.as_ref().to_owned();
        if !root.is_dir() {
            return Err(CmapError::Configuration(format!(
                "input data directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// 数据集根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 受试者 `subject` 的 `channel` 对比度文件路径.
    #[inline]
    pub fn volume_path(&self, subject: &str, channel: &ContrastChannel) -> PathBuf {
        self.root.join(subject).join(channel.file_name(subject))
    }
}

impl VolumeSource for NiftiDirSource {
    /// 根目录下的每个子目录都是一个受试者. 普通文件被忽略.
    fn subjects(&self) -> CmapResult<Vec<String>> {
        let mut ans = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ans.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(ans)
    }

    fn load(&self, subject: &str, channel: &ContrastChannel) -> CmapResult<ContrastVolume> {
        let path = self.volume_path(subject, channel);
        if !path.is_file() {
            return Err(CmapError::MissingVolume {
                subject: subject.to_string(),
                channel: channel.name().to_string(),
                path,
            });
        }
        open_volume(path)
    }
}
