//! 约束图的持久化存储.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray_npy::NpzWriter;

use super::ConstraintMap;
use crate::consts::CONSTRAINT_MAP_FIELD;
use crate::CmapResult;

/// 约束图的持久化端. 给定受试者标识, 将约束图写到某处, 并返回写入位置.
///
/// 同一受试者、同一 K 的重复写入直接覆盖, 不做版本管理.
pub trait MapSink {
    /// 持久化 `subject` 的约束图 `map`.
    fn persist(&self, subject: &str, map: &ConstraintMap) -> CmapResult<PathBuf>;
}

/// 按 `{root}/{subject}/Constraint_map_{K}.npz` 存储约束图的目录.
///
/// 每个 npz 文件只包含一个数组, 名为 `param`, 元素类型为 `u32`.
#[derive(Debug, Clone)]
pub struct NpzDirSink {
    root: PathBuf,
    preview: bool,
}

impl NpzDirSink {
    /// 以 `root` 为输出根目录. 目录不必事先存在.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            preview: false,
        }
    }

    /// 是否在 npz 旁额外输出中间水平切片的 PNG 预览.
    #[inline]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// 输出根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 受试者 `subject` 的输出目录.
    #[inline]
    pub fn subject_dir(&self, subject: &str) -> PathBuf {
        self.root.join(subject)
    }

    /// 受试者 `subject` 在 K = `num_cluster` 时的约束图路径.
    pub fn artifact_path(&self, subject: &str, num_cluster: usize) -> PathBuf {
        self.subject_dir(subject).join(format!(
            "{}{num_cluster}.npz",
            crate::consts::CONSTRAINT_MAP_PREFIX
        ))
    }
}

impl MapSink for NpzDirSink {
    fn persist(&self, subject: &str, map: &ConstraintMap) -> CmapResult<PathBuf> {
        fs::create_dir_all(self.subject_dir(subject))?;
        let path = self.artifact_path(subject, map.num_cluster());
        map.write_npz(&path)?;
        if self.preview {
            map.save_preview(path.with_extension("png"))?;
        }
        Ok(path)
    }
}

impl ConstraintMap {
    /// 将约束图以 npz 格式写到 `path`. 文件内唯一的数组名为 `param`.
    pub fn write_npz<P: AsRef<Path>>(&self, path: P) -> CmapResult<()> {
        let mut npz = NpzWriter::new(File::create(path)?);
        npz.add_array(CONSTRAINT_MAP_FIELD, &self.labels)?;
        npz.finish()?;
        Ok(())
    }

    /// 将中间水平切片 (深度轴) 保存为灰度 PNG, 便于目视检查.
    ///
    /// 标签 `l` 被映射为灰度 `l * 255 / (K - 1)`.
    pub fn save_preview<P: AsRef<Path>>(&self, path: P) -> CmapResult<()> {
        let (height, width, depth) = self.shape();
        let sli = self.slice_at(depth / 2);
        let scale = 255 / self.num_cluster.saturating_sub(1).max(1) as u32;
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &label) in sli.indexed_iter() {
            let gray = (label * scale).min(255) as u8;
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf.save(path)?;
        Ok(())
    }
}
