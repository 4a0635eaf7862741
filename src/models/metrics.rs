//! 文件度量
//!
//! 从文件系统读取大小，从 PDF 读取页数（读不到时按大小估算），得到页密度。

use crate::error::{OcrError, OcrResult};
use crate::infrastructure::pdf;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 支持的输入扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "tiff", "tif"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 无法读取页数时，按每 MB 4 页估算
const ESTIMATED_PAGES_PER_MB: f64 = 4.0;

/// 单个文件的大小、页数和密度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetrics {
    pub path: PathBuf,
    pub size_mb: f64,
    pub total_pages: u32,
    /// MB / 页，页数为 0 时为 0
    pub density: f64,
}

impl FileMetrics {
    pub fn new(path: impl Into<PathBuf>, size_mb: f64, total_pages: u32) -> Self {
        let density = if total_pages > 0 {
            size_mb / total_pages as f64
        } else {
            0.0
        };
        Self {
            path: path.into(),
            size_mb,
            total_pages,
            density,
        }
    }

    /// 从文件系统提取度量
    ///
    /// # 参数
    /// - `path`: 文件路径
    /// - `total_pages`: 外部已知的页数；为 `None` 时自行统计
    ///
    /// # 返回
    /// 文件不存在返回 `NotFound`，扩展名不支持返回 `UnsupportedType`
    pub fn from_path(path: &Path, total_pages: Option<u32>) -> OcrResult<Self> {
        validate_supported(path)?;

        let meta = std::fs::metadata(path).map_err(|e| OcrError::io(path, e))?;
        let size_mb = meta.len() as f64 / BYTES_PER_MB;

        let pages = match total_pages {
            Some(p) => p,
            None if is_pdf(path) => match pdf::count_pages(path) {
                Ok(p) => p,
                Err(e) => {
                    let estimated = estimate_pages(size_mb);
                    warn!(
                        "⚠️ 无法读取页数 {}: {}，按大小估算为 {} 页",
                        path.display(),
                        e,
                        estimated
                    );
                    estimated
                }
            },
            None => 1,
        };

        Ok(Self::new(path, size_mb, pages))
    }
}

/// 按大小估算页数，至少 1 页
pub fn estimate_pages(size_mb: f64) -> u32 {
    ((size_mb * ESTIMATED_PAGES_PER_MB) as u32).max(1)
}

pub fn is_pdf(path: &Path) -> bool {
    extension_lower(path).as_deref() == Some("pdf")
}

pub fn is_supported(path: &Path) -> bool {
    extension_lower(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn validate_supported(path: &Path) -> OcrResult<()> {
    if !path.exists() {
        return Err(OcrError::not_found(path));
    }
    if !is_supported(path) {
        return Err(OcrError::unsupported(path));
    }
    Ok(())
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}
