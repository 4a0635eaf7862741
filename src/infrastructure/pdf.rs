//! PDF 基础能力：统计页数、按页码区间物理拆分

use crate::error::{OcrError, OcrResult};
use crate::models::PageRange;
use crate::planner::job_builder::{part_file_name, PartFile};
use lopdf::Document;
use std::path::Path;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 读取 PDF 页数
pub fn count_pages(path: &Path) -> OcrResult<u32> {
    let doc = load(path)?;
    Ok(doc.get_pages().len() as u32)
}

fn load(path: &Path) -> OcrResult<Document> {
    if !path.exists() {
        return Err(OcrError::not_found(path));
    }
    Document::load(path).map_err(|e| OcrError::Io {
        path: path.display().to_string(),
        message: format!("无法解析 PDF: {}", e),
    })
}

/// 把 PDF 按页码区间拆成多个文件
pub trait PdfSplitter: Send + Sync {
    fn split(&self, source: &Path, ranges: &[PageRange], output_dir: &Path) -> OcrResult<Vec<PartFile>>;
}

/// 基于 lopdf 的拆分实现
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSplitter;

impl PdfSplitter for LopdfSplitter {
    fn split(&self, source: &Path, ranges: &[PageRange], output_dir: &Path) -> OcrResult<Vec<PartFile>> {
        let doc = load(source)?;
        let total = doc.get_pages().len() as u32;
        std::fs::create_dir_all(output_dir).map_err(|e| OcrError::io(output_dir, e))?;

        let mut parts = Vec::with_capacity(ranges.len());
        for range in ranges {
            // 页码从 1 开始
            let to_delete: Vec<u32> = (1..=total)
                .filter(|p| *p <= range.start || *p > range.end)
                .collect();

            let mut part = doc.clone();
            part.delete_pages(&to_delete);
            part.prune_objects();
            part.compress();

            let path = output_dir.join(part_file_name(source, range));
            part.save(&path).map_err(|e| OcrError::io(&path, e))?;

            let size = std::fs::metadata(&path).map_err(|e| OcrError::io(&path, e))?.len();
            debug!(
                "✂️ 生成分片 {} (第 {}-{} 页, {:.1} MB)",
                path.display(),
                range.start + 1,
                range.end,
                size as f64 / BYTES_PER_MB
            );
            parts.push(PartFile {
                path,
                range: *range,
                size_mb: size as f64 / BYTES_PER_MB,
            });
        }
        Ok(parts)
    }
}
