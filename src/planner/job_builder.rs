//! 把拆分方案展开为作业列表
//!
//! 页码偏移在派发前就已确定，作业之间无需任何顺序协调。

use crate::models::{FileMetrics, Job, PageRange, PartInfo, SizeGroup};
use crate::planner::SplitPlan;
use std::path::{Path, PathBuf};

/// 按每份页数切出页码区间（最后一份可能较短）
pub fn page_ranges(total_pages: u32, pages_per_file: u32) -> Vec<PageRange> {
    if total_pages == 0 || pages_per_file == 0 {
        return Vec::new();
    }
    (0..total_pages.div_ceil(pages_per_file))
        .map(|i| PageRange {
            start: i * pages_per_file,
            end: ((i + 1) * pages_per_file).min(total_pages),
        })
        .collect()
}

/// 分片文件名：`<stem>_pag<start>-<end>.pdf`，页码从 1 开始
pub fn part_file_name(original: &Path, range: &PageRange) -> String {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_pag{:04}-{:04}.pdf", stem, range.start + 1, range.end)
}

/// 已经落盘的分片
#[derive(Debug, Clone, PartialEq)]
pub struct PartFile {
    pub path: PathBuf,
    pub range: PageRange,
    pub size_mb: f64,
}

/// 生成作业
///
/// # 参数
/// - `next_id`: 作业编号计数器，会被递增
/// - `metrics`: 原文件度量
/// - `plan`: 拆分方案
/// - `parts`: 拆分得到的分片；不拆分时为空
/// - `base_offset`: 该文件在整个批次中的起始页码
pub fn build_jobs(
    next_id: &mut usize,
    metrics: &FileMetrics,
    plan: &SplitPlan,
    parts: &[PartFile],
    base_offset: u32,
) -> Vec<Job> {
    if !plan.is_split() || parts.is_empty() {
        let job = Job::whole_file(
            *next_id,
            &metrics.path,
            metrics.size_mb,
            metrics.total_pages,
            base_offset,
        );
        *next_id += 1;
        return vec![job];
    }

    let count = parts.len() as u32;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let job = Job {
                id: *next_id,
                file_path: part.path.clone(),
                original_file: metrics.path.clone(),
                part: Some(PartInfo {
                    index: i as u32 + 1,
                    count,
                    first_page: part.range.start + 1,
                    last_page: part.range.end,
                }),
                page_offset: base_offset + part.range.start,
                page_count: part.range.len(),
                size_mb: part.size_mb,
                group: SizeGroup::for_size(part.size_mb),
            };
            *next_id += 1;
            job
        })
        .collect()
}
