//! 多文件批次的排序与整体分析

use crate::planner::split_planner::{SplitAnalysis, SplitPlan};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// 超过该比例的文件为高 / 低密度时，整体视为对应类型
const MAJORITY_RATIO: f64 = 0.6;

/// 按大小估算页数：每 MB 2 页
const ESTIMATED_PAGES_PER_MB: f64 = 2.0;
/// 远端吞吐：每秒 0.5 页
const PAGES_PER_SECOND: f64 = 0.5;
/// 每个文件的固定开销（秒）
const PER_FILE_OVERHEAD_SECS: f64 = 2.0;
const ESTIMATE_MARGIN: f64 = 1.2;

/// 排序键：带编号的文件在前（按编号），其余按文件名
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum OrderKey {
    Numbered(u32, String),
    Named(String),
}

fn numbered_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"vol(?:umen)?[_\s]*(\d+)",
            r"tomo[_\s]*(\d+)",
            r"parte[_\s]*(\d+)",
            r"libro[_\s]*(\d+)",
            r"capitulo[_\s]*(\d+)",
            r"(\d+)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn roman_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"vol(?:umen)?[_\s]*([ivx]+)", r"tomo[_\s]*([ivx]+)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn roman_to_int(roman: &str) -> u32 {
    match roman {
        "i" => 1,
        "ii" => 2,
        "iii" => 3,
        "iv" => 4,
        "v" => 5,
        "vi" => 6,
        "vii" => 7,
        "viii" => 8,
        "ix" => 9,
        "x" => 10,
        _ => 999,
    }
}

fn order_key(path: &Path) -> OrderKey {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    for pattern in numbered_patterns() {
        if let Some(caps) = pattern.captures(&name) {
            if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                return OrderKey::Numbered(n, name);
            }
        }
    }
    for pattern in roman_patterns() {
        if let Some(caps) = pattern.captures(&name) {
            let n = caps.get(1).map(|m| roman_to_int(m.as_str())).unwrap_or(999);
            return OrderKey::Numbered(n, name);
        }
    }
    OrderKey::Named(name)
}

/// 按卷号 / 册号 / 部分号等规则排序文件
pub fn sort_files_intelligently(mut files: Vec<PathBuf>) -> Vec<PathBuf> {
    files.sort_by_cached_key(|p| order_key(p));
    files
}

/// 多文件批次的整体分析
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub file_count: usize,
    pub total_size_mb: f64,
    pub total_pages: u32,
    pub avg_density: f64,
    /// 拆分后预计的分片总数
    pub estimated_parts: u32,
    pub global_strategy: String,
    pub estimated_time: Duration,
    pub estimated_time_text: String,
    pub warnings: Vec<String>,
}

/// 汇总多个文件的分析结果与方案
pub fn summarize(entries: &[(SplitAnalysis, SplitPlan)]) -> CollectionSummary {
    let total_size_mb: f64 = entries.iter().map(|(a, _)| a.metrics.size_mb).sum();
    let total_pages: u32 = entries.iter().map(|(a, _)| a.metrics.total_pages).sum();
    let avg_density = if total_pages > 0 {
        total_size_mb / total_pages as f64
    } else {
        0.0
    };

    let warnings = entries
        .iter()
        .filter(|(_, p)| !p.warnings.is_empty())
        .map(|(a, p)| {
            format!(
                "{}: {}",
                a.metrics.path.display(),
                p.warnings.join("; ")
            )
        })
        .collect();

    let sizes: Vec<f64> = entries.iter().map(|(a, _)| a.metrics.size_mb).collect();
    let (estimated_time, estimated_time_text) = estimate_processing_time(&sizes);

    CollectionSummary {
        file_count: entries.len(),
        total_size_mb,
        total_pages,
        avg_density,
        estimated_parts: entries.iter().map(|(_, p)| p.num_files).sum(),
        global_strategy: global_strategy(entries.iter().map(|(a, _)| a)),
        estimated_time,
        estimated_time_text,
        warnings,
    }
}

/// 整体策略
pub fn global_strategy<'a>(analyses: impl Iterator<Item = &'a SplitAnalysis>) -> String {
    let analyses: Vec<&SplitAnalysis> = analyses.collect();
    if analyses.is_empty() {
        return "no-files".to_string();
    }
    if !analyses.iter().any(|a| a.requires_splitting) {
        return "direct-processing".to_string();
    }

    let total = analyses.len() as f64;
    let high = analyses.iter().filter(|a| a.metrics.density > 1.0).count() as f64;
    let low = analyses.iter().filter(|a| a.metrics.density < 0.1).count() as f64;

    if high > total * MAJORITY_RATIO {
        "image-heavy-collection".to_string()
    } else if low > total * MAJORITY_RATIO {
        "text-heavy-collection".to_string()
    } else {
        "mixed-content-collection".to_string()
    }
}

/// 估算处理时间
///
/// # 参数
/// - `sizes_mb`: 每个文件的大小
///
/// # 返回
/// (预计耗时, 可读描述)
pub fn estimate_processing_time(sizes_mb: &[f64]) -> (Duration, String) {
    let total_pages: u32 = sizes_mb
        .iter()
        .filter(|s| **s > 0.0)
        .map(|s| ((s * ESTIMATED_PAGES_PER_MB) as u32).max(1))
        .sum();

    let base = total_pages as f64 / PAGES_PER_SECOND;
    let overhead = sizes_mb.len() as f64 * PER_FILE_OVERHEAD_SECS;
    let seconds = (base + overhead) * ESTIMATE_MARGIN;

    let text = if seconds < 60.0 {
        format!("{:.0} 秒", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1} 分钟", seconds / 60.0)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}小时 {}分钟", hours, minutes)
    };

    (Duration::from_secs_f64(seconds), text)
}
