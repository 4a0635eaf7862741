//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use crate::config::Config;
use crate::models::{BatchResult, BatchStatus, SizeGroup};
use crate::planner::CollectionSummary;
use anyhow::Result;
use std::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 优先读取 `RUST_LOG`，否则按是否详细日志使用 `debug` / `info`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nOCR 批处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - OCR 拆分批处理模式");
    info!("🤖 模型: {}", config.model);
    info!(
        "📏 限制: {} MB / {} 页 (安全系数 {} / {})",
        config.max_size_mb, config.max_pages, config.safety_factor_size, config.safety_factor_pages
    );
    match config.max_workers {
        Some(n) => info!("📊 并发上限: {} (手动指定)", n),
        None => info!("📊 并发上限: 大 2 / 中 3 / 小 4"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录多文件分析结果
pub fn log_collection_summary(summary: &CollectionSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📁 待处理文件: {} 个", summary.file_count);
    info!(
        "📦 总大小: {:.1} MB | 总页数: {} | 平均密度: {:.2} MB/页",
        summary.total_size_mb, summary.total_pages, summary.avg_density
    );
    info!("✂️ 拆分后预计作业数: {}", summary.estimated_parts);
    info!("🧭 整体策略: {}", summary.global_strategy);
    info!("⏱️ 预计耗时: {}", summary.estimated_time_text);
    for warning in &summary.warnings {
        warn!("⚠️ {}", warning);
    }
    info!("{}", "=".repeat(60));
}

/// 记录分组开始信息
///
/// # 参数
/// - `group_num`: 分组编号
/// - `total_groups`: 分组总数
/// - `group`: 大小分组
/// - `width`: 并发宽度
/// - `jobs`: 本组作业数
pub fn log_group_start(group_num: usize, total_groups: usize, group: SizeGroup, width: usize, jobs: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 组: {}", group_num, total_groups, group.label());
    info!("📄 本组作业: {} 个 | 并发: {}", jobs, width);
    info!("{}", "=".repeat(60));
}

/// 记录分组完成信息
pub fn log_group_complete(group: SizeGroup, result: &BatchResult) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {}组完成: 成功 {}/{}",
        group.label(),
        result.success.len(),
        result.total()
    );
    info!("{}", "─".repeat(60));
}

/// 记录性能汇总
pub fn log_performance_summary(result: &BatchResult) {
    if result.success.is_empty() {
        return;
    }
    let summary = result.summary();
    info!("=== 性能汇总 ===");
    info!("处理文件: {}", summary.succeeded);
    info!("总耗时: {:.1}s", result.elapsed.as_secs_f64());
    info!("总页数: {}", summary.total_pages);
    info!(
        "速度: {:.1} 页/秒, {:.2} MB/秒",
        summary.pages_per_second, summary.mb_per_second
    );
    info!(
        "平均耗时 - 上传: {:.1}s, 识别: {:.1}s, 保存: {:.1}s",
        summary.avg_upload_time.as_secs_f64(),
        summary.avg_processing_time.as_secs_f64(),
        summary.avg_save_time.as_secs_f64()
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `result`: 批处理结果
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(result: &BatchResult, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", result.success.len(), result.total());
    info!("❌ 失败: {}", result.failed.len());
    let partial = result.success.iter().filter(|s| s.is_partial()).count();
    if partial > 0 {
        info!("⚠️ 部分格式保存失败: {}", partial);
    }
    match result.status() {
        BatchStatus::Complete => info!("🎉 全部完成"),
        BatchStatus::Partial => warn!("⚠️ 部分完成"),
        BatchStatus::Failed => warn!("❌ 全部失败"),
        BatchStatus::Empty => info!("没有可处理的作业"),
    }
    for failure in &result.failed {
        warn!("  • {} {}", failure.job, truncate_text(&failure.error, 200));
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
