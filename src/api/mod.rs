//! API 模块
//!
//! 对外暴露的入口：单文件分析、拆分方案和批量执行

use crate::clients::OcrBackend;
use crate::config::Config;
use crate::error::OcrResult;
use crate::infrastructure::UploadCache;
use crate::models::{BatchResult, FileMetrics, Job};
use crate::orchestrator::{BatchExecutor, GroupProgress};
use crate::planner::{self, SplitAnalysis, SplitLimits, SplitPlan};
use crate::workflow::JobFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 分析单个文件
///
/// # 参数
/// - `path`: 文件路径
/// - `total_pages`: 已知页数；`None` 时自动统计
/// - `limits`: 大小和页数限制
pub fn analyze_file(
    path: &Path,
    total_pages: Option<u32>,
    limits: &SplitLimits,
) -> OcrResult<(FileMetrics, SplitAnalysis)> {
    limits.validate()?;
    let metrics = FileMetrics::from_path(path, total_pages)?;
    let analysis = planner::analyze(&metrics, limits);
    Ok((metrics, analysis))
}

/// 计算拆分方案，`num_files` 为 `None` 时使用最少份数
pub fn plan_split(analysis: &SplitAnalysis, num_files: Option<u32>) -> SplitPlan {
    planner::plan(analysis, num_files)
}

/// 最多 3 个按评分排序的候选方案
pub fn alternative_plans(analysis: &SplitAnalysis) -> Vec<SplitPlan> {
    planner::alternative_plans(analysis)
}

/// 用指定远端执行一批作业
///
/// # 参数
/// - `backend`: OCR 远端
/// - `jobs`: 已准备好的作业
/// - `config`: 配置（输出格式、并发上限、缓存有效期）
/// - `on_progress`: 组内每完成一个作业回调一次
pub async fn run_batch<F>(
    backend: Arc<dyn OcrBackend>,
    jobs: Vec<Job>,
    config: &Config,
    on_progress: F,
) -> BatchResult
where
    F: Fn(GroupProgress) + Send + Sync,
{
    let cache = Arc::new(UploadCache::new(
        Duration::from_secs(config.upload_cache_ttl_secs),
        config.signed_url_expiry_hours,
    ));
    let flow = Arc::new(JobFlow::new(config, backend, cache));
    BatchExecutor::new(flow, config.max_workers, CancellationToken::new())
        .run(jobs, on_progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::test_support::ScriptedBackend;

    #[test]
    fn test_analyze_file_with_known_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();

        let (metrics, analysis) = analyze_file(&path, Some(1), &SplitLimits::default()).unwrap();
        assert_eq!(metrics.total_pages, 1);
        assert!(!analysis.requires_splitting);
        assert_eq!(plan_split(&analysis, None).num_files, 1);
        assert_eq!(alternative_plans(&analysis).len(), 1);
    }

    #[test]
    fn test_analyze_file_rejects_bad_limits() {
        let limits = SplitLimits {
            safety_factor_size: 1.5,
            ..SplitLimits::default()
        };
        let result = analyze_file(Path::new("whatever.pdf"), None, &limits);
        assert!(matches!(result, Err(OcrError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();
        let config = Config {
            output_dir: dir.path().join("out").to_string_lossy().to_string(),
            ..Config::default()
        };

        let jobs = vec![Job::whole_file(0, &path, 1.0, 2, 0)];
        let result = run_batch(Arc::new(ScriptedBackend::new()), jobs, &config, |_| {}).await;

        assert_eq!(result.success.len(), 1);
        assert!(dir.path().join("out").join("doc.md").exists());
    }
}
