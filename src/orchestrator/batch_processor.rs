//! 批量 OCR 处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责输入文件的准备和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、创建远端客户端、上传缓存和执行器
//! 2. **批量加载**：扫描输入目录并智能排序
//! 3. **作业准备**：分析 → 最优方案 → 物理拆分 → 带页码偏移的作业
//! 4. **执行**：交给 `BatchExecutor`，Ctrl-C 触发取消
//! 5. **全局统计**：准备阶段的失败并入最终结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个作业的细节
//! - **资源所有者**：唯一持有远端客户端和上传缓存的模块

use crate::clients::{MistralClient, OcrBackend};
use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::infrastructure::{LopdfSplitter, PdfSplitter, UploadCache};
use crate::models::metrics::is_pdf;
use crate::models::{load_input_files, BatchResult, FileMetrics, Job};
use crate::orchestrator::batch_executor::{BatchExecutor, GroupProgress};
use crate::planner::job_builder::{build_jobs, page_ranges, PartFile};
use crate::planner::{analyze, format_plan, optimal_plan, summarize, CollectionSummary, SplitAnalysis, SplitLimits, SplitPlan};
use crate::utils::logging::{init_log_file, log_collection_summary, log_startup, print_final_stats};
use crate::workflow::JobFlow;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 上传缓存清扫间隔
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// 应用主结构
pub struct App {
    config: Config,
    cache: Arc<UploadCache>,
    executor: BatchExecutor,
    splitter: Arc<dyn PdfSplitter>,
}

/// 准备好的批次
#[derive(Debug)]
pub struct PreparedBatch {
    pub jobs: Vec<Job>,
    /// 准备阶段失败的文件
    pub failures: BatchResult,
    pub summary: CollectionSummary,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let backend: Arc<dyn OcrBackend> = Arc::new(MistralClient::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    /// 使用指定远端创建应用
    pub fn with_backend(config: Config, backend: Arc<dyn OcrBackend>) -> Self {
        let cache = Arc::new(UploadCache::new(
            Duration::from_secs(config.upload_cache_ttl_secs),
            config.signed_url_expiry_hours,
        ));
        let flow = JobFlow::new(&config, backend, cache.clone());
        let executor = BatchExecutor::new(Arc::new(flow), config.max_workers, CancellationToken::new());

        Self {
            config,
            cache,
            executor,
            splitter: Arc::new(LopdfSplitter),
        }
    }

    /// 替换 PDF 拆分实现
    pub fn with_splitter(mut self, splitter: Arc<dyn PdfSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.executor.cancel_token()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<BatchResult> {
        if !self.config.any_output_enabled() {
            bail!("未启用任何输出格式，请至少开启一种 SAVE_* 选项");
        }

        info!("\n📁 正在扫描待处理的文件...");
        let files = load_input_files(&self.config.input_folder).await?;
        if files.is_empty() {
            warn!("⚠️ 没有找到待处理的文件，程序结束");
            return Ok(BatchResult::default());
        }

        let prepared = prepare_jobs(&self.config, files, self.splitter.clone()).await?;
        log_collection_summary(&prepared.summary);

        let cancel = self.executor.cancel_token().clone();
        let sweeper = self
            .cache
            .clone()
            .spawn_sweeper(CACHE_SWEEP_INTERVAL, cancel.child_token());
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ 收到中断信号，正在取消剩余作业...");
                cancel.cancel();
            }
        });

        let mut result = self.executor.run(prepared.jobs, log_progress).await;
        interrupt.abort();
        sweeper.abort();

        result.merge(prepared.failures);
        print_final_stats(&result, &self.config.output_log_file);

        Ok(result)
    }
}

fn log_progress(progress: GroupProgress) {
    info!(
        "📈 {}进度: {}/{}",
        progress.group.label(),
        progress.completed,
        progress.total
    );
}

/// 为输入文件准备作业
///
/// # 参数
/// - `config`: 配置（限制、拆分开关、输出目录）
/// - `files`: 已排序的输入文件
/// - `splitter`: PDF 拆分实现
///
/// # 返回
/// 作业列表、准备失败的文件和整体分析摘要
pub async fn prepare_jobs(config: &Config, files: Vec<PathBuf>, splitter: Arc<dyn PdfSplitter>) -> Result<PreparedBatch> {
    let limits = config.split_limits()?;
    let split_dir = match &config.split_dir {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(&config.output_dir).join("_split"),
    };

    let mut jobs = Vec::new();
    let mut failures = BatchResult::default();
    let mut entries = Vec::new();
    let mut next_id = 0;
    let mut page_offset = 0;

    for path in files {
        let task_path = path.clone();
        let task_dir = split_dir.clone();
        let task_splitter = splitter.clone();
        let allow_split = config.allow_split;

        let outcome = tokio::task::spawn_blocking(move || {
            prepare_file(&task_path, &limits, allow_split, &task_dir, task_splitter.as_ref())
        })
        .await
        .unwrap_or_else(|e| {
            Err(OcrError::Processing {
                status: None,
                message: format!("准备任务执行失败: {}", e),
            })
        });

        match outcome {
            Ok((analysis, plan, parts)) => {
                let base_offset = if config.continuous_numbering { page_offset } else { 0 };
                let file_jobs = build_jobs(&mut next_id, &analysis.metrics, &plan, &parts, base_offset);
                page_offset += analysis.metrics.total_pages;
                jobs.extend(file_jobs);
                entries.push((analysis, plan));
            }
            Err(e) => {
                error!("❌ 文件准备失败 {}: {}", path.display(), e);
                let size_mb = std::fs::metadata(&path)
                    .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                    .unwrap_or(0.0);
                failures.record_failure(Job::whole_file(next_id, &path, size_mb, 0, 0), e);
                next_id += 1;
            }
        }
    }

    Ok(PreparedBatch {
        jobs,
        failures,
        summary: summarize(&entries),
    })
}

/// 分析单个文件并在需要时物理拆分
fn prepare_file(
    path: &Path,
    limits: &SplitLimits,
    allow_split: bool,
    split_dir: &Path,
    splitter: &dyn PdfSplitter,
) -> OcrResult<(SplitAnalysis, SplitPlan, Vec<PartFile>)> {
    let metrics = FileMetrics::from_path(path, None)?;
    let analysis = analyze(&metrics, limits);
    let plan = optimal_plan(&analysis);
    info!("📄 {}\n{}", path.display(), format_plan(&plan));

    if !analysis.requires_splitting {
        return Ok((analysis, plan, Vec::new()));
    }

    let blocker = if !allow_split {
        Some("已禁用拆分".to_string())
    } else if !is_pdf(path) {
        Some("非 PDF 文件无法拆分".to_string())
    } else if !plan.is_split() {
        Some(format!("仅 {} 页，无法继续拆分", metrics.total_pages))
    } else if plan.estimated_mb_per_file > limits.safe_max_size() {
        Some(format!(
            "拆分后每份 {:.1} MB 仍超出安全上限 {:.1} MB",
            plan.estimated_mb_per_file,
            limits.safe_max_size()
        ))
    } else {
        None
    };
    if let Some(blocker) = blocker {
        return Err(OcrError::SizeExceededPreSplit {
            path: path.display().to_string(),
            reason: format!("{}；{}", analysis.reason, blocker),
        });
    }

    let ranges = page_ranges(metrics.total_pages, plan.pages_per_file);
    let parts = splitter.split(path, &ranges, split_dir)?;
    info!("✂️ {} 拆分为 {} 个分片", path.display(), parts.len());
    Ok((analysis, plan, parts))
}
