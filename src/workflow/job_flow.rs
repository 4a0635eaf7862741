//! 单个作业处理流程 - 流程层
//!
//! 核心职责：定义"一个作业"的完整处理流程
//!
//! 流程顺序：
//! 1. 上传（命中缓存则跳过），重试时强制重新上传并等待远端就绪
//! 2. 远端识别
//! 3. 并行写出所有开启的格式，单个格式失败不影响其他格式
//!
//! 远端暂时无法拉取文件时，在作业内部线性退避重试，最多再试 2 次。

use crate::clients::OcrBackend;
use crate::config::Config;
use crate::error::{OcrError, OcrResult, RetryClass};
use crate::infrastructure::UploadCache;
use crate::models::{Job, JobSuccess, OcrResponse, OutputFormat, PerformanceMetrics, ProcessOptions};
use crate::services::{writers_for, OutputWriter, WriteOptions};
use crate::utils::cancel::{run_or_cancel, sleep_or_cancel};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 临时拉取失败后的额外尝试次数
const MAX_FETCH_RETRIES: u32 = 2;
/// 线性退避步长：第 n 次重试前等待 n × 3 秒
const FETCH_RETRY_STEP: Duration = Duration::from_secs(3);
/// 重新上传后等待远端就绪
const RETRY_SETTLE_DELAY: Duration = Duration::from_secs(2);
/// 同时写出的格式数上限
const MAX_SAVE_WORKERS: usize = 5;

/// 作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Uploading,
    RemoteProcessing,
    Saving,
    Done,
    Failed,
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "等待中",
            JobState::Uploading => "上传中",
            JobState::RemoteProcessing => "识别中",
            JobState::Saving => "保存中",
            JobState::Done => "完成",
            JobState::Failed => "失败",
        };
        f.write_str(s)
    }
}

/// 作业处理流程
///
/// - 不关心分组与并发，只处理单个作业
/// - 持有远端、上传缓存和输出写入器的共享引用
pub struct JobFlow {
    backend: Arc<dyn OcrBackend>,
    cache: Arc<UploadCache>,
    writers: Vec<Arc<dyn OutputWriter>>,
    options: ProcessOptions,
    output_dir: PathBuf,
    domain: String,
    save_permits: Arc<Semaphore>,
    settle_delay: Duration,
}

impl JobFlow {
    /// 创建新的作业处理流程
    pub fn new(config: &Config, backend: Arc<dyn OcrBackend>, cache: Arc<UploadCache>) -> Self {
        Self {
            backend,
            cache,
            writers: writers_for(&OutputFormat::enabled(config)),
            options: ProcessOptions {
                model: config.model.clone(),
                include_image_base64: config.include_images,
            },
            output_dir: PathBuf::from(&config.output_dir),
            domain: config.optimization_domain.clone(),
            save_permits: Arc::new(Semaphore::new(MAX_SAVE_WORKERS)),
            settle_delay: RETRY_SETTLE_DELAY,
        }
    }

    /// 替换输出写入器
    pub fn with_writers(mut self, writers: Vec<Arc<dyn OutputWriter>>) -> Self {
        self.writers = writers;
        self
    }

    pub fn cache(&self) -> &Arc<UploadCache> {
        &self.cache
    }

    /// 执行作业，包含临时拉取失败的重试
    pub async fn run(&self, job: &Job, cancel: &CancellationToken) -> OcrResult<JobSuccess> {
        let started = Instant::now();
        let mut retry_delays = Vec::new();
        let mut attempt = 0;

        loop {
            match self.attempt(job, attempt, cancel).await {
                Ok(mut success) => {
                    success.fetch_retry_delays = retry_delays;
                    success.metrics.total_time = started.elapsed();
                    self.log_state(job, JobState::Done);
                    return Ok(success);
                }
                Err(e) if e.retry_class() == RetryClass::TransientFetch && attempt < MAX_FETCH_RETRIES => {
                    attempt += 1;
                    let delay = FETCH_RETRY_STEP * attempt;
                    warn!(
                        "{} ⚠️ 远端暂时无法获取文件，{}s 后重试 ({}/{}): {}",
                        job,
                        delay.as_secs(),
                        attempt,
                        MAX_FETCH_RETRIES,
                        e
                    );
                    retry_delays.push(delay);
                    sleep_or_cancel(delay, cancel).await?;
                }
                Err(e) => {
                    error!("{} ❌ {}", job, e);
                    self.log_state(job, JobState::Failed);
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, job: &Job, attempt: u32, cancel: &CancellationToken) -> OcrResult<JobSuccess> {
        let force_fresh = attempt > 0;

        // ========== 上传 ==========
        self.log_state(job, JobState::Uploading);
        let upload_start = Instant::now();
        if force_fresh {
            match self.cache.invalidate(&job.file_path).await {
                Ok(true) => debug!("{} 已移除上传缓存", job),
                Ok(false) => {}
                Err(e) => debug!("{} 移除上传缓存失败: {}", job, e),
            }
        }
        let url = self
            .cache
            .get_or_upload(self.backend.as_ref(), &job.file_path, force_fresh, cancel)
            .await?;
        if force_fresh {
            sleep_or_cancel(self.settle_delay, cancel).await?;
        }
        let upload_time = upload_start.elapsed();

        // ========== 识别 ==========
        self.log_state(job, JobState::RemoteProcessing);
        let process_start = Instant::now();
        let response = run_or_cancel(cancel, self.backend.process(&url, &self.options)).await?;
        let processing_time = process_start.elapsed();
        info!(
            "{} ✓ 识别完成: {} 页 ({:.1}s)",
            job,
            response.page_count(),
            processing_time.as_secs_f64()
        );

        // ========== 保存 ==========
        self.log_state(job, JobState::Saving);
        let save_start = Instant::now();
        let page_count = response.page_count();
        let (saved, save_errors) = self.save_outputs(job, response).await;
        let save_time = save_start.elapsed();

        Ok(JobSuccess {
            job: job.clone(),
            saved,
            save_errors,
            metrics: PerformanceMetrics {
                upload_time,
                processing_time,
                save_time,
                total_time: Duration::ZERO,
                size_mb: job.size_mb,
                page_count,
            },
            fetch_retry_delays: Vec::new(),
            rate_limit_retried: false,
        })
    }

    /// 并行写出所有格式
    ///
    /// # 返回
    /// (成功写出的路径, 失败的格式及原因)
    async fn save_outputs(
        &self,
        job: &Job,
        response: OcrResponse,
    ) -> (BTreeMap<OutputFormat, PathBuf>, Vec<(OutputFormat, String)>) {
        let response = Arc::new(response);
        let base_name = job.output_base_name();
        let options = Arc::new(WriteOptions {
            title: job.original_stem(),
            domain: self.domain.clone(),
        });

        let tasks = self.writers.iter().map(|writer| {
            let writer = writer.clone();
            let response = response.clone();
            let options = options.clone();
            let permits = self.save_permits.clone();
            let path = writer.format().output_path(&self.output_dir, &base_name);
            let offset = job.page_offset;
            async move {
                let format = writer.format();
                let _permit = permits.acquire_owned().await;
                let result = tokio::task::spawn_blocking(move || writer.write(&response, &path, offset, &options))
                    .await
                    .unwrap_or_else(|e| Err(OcrError::save(format.name(), e.to_string())));
                (format, result)
            }
        });

        let mut saved = BTreeMap::new();
        let mut errors = Vec::new();
        for (format, result) in futures::future::join_all(tasks).await {
            match result {
                Ok(path) => {
                    saved.insert(format, path);
                }
                Err(e) => {
                    warn!("{} ⚠️ 保存 {} 失败: {}", job, format, e);
                    errors.push((format, e.to_string()));
                }
            }
        }
        (saved, errors)
    }

    fn log_state(&self, job: &Job, state: JobState) {
        debug!("{} 状态: {}", job, state);
    }
}
