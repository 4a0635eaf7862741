//! 并发批处理执行器 - 编排层
//!
//! ## 职责
//!
//! 把作业按大小分组后逐组执行，组内并发受限，组与组之间串行。
//!
//! ## 核心功能
//!
//! 1. **分组调度**：大 → 中 → 小，每组一个宽度为 `min(上限, 作业数)` 的 Semaphore
//! 2. **错峰派发**：组内第 2 个起，派发前等待 `max(分档延迟, 当前自适应延迟)`
//! 3. **限流重试**：被限流时增大延迟，等待 `2 × 延迟` 后整体重试一次
//! 4. **结果收集**：单一收集任务汇总成功 / 失败，并在每个作业完成后回调进度
//! 5. **取消**：取消令牌贯穿所有等待，未派发的作业记为已取消
//!
//! ## 设计特点
//!
//! - 单个作业失败不会中断批处理
//! - 限速状态在一次 `run` 内由所有工作任务共享

use crate::error::{OcrError, OcrResult, RetryClass};
use crate::infrastructure::AdaptiveRateController;
use crate::models::{BatchResult, Job, JobSuccess, SizeGroup};
use crate::orchestrator::job_grouper::{group_jobs, JobGroup};
use crate::utils::cancel::{check, sleep_or_cancel};
use crate::utils::logging::{log_group_complete, log_group_start, log_performance_summary};
use crate::workflow::JobFlow;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 分组进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProgress {
    pub group: SizeGroup,
    pub completed: usize,
    pub total: usize,
}

/// 并发批处理执行器
pub struct BatchExecutor {
    flow: Arc<JobFlow>,
    worker_override: Option<usize>,
    cancel: CancellationToken,
}

type Submission = (Job, JoinHandle<OcrResult<JobSuccess>>);

impl BatchExecutor {
    pub fn new(flow: Arc<JobFlow>, worker_override: Option<usize>, cancel: CancellationToken) -> Self {
        Self {
            flow,
            worker_override,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 执行全部作业
    ///
    /// # 参数
    /// - `jobs`: 待执行作业
    /// - `on_progress`: 组内每完成一个作业回调一次
    ///
    /// # 返回
    /// 汇总结果；单个作业失败只会记录在 `failed` 中
    pub async fn run<F>(&self, jobs: Vec<Job>, on_progress: F) -> BatchResult
    where
        F: Fn(GroupProgress) + Send + Sync,
    {
        let started = Instant::now();
        let rate = Arc::new(AdaptiveRateController::new());
        let groups = group_jobs(jobs, self.worker_override);
        let total_groups = groups.len();

        let mut result = BatchResult::default();
        for (idx, group) in groups.into_iter().enumerate() {
            let size_group = group.group;
            log_group_start(idx + 1, total_groups, size_group, group.width, group.jobs.len());

            let group_result = self.run_group(group, &rate, &on_progress).await;
            log_group_complete(size_group, &group_result);
            result.merge(group_result);
        }

        result.elapsed = started.elapsed();
        log_performance_summary(&result);
        result
    }

    /// 执行单个分组
    async fn run_group<F>(&self, group: JobGroup, rate: &Arc<AdaptiveRateController>, on_progress: &F) -> BatchResult
    where
        F: Fn(GroupProgress) + Send + Sync,
    {
        let JobGroup { group: size_group, width, jobs } = group;
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(width));
        let (tx, mut rx) = mpsc::unbounded_channel::<Submission>();

        let mut result = BatchResult::default();
        let mut not_submitted = Vec::new();
        let mut completed = 0;

        // 派发：错峰后 spawn，把句柄交给收集端
        let submit = async {
            for (i, job) in jobs.into_iter().enumerate() {
                if i > 0 {
                    let delay = rate.delay_for_size(job.size_mb).await;
                    debug!("{} 错峰等待 {:.1}s", job, delay.as_secs_f64());
                    if sleep_or_cancel(delay, &self.cancel).await.is_err() {
                        not_submitted.push(job);
                        continue;
                    }
                }
                if self.cancel.is_cancelled() {
                    not_submitted.push(job);
                    continue;
                }

                let handle = tokio::spawn(execute_job(
                    self.flow.clone(),
                    rate.clone(),
                    semaphore.clone(),
                    job.clone(),
                    self.cancel.clone(),
                ));
                if tx.send((job, handle)).is_err() {
                    break;
                }
            }
            drop(tx);
        };

        // 收集：唯一修改结果的地方
        let collect = async {
            let mut in_flight = FuturesUnordered::new();
            let mut open = true;
            loop {
                tokio::select! {
                    received = rx.recv(), if open => match received {
                        Some((job, handle)) => in_flight.push(async move { (job, handle.await) }),
                        None => open = false,
                    },
                    Some((job, joined)) = in_flight.next(), if !in_flight.is_empty() => {
                        completed += 1;
                        match joined {
                            Ok(Ok(success)) => result.record_success(success),
                            Ok(Err(e)) => result.record_failure(job, e),
                            Err(e) => {
                                warn!("{} 任务执行失败: {}", job, e);
                                result.record_failure(job, OcrError::Processing {
                                    status: None,
                                    message: format!("任务执行失败: {}", e),
                                });
                            }
                        }
                        on_progress(GroupProgress { group: size_group, completed, total });
                    }
                    else => break,
                }
            }
        };

        tokio::join!(submit, collect);

        for job in not_submitted {
            warn!("{} 已取消，未派发", job);
            result.record_failure(job, OcrError::Cancelled);
            completed += 1;
            on_progress(GroupProgress {
                group: size_group,
                completed,
                total,
            });
        }
        result
    }
}

/// 工作任务：占用并发名额后执行作业，被限流时整体重试一次
async fn execute_job(
    flow: Arc<JobFlow>,
    rate: Arc<AdaptiveRateController>,
    semaphore: Arc<Semaphore>,
    job: Job,
    cancel: CancellationToken,
) -> OcrResult<JobSuccess> {
    let _permit = semaphore.acquire_owned().await.map_err(|_| OcrError::Cancelled)?;
    check(&cancel)?;
    info!(
        "{} 🚀 开始处理 ({:.1} MB, {} 页)",
        job, job.size_mb, job.page_count
    );

    match flow.run(&job, &cancel).await {
        Ok(success) => {
            rate.on_success().await;
            info!("{} ✓ 完成", job);
            Ok(success)
        }
        Err(e) if e.retry_class() == RetryClass::RateLimited => {
            let delay = rate.on_rate_limited().await;
            let wait = delay * 2;
            warn!(
                "{} ⚠️ 被限流，{:.1}s 后重试: {}",
                job,
                wait.as_secs_f64(),
                e
            );
            sleep_or_cancel(wait, &cancel).await?;

            let mut success = flow.run(&job, &cancel).await?;
            rate.on_success().await;
            success.rate_limit_retried = true;
            info!("{} ✓ 重试后完成", job);
            Ok(success)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::UploadCache;
    use crate::test_support::ScriptedBackend;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    fn make_jobs(dir: &Path, sizes: &[f64]) -> Vec<Job> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let path = dir.join(format!("doc_{}.pdf", i));
                std::fs::write(&path, format!("content {}", i)).unwrap();
                Job::whole_file(i, &path, *size, 2, 0)
            })
            .collect()
    }

    fn executor(dir: &Path, backend: Arc<ScriptedBackend>, token: CancellationToken) -> BatchExecutor {
        let config = Config {
            output_dir: dir.join("out").to_string_lossy().to_string(),
            ..Config::default()
        };
        let flow = JobFlow::new(&config, backend, Arc::new(UploadCache::default()));
        BatchExecutor::new(Arc::new(flow), None, token)
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_group_runs_four_wide() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_process_delay(Duration::from_secs(30)));
        let exec = executor(dir.path(), backend.clone(), CancellationToken::new());
        let progress = Mutex::new(Vec::new());

        let result = exec
            .run(make_jobs(dir.path(), &[1.0; 5]), |p| progress.lock().unwrap().push(p))
            .await;

        assert_eq!(result.success.len(), 5);
        assert!(result.failed.is_empty());
        assert_eq!(backend.max_in_flight(), 4);

        let progress = progress.into_inner().unwrap();
        assert_eq!(progress.len(), 5);
        assert_eq!(progress.last().map(|p| (p.completed, p.total)), Some((5, 5)));
        assert!(progress.iter().all(|p| p.group == SizeGroup::Small));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_job_starts_immediately_later_jobs_are_staggered() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_process_delay(Duration::from_secs(10)));
        let exec = executor(dir.path(), backend.clone(), CancellationToken::new());

        let started = Instant::now();
        let result = exec.run(make_jobs(dir.path(), &[1.0, 1.0]), |_| {}).await;
        assert_eq!(result.success.len(), 2);

        let starts = backend.process_start_times();
        assert_eq!(starts.len(), 2);
        assert!(starts[0] - started < Duration::from_millis(100));
        // 小文件分档 0.5s，当前自适应延迟 1.5s，取较大者
        let gap = starts[1] - starts[0];
        assert!(gap >= Duration::from_millis(1500), "gap = {:?}", gap);
        assert!(gap < Duration::from_millis(1600), "gap = {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_process_results(vec![Err(
            OcrError::from_remote(Some(500), "internal error"),
        )]));
        let exec = executor(dir.path(), backend, CancellationToken::new());

        let result = exec.run(make_jobs(dir.path(), &[1.0, 1.0, 1.0]), |_| {}).await;

        assert_eq!(result.success.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].error.contains("internal error"));
        assert_eq!(result.status(), crate::models::BatchStatus::Partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_job_retries_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new().with_process_results(vec![Err(ScriptedBackend::rate_limited())]),
        );
        let exec = executor(dir.path(), backend.clone(), CancellationToken::new());

        let started = Instant::now();
        let result = exec.run(make_jobs(dir.path(), &[1.0]), |_| {}).await;

        assert_eq!(result.success.len(), 1);
        assert!(result.success[0].rate_limit_retried);
        assert_eq!(backend.process_calls(), 2);
        // 1.5s × 1.5 = 2.25s，等待 4.5s
        assert!(started.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_rate_limit_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_process_results(vec![
            Err(ScriptedBackend::rate_limited()),
            Err(ScriptedBackend::rate_limited()),
        ]));
        let exec = executor(dir.path(), backend.clone(), CancellationToken::new());

        let result = exec.run(make_jobs(dir.path(), &[1.0]), |_| {}).await;

        assert!(result.success.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind.retry_class(), RetryClass::RateLimited);
        assert_eq!(backend.process_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_run_large_first() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let exec = executor(dir.path(), backend, CancellationToken::new());
        let progress = Mutex::new(Vec::new());

        let result = exec
            .run(make_jobs(dir.path(), &[2.0, 40.0, 15.0]), |p| {
                progress.lock().unwrap().push(p.group)
            })
            .await;

        assert_eq!(result.success.len(), 3);
        assert_eq!(
            progress.into_inner().unwrap(),
            vec![SizeGroup::Large, SizeGroup::Medium, SizeGroup::Small]
        );
        let order: Vec<usize> = result.success.iter().map(|s| s.job.id).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_marks_remaining_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_process_delay(Duration::from_secs(600)));
        let token = CancellationToken::new();
        let exec = executor(dir.path(), backend, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let result = exec.run(make_jobs(dir.path(), &[1.0, 1.0, 1.0]), |_| {}).await;
        canceller.await.unwrap();

        assert!(result.success.is_empty());
        assert_eq!(result.failed.len(), 3);
        assert!(result
            .failed
            .iter()
            .all(|f| f.kind == OcrError::Cancelled));
    }
}
