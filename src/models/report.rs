//! 批处理结果与性能统计
//!
//! ## 职责
//!
//! - 记录每个作业的分阶段耗时（上传 / 识别 / 保存）
//! - 汇总成功与失败列表，区分全部成功、部分成功、全部失败
//! - 计算整体吞吐（页/秒、MB/秒）

use crate::error::OcrError;
use crate::models::{Job, OutputFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// 单个作业的性能指标
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub upload_time: Duration,
    pub processing_time: Duration,
    pub save_time: Duration,
    pub total_time: Duration,
    pub size_mb: f64,
    pub page_count: usize,
}

impl PerformanceMetrics {
    pub fn pages_per_second(&self) -> f64 {
        rate(self.page_count as f64, self.total_time)
    }

    pub fn mb_per_second(&self) -> f64 {
        rate(self.size_mb, self.total_time)
    }
}

fn rate(amount: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// 成功的作业
#[derive(Debug, Clone, Serialize)]
pub struct JobSuccess {
    pub job: Job,
    pub saved: BTreeMap<OutputFormat, PathBuf>,
    /// 保存失败的格式及原因
    pub save_errors: Vec<(OutputFormat, String)>,
    pub metrics: PerformanceMetrics,
    /// 临时拉取失败后的每次退避时长
    pub fetch_retry_delays: Vec<Duration>,
    /// 是否经历过一次限流重试
    pub rate_limit_retried: bool,
}

impl JobSuccess {
    /// 有格式保存失败
    pub fn is_partial(&self) -> bool {
        !self.save_errors.is_empty()
    }
}

/// 失败的作业，保留原始错误
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job: Job,
    pub error: String,
    #[serde(skip)]
    pub kind: OcrError,
}

impl JobFailure {
    pub fn new(job: Job, error: OcrError) -> Self {
        Self {
            job,
            error: error.to_string(),
            kind: error,
        }
    }
}

/// 批处理整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    /// 没有作业
    Empty,
    /// 全部成功且所有格式都已保存
    Complete,
    /// 有作业失败或有格式保存失败
    Partial,
    /// 全部失败
    Failed,
}

/// 批处理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub success: Vec<JobSuccess>,
    pub failed: Vec<JobFailure>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }

    pub fn record_success(&mut self, success: JobSuccess) {
        self.success.push(success);
    }

    pub fn record_failure(&mut self, job: Job, error: OcrError) {
        self.failed.push(JobFailure::new(job, error));
    }

    /// 合并另一个结果（耗时取和）
    pub fn merge(&mut self, other: BatchResult) {
        self.success.extend(other.success);
        self.failed.extend(other.failed);
        self.elapsed += other.elapsed;
    }

    pub fn status(&self) -> BatchStatus {
        if self.total() == 0 {
            BatchStatus::Empty
        } else if self.success.is_empty() {
            BatchStatus::Failed
        } else if !self.failed.is_empty() || self.success.iter().any(JobSuccess::is_partial) {
            BatchStatus::Partial
        } else {
            BatchStatus::Complete
        }
    }

    /// 汇总性能统计
    pub fn summary(&self) -> PerformanceSummary {
        let n = self.success.len();
        let sum = |f: fn(&PerformanceMetrics) -> Duration| -> Duration {
            self.success.iter().map(|s| f(&s.metrics)).sum()
        };
        let avg = |total: Duration| -> Duration {
            if n == 0 {
                Duration::ZERO
            } else {
                total / n as u32
            }
        };

        let total_pages: usize = self.success.iter().map(|s| s.metrics.page_count).sum();
        let total_mb: f64 = self.success.iter().map(|s| s.metrics.size_mb).sum();

        PerformanceSummary {
            succeeded: n,
            failed: self.failed.len(),
            partial: self.success.iter().filter(|s| s.is_partial()).count(),
            avg_upload_time: avg(sum(|m| m.upload_time)),
            avg_processing_time: avg(sum(|m| m.processing_time)),
            avg_save_time: avg(sum(|m| m.save_time)),
            total_pages,
            total_mb,
            pages_per_second: rate(total_pages as f64, self.elapsed),
            mb_per_second: rate(total_mb, self.elapsed),
        }
    }
}

/// 整体性能统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub partial: usize,
    pub avg_upload_time: Duration,
    pub avg_processing_time: Duration,
    pub avg_save_time: Duration,
    pub total_pages: usize,
    pub total_mb: f64,
    pub pages_per_second: f64,
    pub mb_per_second: f64,
}
