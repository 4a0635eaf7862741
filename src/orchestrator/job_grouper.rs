//! 作业分组
//!
//! 按文件大小把作业分为大 / 中 / 小三组，并决定每组的并发宽度。
//! 大文件占用远端资源多，先处理且并发最低。

use crate::models::{Job, SizeGroup};

/// 一个大小分组及其并发宽度
#[derive(Debug, Clone, PartialEq)]
pub struct JobGroup {
    pub group: SizeGroup,
    pub width: usize,
    pub jobs: Vec<Job>,
}

/// 把作业分组，按 大 → 中 → 小 的顺序返回，跳过空分组
///
/// # 参数
/// - `jobs`: 待处理作业
/// - `worker_override`: 覆盖每组默认的并发上限
pub fn group_jobs(jobs: Vec<Job>, worker_override: Option<usize>) -> Vec<JobGroup> {
    let mut buckets: Vec<(SizeGroup, Vec<Job>)> =
        SizeGroup::ORDER.iter().map(|g| (*g, Vec::new())).collect();

    for mut job in jobs {
        job.group = SizeGroup::for_size(job.size_mb);
        if let Some((_, bucket)) = buckets.iter_mut().find(|(g, _)| *g == job.group) {
            bucket.push(job);
        }
    }

    buckets
        .into_iter()
        .filter(|(_, jobs)| !jobs.is_empty())
        .map(|(group, jobs)| {
            let cap = worker_override.unwrap_or_else(|| group.default_workers()).max(1);
            JobGroup {
                group,
                width: cap.min(jobs.len()),
                jobs,
            }
        })
        .collect()
}
