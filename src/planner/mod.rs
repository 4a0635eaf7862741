//! 拆分规划层
//!
//! - `split_planner` - 单个文件的拆分判断与方案评分
//! - `collection` - 多文件批次的排序、整体策略和耗时估算
//! - `job_builder` - 把方案展开为带页码偏移的作业

pub mod collection;
pub mod job_builder;
pub mod split_planner;

pub use collection::{estimate_processing_time, sort_files_intelligently, summarize, CollectionSummary};
pub use job_builder::{build_jobs, page_ranges, part_file_name, PartFile};
pub use split_planner::{
    alternative_plans, analyze, format_plan, no_split_plan, optimal_plan, plan, SplitAnalysis,
    SplitLimits, SplitPlan,
};
