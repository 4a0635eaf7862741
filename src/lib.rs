//! # OCR Split Batch
//!
//! 一个把大文件拆分后并发提交给 OCR 远端的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享状态，只暴露能力
//! - `UploadCache` - 以内容哈希为键缓存签名 URL
//! - `AdaptiveRateController` - 批处理内共享的自适应延迟
//! - `PdfSplitter` - 按页码区间物理拆分 PDF
//!
//! ### ② 规划层（Planner）
//! - `planner/` - 纯计算：是否拆分、拆成几份、方案评分、批次摘要
//!
//! ### ③ 业务能力层（Clients / Services）
//! - `clients/` - `OcrBackend` 及其 Mistral 实现
//! - `services/` - 每种输出格式一个 `OutputWriter`
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个作业"的完整处理流程
//! - `JobFlow` - 上传 → 识别 → 保存，含临时拉取失败的重试
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_executor` - 分组并发执行、错峰和限流重试
//! - `orchestrator/batch_processor` - 应用入口，准备作业并输出统计
//!
//! ## 模块结构

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use clients::{MistralClient, OcrBackend};
pub use config::Config;
pub use error::{OcrError, OcrResult, RetryClass};
pub use models::{BatchResult, FileMetrics, Job};
pub use orchestrator::{App, BatchExecutor, GroupProgress};
pub use planner::{SplitAnalysis, SplitLimits, SplitPlan};
pub use workflow::JobFlow;
