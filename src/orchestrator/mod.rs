//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 扫描输入目录并准备作业（分析、拆分、页码偏移）
//! - 处理 Ctrl-C 取消
//! - 输出全局统计信息
//!
//! ### `job_grouper` - 作业分组
//! - 按大小分为 大 / 中 / 小 三组并决定并发宽度
//!
//! ### `batch_executor` - 并发执行器
//! - 组内 Semaphore 限流、错峰派发
//! - 限流后的整体重试
//! - 单一收集任务汇总结果并回调进度
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<PathBuf>)
//!     ↓
//! batch_executor (处理 Vec<Job>)
//!     ↓
//! workflow::JobFlow (处理单个 Job)
//!     ↓
//! services / clients (输出写入 / 远端)
//!     ↓
//! infrastructure (上传缓存、限速、PDF)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管准备，batch_executor 管并发
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体识别判断

pub mod batch_executor;
pub mod batch_processor;
pub mod job_grouper;

// 重新导出主要类型
pub use batch_executor::{BatchExecutor, GroupProgress};
pub use batch_processor::{prepare_jobs, App, PreparedBatch};
pub use job_grouper::{group_jobs, JobGroup};
