//! 基础设施层
//!
//! - `pdf` - 页数统计与物理拆分（lopdf）
//! - `upload_cache` - 以内容哈希为键的上传缓存
//! - `rate_controller` - 批处理内共享的自适应限速状态

pub mod pdf;
pub mod rate_controller;
pub mod upload_cache;

pub use pdf::{count_pages, LopdfSplitter, PdfSplitter};
pub use rate_controller::{AdaptiveRateController, RateState};
pub use upload_cache::{content_hash, UploadCache, UploadCacheEntry};
