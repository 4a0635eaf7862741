pub mod job;
pub mod loaders;
pub mod metrics;
pub mod ocr;
pub mod output;
pub mod report;

pub use job::{Job, PageRange, PartInfo, SizeGroup};
pub use loaders::load_input_files;
pub use metrics::FileMetrics;
pub use ocr::{OcrImage, OcrPage, OcrResponse, ProcessOptions, UploadedFile};
pub use output::OutputFormat;
pub use report::{BatchResult, BatchStatus, JobFailure, JobSuccess, PerformanceMetrics, PerformanceSummary};
