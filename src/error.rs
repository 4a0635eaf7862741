//! 错误类型
//!
//! ## 职责
//!
//! 统一描述拆分规划、上传、远端识别、保存各阶段的失败，
//! 并给出重试分类（`RetryClass`），供重试包装器判断走哪条路径。

use std::path::Path;
use thiserror::Error;

/// 远端返回 "请求过于频繁" 时的特征文本
const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "429",
    "rate limit",
    "too many requests",
    "quota exceeded",
    "throttled",
    "rate exceeded",
];

/// 远端暂时无法拉取已上传文件时的特征文本
const TRANSIENT_FETCH_SIGNATURES: &[&str] = &[
    "3310",
    "could not be fetched from url",
    "file could not be fetched",
    "invalid_request_file",
];

/// 应用程序错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcrError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },

    /// 不支持的文件类型
    #[error("不支持的文件类型: {path} ({extension})")]
    UnsupportedType { path: String, extension: String },

    /// 文件超出限制，但调用方要求不拆分
    #[error("文件超出限制且未拆分: {path} ({reason})")]
    SizeExceededPreSplit { path: String, reason: String },

    /// 远端限流
    #[error("远端限流: {message}")]
    RateLimited { message: String },

    /// 远端暂时无法拉取文件
    #[error("远端暂时无法获取文件: {message}")]
    TransientFetch { message: String },

    /// 上传或签名 URL 获取失败
    #[error("上传失败 ({file_name}): {message}")]
    Upload { file_name: String, message: String },

    /// 某个输出格式保存失败
    #[error("保存 {format} 失败: {message}")]
    Save { format: String, message: String },

    /// 远端处理的其他错误
    #[error("远端处理失败: {message}")]
    Processing {
        status: Option<u16>,
        message: String,
    },

    /// 本地 IO 错误
    #[error("IO 错误 ({path}): {message}")]
    Io { path: String, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 任务被取消
    #[error("任务已取消")]
    Cancelled,
}

/// 重试分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// 退避后整体重试一次
    RateLimited,
    /// 作业内部线性退避重试
    TransientFetch,
    /// 不重试
    Fatal,
}

impl OcrError {
    /// 错误对应的重试分类
    pub fn retry_class(&self) -> RetryClass {
        match self {
            OcrError::RateLimited { .. } => RetryClass::RateLimited,
            OcrError::TransientFetch { .. } => RetryClass::TransientFetch,
            _ => RetryClass::Fatal,
        }
    }

    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        self.retry_class() != RetryClass::Fatal
    }

    /// 根据远端返回的状态码和错误文本构造错误
    ///
    /// 先匹配限流特征，再匹配临时拉取失败特征，其余归为 `Processing`。
    pub fn from_remote(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_message(status, &message) {
            RetryClass::RateLimited => OcrError::RateLimited { message },
            RetryClass::TransientFetch => OcrError::TransientFetch { message },
            RetryClass::Fatal => OcrError::Processing { status, message },
        }
    }

    // ========== 便捷构造函数 ==========

    pub fn not_found(path: &Path) -> Self {
        OcrError::NotFound {
            path: path.display().to_string(),
        }
    }

    pub fn unsupported(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "无扩展名".to_string());
        OcrError::UnsupportedType {
            path: path.display().to_string(),
            extension,
        }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::not_found(path);
        }
        OcrError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn upload(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        OcrError::Upload {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    pub fn save(format: impl Into<String>, message: impl Into<String>) -> Self {
        OcrError::Save {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        OcrError::Config(message.into())
    }
}

/// 按特征文本对远端错误分类（大小写不敏感）
pub fn classify_message(status: Option<u16>, message: &str) -> RetryClass {
    if status == Some(429) {
        return RetryClass::RateLimited;
    }
    let lower = message.to_lowercase();
    if RATE_LIMIT_SIGNATURES.iter().any(|s| lower.contains(s)) {
        RetryClass::RateLimited
    } else if TRANSIENT_FETCH_SIGNATURES.iter().any(|s| lower.contains(s)) {
        RetryClass::TransientFetch
    } else {
        RetryClass::Fatal
    }
}

impl From<reqwest::Error> for OcrError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        OcrError::from_remote(status, err.to_string())
    }
}

impl From<serde_json::Error> for OcrError {
    fn from(err: serde_json::Error) -> Self {
        OcrError::Processing {
            status: None,
            message: format!("JSON 解析失败: {}", err),
        }
    }
}

/// 应用程序结果类型
pub type OcrResult<T> = Result<T, OcrError>;
