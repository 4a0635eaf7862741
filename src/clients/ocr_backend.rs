use crate::error::OcrResult;
use crate::models::{OcrResponse, ProcessOptions, UploadedFile};
use async_trait::async_trait;

/// 远端 OCR 服务能力
///
/// 返回的错误应已按 `OcrError::from_remote` 分类，重试逻辑依赖这一点。
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// 上传文件内容
    async fn upload(&self, content: Vec<u8>, file_name: &str) -> OcrResult<UploadedFile>;

    /// 获取已上传文件的签名 URL
    async fn signed_url(&self, file: &UploadedFile, expiry_hours: u32) -> OcrResult<String>;

    /// 对文档 URL 执行识别
    async fn process(&self, document_url: &str, options: &ProcessOptions) -> OcrResult<OcrResponse>;
}
