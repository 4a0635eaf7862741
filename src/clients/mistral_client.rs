/// Mistral OCR HTTP 客户端
///
/// 封装文件上传、签名 URL 获取和 OCR 调用
use crate::clients::OcrBackend;
use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::models::{OcrResponse, ProcessOptions, UploadedFile};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Mistral OCR 客户端
pub struct MistralClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: String,
}

impl MistralClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> OcrResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(OcrError::config("未设置 API Key (MISTRAL_API_KEY)"));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OcrError::config(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self::with_client(http, &config.api_base_url, &config.api_key))
    }

    pub fn with_client(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 非 2xx 响应转为已分类的错误
    async fn check(response: Response) -> OcrResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OcrError::from_remote(
            Some(status.as_u16()),
            format!("HTTP {}: {}", status.as_u16(), body),
        ))
    }
}

/// 构造 OCR 请求体
pub fn ocr_request_body(document_url: &str, options: &ProcessOptions) -> Value {
    json!({
        "model": options.model,
        "document": {
            "type": "document_url",
            "document_url": document_url,
        },
        "include_image_base64": options.include_image_base64,
    })
}

#[async_trait]
impl OcrBackend for MistralClient {
    async fn upload(&self, content: Vec<u8>, file_name: &str) -> OcrResult<UploadedFile> {
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new().text("purpose", "ocr").part("file", part);

        let response = self
            .http
            .post(self.endpoint("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadedFile = Self::check(response).await?.json().await?;
        debug!("上传完成: {} -> {}", file_name, uploaded.id);
        Ok(uploaded)
    }

    async fn signed_url(&self, file: &UploadedFile, expiry_hours: u32) -> OcrResult<String> {
        let response = self
            .http
            .get(self.endpoint(&format!("/v1/files/{}/url", file.id)))
            .query(&[("expiry", expiry_hours)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let signed: SignedUrlResponse = Self::check(response).await?.json().await?;
        Ok(signed.url)
    }

    async fn process(&self, document_url: &str, options: &ProcessOptions) -> OcrResult<OcrResponse> {
        let response = self
            .http
            .post(self.endpoint("/v1/ocr"))
            .bearer_auth(&self.api_key)
            .json(&ocr_request_body(document_url, options))
            .send()
            .await?;

        let ocr: OcrResponse = Self::check(response).await?.json().await?;
        debug!("OCR 返回 {} 页", ocr.page_count());
        Ok(ocr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetryClass;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 启动一个只应答一次的本地 HTTP 服务
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn options() -> ProcessOptions {
        ProcessOptions {
            model: "mistral-ocr-latest".to_string(),
            include_image_base64: true,
        }
    }

    #[test]
    fn test_request_body() {
        let body = ocr_request_body("https://files.test/x", &options());
        assert_eq!(body["document"]["type"], "document_url");
        assert_eq!(body["document"]["document_url"], "https://files.test/x");
        assert_eq!(body["include_image_base64"], true);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default();
        assert!(matches!(MistralClient::new(&config), Err(OcrError::Config(_))));
    }

    #[tokio::test]
    async fn test_process_parses_pages() {
        let base = serve_once(
            "200 OK",
            r#"{"pages":[{"index":0,"markdown":"Hola"},{"index":1,"markdown":"Mundo"}],"model":"m"}"#,
        )
        .await;
        let client = MistralClient::with_client(Client::new(), &base, "key");

        let response = client.process("https://files.test/x", &options()).await.unwrap();
        assert_eq!(response.page_count(), 2);
        assert_eq!(response.pages[1].markdown, "Mundo");
    }

    #[tokio::test]
    async fn test_status_429_is_rate_limited() {
        let base = serve_once("429 Too Many Requests", r#"{"message":"slow down"}"#).await;
        let client = MistralClient::with_client(Client::new(), &base, "key");

        let err = client.process("https://files.test/x", &options()).await.unwrap_err();
        assert_eq!(err.retry_class(), RetryClass::RateLimited);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_transient() {
        let base = serve_once(
            "400 Bad Request",
            r#"{"code":"3310","message":"File could not be fetched from url"}"#,
        )
        .await;
        let client = MistralClient::with_client(Client::new(), &base, "key");

        let err = client.process("https://files.test/x", &options()).await.unwrap_err();
        assert_eq!(err.retry_class(), RetryClass::TransientFetch);
    }
}
