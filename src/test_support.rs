//! 单元测试用的可编排远端

use crate::clients::OcrBackend;
use crate::error::{OcrError, OcrResult};
use crate::models::{OcrPage, OcrResponse, ProcessOptions, UploadedFile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// 按脚本返回结果的远端
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    uploads: AtomicUsize,
    signed_urls: AtomicUsize,
    processes: AtomicUsize,
    signed_url_failures: AtomicUsize,
    process_script: Mutex<VecDeque<OcrResult<OcrResponse>>>,
    process_delay: Duration,
    pages_per_response: usize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    process_starts: Mutex<Vec<Instant>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            pages_per_response: 2,
            ..Default::default()
        }
    }

    /// 前 `n` 次获取签名 URL 失败
    pub fn failing_signed_urls(self, n: usize) -> Self {
        self.signed_url_failures.store(n, Ordering::SeqCst);
        self
    }

    /// 依次返回这些识别结果，用完后返回默认结果
    pub fn with_process_results(self, results: Vec<OcrResult<OcrResponse>>) -> Self {
        if let Ok(mut script) = self.process_script.lock() {
            script.extend(results);
        }
        self
    }

    pub fn with_process_delay(mut self, delay: Duration) -> Self {
        self.process_delay = delay;
        self
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn signed_url_calls(&self) -> usize {
        self.signed_urls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.processes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 每次识别开始的时刻
    pub fn process_start_times(&self) -> Vec<Instant> {
        self.process_starts.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn response(pages: usize) -> OcrResponse {
        OcrResponse {
            pages: (0..pages)
                .map(|i| OcrPage {
                    index: i as u32,
                    markdown: format!("contenido de la página {}", i + 1),
                    ..Default::default()
                })
                .collect(),
            model: Some("scripted".to_string()),
        }
    }

    pub fn transient() -> OcrError {
        OcrError::from_remote(Some(400), "code 3310: file could not be fetched from url")
    }

    pub fn rate_limited() -> OcrError {
        OcrError::from_remote(Some(429), "Too Many Requests")
    }
}

#[async_trait]
impl OcrBackend for ScriptedBackend {
    async fn upload(&self, _content: Vec<u8>, file_name: &str) -> OcrResult<UploadedFile> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(UploadedFile {
            id: format!("file-{}", n),
            filename: Some(file_name.to_string()),
        })
    }

    async fn signed_url(&self, file: &UploadedFile, _expiry_hours: u32) -> OcrResult<String> {
        self.signed_urls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.signed_url_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.signed_url_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(OcrError::from_remote(Some(500), "signed url unavailable"));
        }
        Ok(format!("https://files.test/{}", file.id))
    }

    async fn process(&self, _document_url: &str, _options: &ProcessOptions) -> OcrResult<OcrResponse> {
        self.processes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut starts) = self.process_starts.lock() {
            starts.push(Instant::now());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.process_delay.is_zero() {
            tokio::time::sleep(self.process_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.process_script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| Ok(Self::response(self.pages_per_response)))
    }
}
