//! 上传缓存
//!
//! ## 职责
//!
//! 以文件内容的 SHA-256 为键，缓存已上传文件的签名 URL，
//! 避免同一内容在有效期内重复上传。
//!
//! ## 核心功能
//!
//! 1. **惰性清理**：每次查询前移除超过有效期的条目
//! 2. **命中直返**：未过期且未强制刷新时直接返回 URL，不访问网络
//! 3. **上传 + 签名**：未命中时上传，再获取签名 URL（最多 3 次，指数退避）
//! 4. **后台清理**：可选，由调用方显式启动
//!
//! 相同内容的并发上传不做合并，两次上传都会成功，后写入的条目覆盖先写入的。

use crate::clients::OcrBackend;
use crate::error::{OcrError, OcrResult};
use crate::utils::cancel::{run_or_cancel, sleep_or_cancel};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认有效期：12 小时
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// 获取签名 URL 的最大尝试次数
const SIGNED_URL_ATTEMPTS: u32 = 3;

/// 缓存条目
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCacheEntry {
    pub content_hash: String,
    pub url: String,
    pub created_at: Instant,
    pub size_mb: f64,
    pub file_name: String,
}

impl UploadCacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// 上传缓存
#[derive(Debug)]
pub struct UploadCache {
    entries: Mutex<HashMap<String, UploadCacheEntry>>,
    ttl: Duration,
    signed_url_expiry_hours: u32,
}

impl Default for UploadCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, 24)
    }
}

/// 文件内容的 SHA-256（十六进制）
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

impl UploadCache {
    pub fn new(ttl: Duration, signed_url_expiry_hours: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            signed_url_expiry_hours,
        }
    }

    /// 获取文件的签名 URL，必要时上传
    ///
    /// # 参数
    /// - `backend`: 远端服务
    /// - `path`: 待上传文件
    /// - `force_fresh`: 忽略缓存，强制重新上传
    /// - `cancel`: 取消令牌
    ///
    /// # 返回
    /// 签名 URL；获取签名 URL 3 次均失败时返回 `Upload` 错误
    pub async fn get_or_upload(
        &self,
        backend: &dyn OcrBackend,
        path: &Path,
        force_fresh: bool,
        cancel: &CancellationToken,
    ) -> OcrResult<String> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| OcrError::io(path, e))?;
        let hash = content_hash(&content);
        let size_mb = content.len() as f64 / (1024.0 * 1024.0);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        {
            let mut entries = self.entries.lock().await;
            self.purge_locked(&mut entries);
            if !force_fresh {
                if let Some(entry) = entries.get(&hash) {
                    debug!("♻️ 复用已上传文件: {}", file_name);
                    return Ok(entry.url.clone());
                }
            }
        }

        info!("⬆️ 上传文件: {} ({:.1} MB)", file_name, size_mb);
        let uploaded = run_or_cancel(cancel, backend.upload(content, &file_name)).await?;
        let url = self
            .signed_url_with_retry(backend, &uploaded, &file_name, cancel)
            .await?;

        self.entries.lock().await.insert(
            hash.clone(),
            UploadCacheEntry {
                content_hash: hash,
                url: url.clone(),
                created_at: Instant::now(),
                size_mb,
                file_name,
            },
        );
        Ok(url)
    }

    async fn signed_url_with_retry(
        &self,
        backend: &dyn OcrBackend,
        uploaded: &crate::models::UploadedFile,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> OcrResult<String> {
        let mut last_error = String::new();
        for attempt in 0..SIGNED_URL_ATTEMPTS {
            match run_or_cancel(cancel, backend.signed_url(uploaded, self.signed_url_expiry_hours)).await {
                Ok(url) => return Ok(url),
                Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
                Err(e) => {
                    warn!(
                        "⚠️ 获取签名 URL 失败 (尝试 {}/{}): {}",
                        attempt + 1,
                        SIGNED_URL_ATTEMPTS,
                        e
                    );
                    last_error = e.to_string();
                    if attempt + 1 < SIGNED_URL_ATTEMPTS {
                        sleep_or_cancel(Duration::from_secs(1 << attempt), cancel).await?;
                    }
                }
            }
        }
        Err(OcrError::upload(file_name, last_error))
    }

    /// 移除某个文件当前内容对应的条目
    pub async fn invalidate(&self, path: &Path) -> OcrResult<bool> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| OcrError::io(path, e))?;
        let hash = content_hash(&content);
        Ok(self.entries.lock().await.remove(&hash).is_some())
    }

    /// 清理过期条目，返回清理数量
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.purge_locked(&mut entries)
    }

    fn purge_locked(&self, entries: &mut HashMap<String, UploadCacheEntry>) -> usize {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now, self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("🧹 清理 {} 个过期上传缓存", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 启动后台清理任务，取消令牌触发后退出
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.purge_expired().await;
                    }
                }
            }
        })
    }
}
