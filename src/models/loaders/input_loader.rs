use crate::models::metrics::is_supported;
use crate::planner::sort_files_intelligently;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

/// 扫描输入目录，返回所有支持的文件（按卷号 / 章节等规则排序）
pub async fn load_input_files(folder_path: &str) -> Result<Vec<PathBuf>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_supported(&path) {
            tracing::info!(
                "找到文件: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            files.push(path);
        } else {
            tracing::debug!("跳过不支持的文件: {}", path.display());
        }
    }

    Ok(sort_files_intelligently(files))
}
