use crate::config::Config;
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OutputFormat {
    Markdown,
    Text,
    Html,
    Images,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Markdown,
        OutputFormat::Text,
        OutputFormat::Html,
        OutputFormat::Images,
        OutputFormat::Json,
    ];

    /// 配置中开启的格式，按固定顺序
    pub fn enabled(config: &Config) -> Vec<OutputFormat> {
        Self::ALL
            .into_iter()
            .filter(|f| match f {
                OutputFormat::Markdown => config.save_markdown,
                OutputFormat::Text => config.save_text,
                OutputFormat::Html => config.save_html,
                OutputFormat::Images => config.save_images,
                OutputFormat::Json => config.save_json,
            })
            .collect()
    }

    /// 输出路径：图片为目录，其余为单个文件
    pub fn output_path(&self, dir: &Path, base_name: &str) -> PathBuf {
        match self {
            OutputFormat::Markdown => dir.join(format!("{}.md", base_name)),
            OutputFormat::Text => dir.join(format!("{}.txt", base_name)),
            OutputFormat::Html => dir.join(format!("{}.html", base_name)),
            OutputFormat::Images => dir.join(format!("{}_images", base_name)),
            OutputFormat::Json => dir.join(format!("{}.json", base_name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Text => "txt",
            OutputFormat::Html => "html",
            OutputFormat::Images => "images",
            OutputFormat::Json => "json",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
