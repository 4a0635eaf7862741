//! 输出格式写入 - 业务能力层
//!
//! 每种格式一个写入器，只负责把一次识别结果写到指定路径，
//! 页码统一为 `序号 + 1 + page_offset`，保证拆分后的分片页码与原文件一致。

use crate::error::{OcrError, OcrResult};
use crate::models::{OcrImage, OcrResponse, OutputFormat};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// 写入时附带的信息
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// 文档标题（原文件名）
    pub title: String,
    /// 优化领域标签
    pub domain: String,
}

/// 输出写入器
pub trait OutputWriter: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// # 返回
    /// 实际写入的文件（或目录）路径
    fn write(
        &self,
        response: &OcrResponse,
        output_path: &Path,
        page_offset: u32,
        options: &WriteOptions,
    ) -> OcrResult<PathBuf>;
}

/// 按格式创建写入器
pub fn writers_for(formats: &[OutputFormat]) -> Vec<Arc<dyn OutputWriter>> {
    formats
        .iter()
        .map(|f| -> Arc<dyn OutputWriter> {
            match f {
                OutputFormat::Markdown => Arc::new(MarkdownWriter),
                OutputFormat::Text => Arc::new(TextWriter),
                OutputFormat::Html => Arc::new(HtmlWriter),
                OutputFormat::Images => Arc::new(ImagesWriter),
                OutputFormat::Json => Arc::new(JsonWriter),
            }
        })
        .collect()
}

fn page_number(index: usize, page_offset: u32) -> u64 {
    index as u64 + 1 + page_offset as u64
}

fn write_file(format: OutputFormat, path: &Path, content: &[u8]) -> OcrResult<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| OcrError::save(format.name(), e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| OcrError::save(format.name(), e.to_string()))?;
    info!("💾 {} 已保存: {}", format, path.display());
    Ok(path.to_path_buf())
}

// ========== Markdown ==========

pub struct MarkdownWriter;

impl OutputWriter for MarkdownWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }

    fn write(&self, response: &OcrResponse, output_path: &Path, page_offset: u32, _options: &WriteOptions) -> OcrResult<PathBuf> {
        let content: String = response
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| format!("# Page {}\n\n{}\n\n", page_number(i, page_offset), page.markdown))
            .collect();
        write_file(self.format(), output_path, content.as_bytes())
    }
}

// ========== 纯文本 ==========

pub struct TextWriter;

struct PlainTextPatterns {
    heading: Regex,
    bold: Regex,
    italic: Regex,
    link: Regex,
}

fn plain_text_patterns() -> Option<&'static PlainTextPatterns> {
    static PATTERNS: OnceLock<Option<PlainTextPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(PlainTextPatterns {
                heading: Regex::new(r"^#+\s*").ok()?,
                bold: Regex::new(r"\*\*([^*]+)\*\*").ok()?,
                italic: Regex::new(r"\*([^*]+)\*").ok()?,
                link: Regex::new(r"\[([^\]]+)\]\([^)]+\)").ok()?,
            })
        })
        .as_ref()
}

/// 去掉 Markdown 标记，只保留文本行
pub fn extract_plain_text(markdown: &str) -> String {
    let Some(p) = plain_text_patterns() else {
        return markdown.to_string();
    };

    markdown
        .lines()
        .filter(|line| !line.trim_start().starts_with("!["))
        .map(|line| {
            let line = p.heading.replace(line, "");
            let line = p.bold.replace_all(&line, "$1");
            let line = p.italic.replace_all(&line, "$1");
            p.link.replace_all(&line, "$1").into_owned()
        })
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl OutputWriter for TextWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn write(&self, response: &OcrResponse, output_path: &Path, page_offset: u32, _options: &WriteOptions) -> OcrResult<PathBuf> {
        let content: String = response
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                format!(
                    "=== PAGE {} ===\n\n{}\n\n",
                    page_number(i, page_offset),
                    extract_plain_text(&page.markdown)
                )
            })
            .collect();
        write_file(self.format(), output_path, content.as_bytes())
    }
}

// ========== HTML ==========

pub struct HtmlWriter;

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl OutputWriter for HtmlWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn write(&self, response: &OcrResponse, output_path: &Path, page_offset: u32, options: &WriteOptions) -> OcrResult<PathBuf> {
        let mut html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"domain\" content=\"{}\">\n<title>{}</title>\n</head>\n<body>\n",
            escape_html(&options.domain),
            escape_html(&options.title)
        );
        for (i, page) in response.pages.iter().enumerate() {
            let n = page_number(i, page_offset);
            html.push_str(&format!(
                "<section class=\"page\" id=\"page-{n}\">\n<h2>Page {n}</h2>\n<pre>{}</pre>\n</section>\n",
                escape_html(&page.markdown)
            ));
        }
        html.push_str("</body>\n</html>\n");
        write_file(self.format(), output_path, html.as_bytes())
    }
}

// ========== 图片 ==========

pub struct ImagesWriter;

fn detect_extension(data: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\xff\xd8", "jpg"),
        (b"\x89PNG", "png"),
        (b"GIF87a", "gif"),
        (b"GIF89a", "gif"),
        (b"BM", "bmp"),
        (b"RIFF", "webp"),
    ];
    SIGNATURES
        .iter()
        .find(|(sig, _)| data.starts_with(sig))
        .map(|(_, ext)| *ext)
        .unwrap_or("bin")
}

/// 解析图片数据，返回 (字节, 扩展名)
pub fn decode_image(image: &OcrImage) -> Option<(Vec<u8>, String)> {
    let raw = image.image_base64.as_deref()?;

    if let Some(rest) = raw.strip_prefix("data:") {
        let (mime, payload) = rest.split_once(";base64,")?;
        let data = STANDARD.decode(payload.trim()).ok()?;
        let ext = match mime.rsplit('/').next().unwrap_or("bin") {
            "jpeg" => "jpg".to_string(),
            other => other.to_string(),
        };
        return Some((data, ext));
    }

    let data = STANDARD.decode(raw.trim()).ok()?;
    let ext = detect_extension(&data).to_string();
    Some((data, ext))
}

impl OutputWriter for ImagesWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Images
    }

    fn write(&self, response: &OcrResponse, output_path: &Path, page_offset: u32, _options: &WriteOptions) -> OcrResult<PathBuf> {
        std::fs::create_dir_all(output_path).map_err(|e| OcrError::save("images", e.to_string()))?;

        let mut saved = 0;
        for (page_idx, page) in response.pages.iter().enumerate() {
            let n = page_number(page_idx, page_offset);
            for (img_idx, image) in page.images.iter().enumerate() {
                let Some((data, ext)) = decode_image(image) else {
                    warn!("⚠️ 第 {} 页图片 {} 无法解码，已跳过", n, image.id);
                    continue;
                };
                let path = output_path.join(format!("page{}_img{}.{}", n, img_idx + 1, ext));
                std::fs::write(&path, data).map_err(|e| OcrError::save("images", e.to_string()))?;
                saved += 1;
            }
        }

        info!("💾 图片已保存: {} 张 -> {}", saved, output_path.display());
        Ok(output_path.to_path_buf())
    }
}

// ========== JSON ==========

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn write(&self, response: &OcrResponse, output_path: &Path, page_offset: u32, options: &WriteOptions) -> OcrResult<PathBuf> {
        let doc = serde_json::json!({
            "title": options.title,
            "domain": options.domain,
            "page_offset": page_offset,
            "model": response.model,
            "pages": response.pages,
        });
        let content = serde_json::to_vec_pretty(&doc).map_err(|e| OcrError::save("json", e.to_string()))?;
        write_file(self.format(), output_path, &content)
    }
}
