use crate::error::{OcrError, OcrResult};
use crate::planner::SplitLimits;
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OCR 服务配置 ---
    pub api_key: String,
    pub api_base_url: String,
    /// 远端模型标识
    pub model: String,
    /// 是否请求页面图片（base64）
    pub include_images: bool,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,

    // --- 输出格式开关 ---
    pub save_markdown: bool,
    pub save_text: bool,
    pub save_html: bool,
    pub save_images: bool,
    pub save_json: bool,
    /// 优化领域标签（原样传给输出器）
    pub optimization_domain: String,

    // --- 拆分限制 ---
    pub max_size_mb: f64,
    pub max_pages: u32,
    pub safety_factor_size: f64,
    pub safety_factor_pages: f64,
    pub overhead_mb: f64,
    /// 文件超限时是否允许拆分
    pub allow_split: bool,

    // --- 执行 ---
    /// 覆盖每个大小分组的工作线程上限
    pub max_workers: Option<usize>,
    /// 上传缓存有效期（秒）
    pub upload_cache_ttl_secs: u64,
    /// 签名 URL 有效期（小时）
    pub signed_url_expiry_hours: u32,

    // --- 文件与目录 ---
    /// 待处理文件所在目录
    pub input_folder: String,
    /// 输出目录
    pub output_dir: String,
    /// 拆分后的分片目录（默认在输出目录下）
    pub split_dir: Option<String>,
    /// 多个文件之间页码是否连续
    pub continuous_numbering: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        let limits = SplitLimits::default();
        Self {
            api_key: String::new(),
            api_base_url: "https://api.mistral.ai".to_string(),
            model: "mistral-ocr-latest".to_string(),
            include_images: true,
            request_timeout_secs: 300,
            save_markdown: true,
            save_text: false,
            save_html: false,
            save_images: false,
            save_json: false,
            optimization_domain: "general".to_string(),
            max_size_mb: limits.max_size_mb,
            max_pages: limits.max_pages,
            safety_factor_size: limits.safety_factor_size,
            safety_factor_pages: limits.safety_factor_pages,
            overhead_mb: limits.overhead_mb,
            allow_split: true,
            max_workers: None,
            upload_cache_ttl_secs: 12 * 60 * 60,
            signed_url_expiry_hours: 24,
            input_folder: "input".to_string(),
            output_dir: "ocr_output".to_string(),
            split_dir: None,
            continuous_numbering: false,
            output_log_file: "ocr_run.log".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_key: std::env::var("MISTRAL_API_KEY").unwrap_or(default.api_key),
            api_base_url: std::env::var("OCR_API_BASE_URL").unwrap_or(default.api_base_url),
            model: std::env::var("OCR_MODEL").unwrap_or(default.model),
            include_images: env_parse("OCR_INCLUDE_IMAGES").unwrap_or(default.include_images),
            request_timeout_secs: env_parse("OCR_REQUEST_TIMEOUT_SECS").unwrap_or(default.request_timeout_secs),
            save_markdown: env_parse("SAVE_MARKDOWN").unwrap_or(default.save_markdown),
            save_text: env_parse("SAVE_TEXT").unwrap_or(default.save_text),
            save_html: env_parse("SAVE_HTML").unwrap_or(default.save_html),
            save_images: env_parse("SAVE_IMAGES").unwrap_or(default.save_images),
            save_json: env_parse("SAVE_JSON").unwrap_or(default.save_json),
            optimization_domain: std::env::var("OPTIMIZATION_DOMAIN").unwrap_or(default.optimization_domain),
            max_size_mb: env_parse("MAX_SIZE_MB").unwrap_or(default.max_size_mb),
            max_pages: env_parse("MAX_PAGES").unwrap_or(default.max_pages),
            safety_factor_size: env_parse("SAFETY_FACTOR_SIZE").unwrap_or(default.safety_factor_size),
            safety_factor_pages: env_parse("SAFETY_FACTOR_PAGES").unwrap_or(default.safety_factor_pages),
            overhead_mb: env_parse("PDF_OVERHEAD_MB").unwrap_or(default.overhead_mb),
            allow_split: env_parse("ALLOW_SPLIT").unwrap_or(default.allow_split),
            max_workers: env_parse("MAX_WORKERS").or(default.max_workers),
            upload_cache_ttl_secs: env_parse("UPLOAD_CACHE_TTL_SECS").unwrap_or(default.upload_cache_ttl_secs),
            signed_url_expiry_hours: env_parse("SIGNED_URL_EXPIRY_HOURS").unwrap_or(default.signed_url_expiry_hours),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            split_dir: std::env::var("SPLIT_DIR").ok().or(default.split_dir),
            continuous_numbering: env_parse("CONTINUOUS_NUMBERING").unwrap_or(default.continuous_numbering),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OcrError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| OcrError::config(format!("无法解析配置文件 {}: {}", path.display(), e)))
    }

    /// 加载配置：设置了 `OCR_CONFIG_FILE` 时读取该文件，否则读取环境变量
    pub fn load() -> OcrResult<Self> {
        match std::env::var("OCR_CONFIG_FILE") {
            Ok(path) => Self::from_toml_file(Path::new(&path)),
            Err(_) => Ok(Self::from_env()),
        }
    }

    /// 校验并生成拆分限制
    pub fn split_limits(&self) -> OcrResult<SplitLimits> {
        let limits = SplitLimits {
            max_size_mb: self.max_size_mb,
            max_pages: self.max_pages,
            safety_factor_size: self.safety_factor_size,
            safety_factor_pages: self.safety_factor_pages,
            overhead_mb: self.overhead_mb,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// 是否至少开启了一种输出格式
    pub fn any_output_enabled(&self) -> bool {
        self.save_markdown || self.save_text || self.save_html || self.save_images || self.save_json
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
