use serde::{Deserialize, Serialize};

/// 远端返回的已上传文件句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// 远端识别选项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOptions {
    pub model: String,
    pub include_image_base64: bool,
}

/// 页面中的一张图片
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrImage {
    #[serde(default)]
    pub id: String,
    /// `data:image/...;base64,` 形式或裸 base64
    #[serde(default)]
    pub image_base64: Option<String>,
}

/// 识别结果中的一页
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<OcrImage>,
    #[serde(default)]
    pub tables: Vec<serde_json::Value>,
}

/// 远端识别结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub model: Option<String>,
}

impl OcrResponse {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }
}
