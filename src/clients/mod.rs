pub mod mistral_client;
pub mod ocr_backend;

pub use mistral_client::MistralClient;
pub use ocr_backend::OcrBackend;
