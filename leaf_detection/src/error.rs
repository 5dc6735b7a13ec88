use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model configuration: {0}")]
    Config(String),
    #[error("ONNX Runtime error: {0}")]
    Session(#[from] ort::Error),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("Failed to load labels: {0}")]
    Labels(String),
}
