mod bounding_box;
mod error;
mod labels;
mod model_service;
mod ort_service;

pub mod config;

pub use bounding_box::{intersection, non_max_suppression, union, BoundingBox};
pub use error::ModelError;
pub use labels::{load_yolo_labels, parse_labels, ClassLabel, ClassLabels};
pub use model_service::{ModelService, PredictionBatch};
pub use ort_service::{decode_predictions, postprocess, transform_image, OrtModelService};

pub use async_trait::async_trait;
