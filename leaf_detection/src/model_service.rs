use crate::{bounding_box::BoundingBox, error::ModelError};
use async_trait::async_trait;
use image::RgbImage;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionBatch {
    pub detections: Vec<BoundingBox>,
}

/// Runs a detector over one image. Box coordinates are in the pixel space of `image`.
#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn predict(&self, image: RgbImage) -> Result<PredictionBatch, ModelError>;
}
