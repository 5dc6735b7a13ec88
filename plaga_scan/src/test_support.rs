use crate::{
    config::{ReportConfig, ScanConfig},
    scanner::LeafScanner,
    storage::UploadStore,
};
use image::{Rgb, RgbImage};
use leaf_detection::{
    async_trait, BoundingBox, ClassLabel, ClassLabels, ModelError, ModelService, PredictionBatch,
};
use std::path::Path;

#[derive(Clone, Default)]
pub enum MockModelService {
    /// Two detections: a known pest and an id missing from the labels.
    #[default]
    TwoDetections,
    Empty,
    Failing,
}

impl MockModelService {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn failing() -> Self {
        Self::Failing
    }
}

#[async_trait]
impl ModelService for MockModelService {
    async fn predict(&self, _image: RgbImage) -> Result<PredictionBatch, ModelError> {
        match self {
            Self::TwoDetections => Ok(PredictionBatch {
                detections: vec![
                    BoundingBox {
                        class_id: 0,
                        confidence: 0.875,
                        x1: 100.0,
                        y1: 100.0,
                        x2: 180.0,
                        y2: 140.0,
                    },
                    BoundingBox {
                        class_id: 3,
                        confidence: 0.5,
                        x1: 10.0,
                        y1: 20.0,
                        x2: 50.0,
                        y2: 60.0,
                    },
                ],
            }),
            Self::Empty => Ok(PredictionBatch::default()),
            Self::Failing => Err(ModelError::Inference("mock failure".to_string())),
        }
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 160, 40]));
    let mut cursor = std::io::Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}

pub fn scan_config(upload_dir: &Path) -> ScanConfig {
    ScanConfig {
        upload_dir: upload_dir.to_path_buf(),
        working_size: 340,
        marker_thickness: 2,
        marker_color: [255, 0, 0],
        use_label_colors: false,
        jpeg_quality: 90,
    }
}

pub fn test_scanner(upload_dir: &Path, model: MockModelService) -> LeafScanner<MockModelService> {
    let labels = ClassLabels::new(vec![ClassLabel {
        label: "tuta_absoluta".to_string(),
        red: 255,
        green: 0,
        blue: 0,
    }]);
    LeafScanner::new(
        model,
        labels,
        UploadStore::new(upload_dir),
        scan_config(upload_dir),
        ReportConfig::default(),
    )
}
