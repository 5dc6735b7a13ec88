use crate::{
    annotate::{draw_markers, encode_jpeg, Marker},
    config::{ReportConfig, ScanConfig},
    report::{render_report, ReportError},
    storage::{annotated_name, BatchId, StorageError, UploadStore},
};
use bytes::Bytes;
use image::{imageops::FilterType, ImageFormat, Rgb, RgbImage};
use leaf_detection::{BoundingBox, ClassLabels, ModelError, ModelService};
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::instrument;

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No images were uploaded")]
    NoImages,
    #[error("Unsupported image {0:?}: only jpg, jpeg and png files are accepted")]
    UnsupportedImage(String),
    #[error("Failed to decode image {name:?}: {source}")]
    Decode {
        name: String,
        source: image::ImageError,
    },
    #[error("Failed to encode annotated image: {0}")]
    Encode(image::ImageError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PestDetection {
    pub pest: String,
    pub class_id: u32,
    /// Confidence in percent, rounded to two decimals.
    pub accuracy: f64,
    pub bbox: BoundingBox,
}

impl PestDetection {
    pub fn summary(&self) -> String {
        format!("Pest: {}, Accuracy: {}%", self.pest, self.accuracy)
    }
}

pub fn accuracy_percent(confidence: f32) -> f64 {
    (confidence as f64 * 100.0 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedImage {
    pub source_name: String,
    pub stored_name: String,
    pub annotated_name: String,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<PestDetection>,
    #[serde(skip)]
    pub annotated_jpeg: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub images: Vec<ScannedImage>,
    pub report_name: String,
}

impl BatchReport {
    pub fn total_detections(&self) -> usize {
        self.images.iter().map(|image| image.detections.len()).sum()
    }
}

/// Accepts jpg/jpeg/png by extension and requires the content to really be a
/// JPEG or PNG.
pub fn validate_upload(upload: &Upload) -> Result<(), ScanError> {
    let extension = Path::new(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let extension_ok = extension
        .as_deref()
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e));
    let content_ok = matches!(
        image::guess_format(&upload.data),
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Png)
    );

    if extension_ok && content_ok {
        Ok(())
    } else {
        Err(ScanError::UnsupportedImage(upload.file_name.clone()))
    }
}

/// Validates and fully decodes an upload into RGB pixels.
pub fn decode_upload(upload: &Upload) -> Result<RgbImage, ScanError> {
    validate_upload(upload)?;
    image::load_from_memory(&upload.data)
        .map(|image| image.to_rgb8())
        .map_err(|source| ScanError::Decode {
            name: upload.file_name.clone(),
            source,
        })
}

pub struct LeafScanner<M: ModelService> {
    model_service: M,
    labels: Arc<ClassLabels>,
    store: UploadStore,
    scan: ScanConfig,
    report: ReportConfig,
}

impl<M: ModelService> LeafScanner<M> {
    pub fn new(
        model_service: M,
        labels: ClassLabels,
        store: UploadStore,
        scan: ScanConfig,
        report: ReportConfig,
    ) -> Self {
        Self {
            model_service,
            labels: Arc::new(labels),
            store,
            scan,
            report,
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    pub fn report_name(&self) -> &str {
        &self.report.file_name
    }

    fn resolve(&self, class_id: u32) -> (String, Rgb<u8>) {
        let default_color = Rgb(self.scan.marker_color);
        match self.labels.resolve(class_id) {
            Some(label) => {
                let color = if self.scan.use_label_colors {
                    Rgb([label.red, label.green, label.blue])
                } else {
                    default_color
                };
                (label.label.clone(), color)
            }
            None => (format!("Unknown class {}", class_id), default_color),
        }
    }

    /// Stores the original, runs detection on the working-size image, draws the
    /// markers and stores the annotated JPEG next to the original.
    pub async fn scan_image(
        &self,
        batch: &BatchId,
        upload: &Upload,
    ) -> Result<ScannedImage, ScanError> {
        let decoded = decode_upload(upload)?;
        self.scan_decoded(batch, upload, decoded).await
    }

    #[instrument(skip(self, upload, decoded), fields(file_name = %upload.file_name))]
    async fn scan_decoded(
        &self,
        batch: &BatchId,
        upload: &Upload,
        decoded: RgbImage,
    ) -> Result<ScannedImage, ScanError> {
        let stored_name = self.store.save(batch, &upload.file_name, &upload.data).await?;

        let size = self.scan.working_size;
        let mut image = image::imageops::resize(&decoded, size, size, FilterType::Triangle);

        let start = Instant::now();
        let prediction = self.model_service.predict(image.clone()).await?;
        tracing::debug!(
            detections = prediction.detections.len(),
            inference_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Inference finished"
        );

        let mut markers = Vec::with_capacity(prediction.detections.len());
        let detections: Vec<PestDetection> = prediction
            .detections
            .iter()
            .map(|bbox| {
                let (pest, color) = self.resolve(bbox.class_id);
                markers.push(Marker::from_box(bbox, color));
                PestDetection {
                    pest,
                    class_id: bbox.class_id,
                    accuracy: accuracy_percent(bbox.confidence),
                    bbox: *bbox,
                }
            })
            .collect();

        draw_markers(&mut image, &markers, self.scan.marker_thickness);
        let annotated_jpeg = encode_jpeg(&image, self.scan.jpeg_quality).map_err(ScanError::Encode)?;
        let annotated_name = self
            .store
            .save(batch, &annotated_name(&stored_name), &annotated_jpeg)
            .await?;

        Ok(ScannedImage {
            source_name: upload.file_name.clone(),
            stored_name,
            annotated_name,
            width: image.width(),
            height: image.height(),
            detections,
            annotated_jpeg,
        })
    }

    async fn scan_into(
        &self,
        batch_id: &BatchId,
        decoded: Vec<(&Upload, RgbImage)>,
    ) -> Result<Vec<ScannedImage>, ScanError> {
        let mut images = Vec::with_capacity(decoded.len());
        for (upload, image) in decoded {
            images.push(self.scan_decoded(batch_id, upload, image).await?);
        }

        let pdf = render_report(&self.report.title, &images)?;
        let report_path = self
            .store
            .write(batch_id, &self.report.file_name, &pdf)
            .await?;
        tracing::debug!("Report written to {}", report_path.display());

        Ok(images)
    }

    /// Scans every upload in order into a new batch and stores the PDF report.
    /// Every upload is decoded before anything is written, and a batch that
    /// fails part way is removed.
    #[instrument(skip(self, uploads), fields(images = uploads.len()))]
    pub async fn scan_batch(&self, uploads: &[Upload]) -> Result<BatchReport, ScanError> {
        if uploads.is_empty() {
            return Err(ScanError::NoImages);
        }
        let decoded = uploads
            .iter()
            .map(|upload| decode_upload(upload).map(|image| (upload, image)))
            .collect::<Result<Vec<_>, _>>()?;

        let batch_id = self.store.create_batch().await?;
        let images = match self.scan_into(&batch_id, decoded).await {
            Ok(images) => images,
            Err(e) => {
                if let Err(cleanup) = self.store.remove_batch(&batch_id).await {
                    tracing::warn!("Failed to remove batch {}: {}", batch_id, cleanup);
                }
                return Err(e);
            }
        };

        let report = BatchReport {
            batch_id,
            images,
            report_name: self.report.file_name.clone(),
        };
        tracing::info!(
            batch_id = %report.batch_id,
            images = report.images.len(),
            detections = report.total_detections(),
            "Batch scanned"
        );

        Ok(report)
    }
}
