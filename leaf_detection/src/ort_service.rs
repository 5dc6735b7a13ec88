use crate::{
    bounding_box::{non_max_suppression, BoundingBox},
    config::{ModelConfig, Validatable},
    error::ModelError,
    model_service::{ModelService, PredictionBatch},
};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayD, ArrayViewD, Axis, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Resizes to the square model input and packs the pixels as NCHW floats in [0, 1].
pub fn transform_image(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let img = image::imageops::resize(image, input_size, input_size, FilterType::CatmullRom);

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decodes a `[1, 4 + classes, anchors]` YOLO head. Each anchor contributes its
/// best-scoring class when that score reaches `min_probability`; box centers and
/// sizes are multiplied by the scale factors to land in image pixels.
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    scale_x: f32,
    scale_y: f32,
    min_probability: f32,
) -> Result<Vec<BoundingBox>, ModelError> {
    let shape = output.shape().to_vec();
    let output = output.into_dimensionality::<Ix3>().map_err(|e| {
        ModelError::UnexpectedOutput(format!("expected rank 3, got shape {:?}: {}", shape, e))
    })?;

    let (batch, channels, _anchors) = output.dim();
    if batch != 1 || channels <= 4 {
        return Err(ModelError::UnexpectedOutput(format!(
            "expected shape [1, 4 + classes, anchors], got {:?}",
            shape
        )));
    }

    let predictions = output.index_axis(Axis(0), 0);
    let mut boxes = Vec::new();

    for anchor in predictions.axis_iter(Axis(1)) {
        let (class_id, prob) = anchor
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, row| if row.1 > best.1 { row } else { best });

        if prob < min_probability {
            continue;
        }

        let bbox = BoundingBox::from_center(
            class_id as u32,
            prob,
            anchor[0],
            anchor[1],
            anchor[2],
            anchor[3],
        );
        boxes.push(bbox.scale(scale_x, scale_y));
    }

    Ok(boxes)
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    input_size: u32,
    min_probability: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        model_config.validate().map_err(ModelError::Config)?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            max_detections: model_config.max_detections,
        })
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::UnexpectedOutput(format!("failed to extract tensor: {}", e)))?;

        ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| ModelError::UnexpectedOutput(format!("invalid tensor shape: {}", e)))
    }

    fn predict_blocking(&self, image: &RgbImage) -> Result<PredictionBatch, ModelError> {
        let (width, height) = image.dimensions();
        let input = transform_image(image, self.input_size);
        let outputs = self.run_inference(&input)?;

        let scale_x = width as f32 / self.input_size as f32;
        let scale_y = height as f32 / self.input_size as f32;
        let detections = postprocess(
            outputs.view(),
            scale_x,
            scale_y,
            self.min_probability,
            self.iou_threshold,
            self.max_detections,
        )?;

        Ok(PredictionBatch { detections })
    }
}

/// Decodes a raw output tensor, runs per-class NMS and keeps at most
/// `max_detections` boxes, highest confidence first.
pub fn postprocess(
    output: ArrayViewD<f32>,
    scale_x: f32,
    scale_y: f32,
    min_probability: f32,
    iou_threshold: f32,
    max_detections: usize,
) -> Result<Vec<BoundingBox>, ModelError> {
    let boxes = decode_predictions(output, scale_x, scale_y, min_probability)?;
    let mut detections = non_max_suppression(boxes, iou_threshold);
    detections.truncate(max_detections);
    Ok(detections)
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(&self, image: RgbImage) -> Result<PredictionBatch, ModelError> {
        let service = self.clone();
        let batch = tokio::task::spawn_blocking(move || service.predict_blocking(&image))
            .await
            .map_err(|e| ModelError::Inference(format!("inference task failed: {}", e)))??;

        for (i, detection) in batch.detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: class_id={}, confidence={:.3}, bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                i,
                detection.class_id,
                detection.confidence,
                detection.x1,
                detection.y1,
                detection.x2,
                detection.y2
            );
        }

        Ok(batch)
    }
}
