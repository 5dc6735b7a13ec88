use serde::Deserialize;
use std::path::PathBuf;

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(5)
}

fn default_input_size() -> u32 {
    640
}

fn default_min_probability() -> f32 {
    0.2
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_max_detections() -> usize {
    300
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        if self.num_instances == 0 {
            return Err("num_instances must be at least 1".to_string());
        }
        if self.input_size == 0 {
            return Err("input_size must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_probability) {
            return Err(format!(
                "min_probability must be within [0, 1], got {}",
                self.min_probability
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_dir: PathBuf,
    pub labels_file: String,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Labels file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(dir: PathBuf) -> ModelConfig {
        ModelConfig {
            model_dir: dir,
            onnx_file: "model.onnx".to_string(),
            num_instances: 1,
            input_size: 640,
            min_probability: 0.2,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }

    #[test]
    fn test_model_path_joins_dir_and_file() {
        let config = model_config(PathBuf::from("models"));
        assert_eq!(config.get_path(), PathBuf::from("models/model.onnx"));
    }

    #[test]
    fn test_validate_missing_model() {
        let config = model_config(PathBuf::from("./does_not_exist"));
        let err = config.validate().unwrap_err();
        assert!(err.contains("Model file not found"));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();

        let mut config = model_config(dir.path().to_path_buf());
        assert!(config.validate().is_ok());

        config.min_probability = 1.5;
        assert!(config.validate().is_err());

        config.min_probability = 0.2;
        config.num_instances = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_labels_validate() {
        let dir = tempfile::tempdir().unwrap();
        let config = LabelsConfig {
            labels_dir: dir.path().to_path_buf(),
            labels_file: "labels.txt".to_string(),
        };
        assert!(config.validate().is_err());

        std::fs::write(config.get_path(), "tuta_absoluta,255,0,0\n").unwrap();
        assert!(config.validate().is_ok());
    }
}
