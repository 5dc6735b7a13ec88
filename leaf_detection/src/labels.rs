use crate::{
    config::{LabelsConfig, Validatable},
    error::ModelError,
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Class names indexed by the model's class id.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    class_labels: Vec<ClassLabel>,
}

impl ClassLabels {
    pub fn new(class_labels: Vec<ClassLabel>) -> Self {
        Self { class_labels }
    }

    pub fn from_config(labels_cfg: &LabelsConfig) -> Result<Self, ModelError> {
        let path = labels_cfg.get_path();
        let labels = load_yolo_labels(&path)
            .map_err(|e| ModelError::Labels(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded {} class labels from {:?}", labels.len(), path);
        Ok(Self::new(labels))
    }

    pub fn resolve(&self, class_id: u32) -> Option<&ClassLabel> {
        self.class_labels.get(class_id as usize)
    }
}

pub fn load_yolo_labels(filepath: &Path) -> io::Result<Vec<ClassLabel>> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

/// Parses `label,red,green,blue` lines. Blank lines and `#` comments are skipped.
pub fn parse_labels<R: BufRead>(reader: R) -> io::Result<Vec<ClassLabel>> {
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').collect();
        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let label = parts[0].trim().to_string();
        if label.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Empty label in line: {}", line),
            ));
        }

        let red = parse_component(parts[1], "red", &line)?;
        let green = parse_component(parts[2], "green", &line)?;
        let blue = parse_component(parts[3], "blue", &line)?;

        color_labels.push(ClassLabel {
            label,
            red,
            green,
            blue,
        });
    }

    Ok(color_labels)
}

fn parse_component(value: &str, name: &str, line: &str) -> io::Result<u8> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} value in line: {}", name, line),
        )
    })
}
