use leaf_detection::config::{LabelsConfig, ModelConfig, Validatable};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
    pub scan: ScanConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_max_upload_mb() -> usize {
    20
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    pub upload_dir: PathBuf,
    #[serde(default = "default_working_size")]
    pub working_size: u32,
    #[serde(default = "default_marker_thickness")]
    pub marker_thickness: u32,
    #[serde(default = "default_marker_color")]
    pub marker_color: [u8; 3],
    #[serde(default)]
    pub use_label_colors: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_working_size() -> u32 {
    340
}

fn default_marker_thickness() -> u32 {
    2
}

fn default_marker_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_jpeg_quality() -> u8 {
    90
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.working_size == 0 {
            return Err("scan.working_size must be positive".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "scan.jpeg_quality must be within [1, 100], got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_title")]
    pub title: String,
    #[serde(default = "default_report_file_name")]
    pub file_name: String,
}

fn default_report_title() -> String {
    "Tomato Pest Detection Results".to_string()
}

fn default_report_file_name() -> String {
    "pest_report.pdf".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_report_title(),
            file_name: default_report_file_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("Failed to determine the current directory: {}", e)))?;
    get_configuration_from(&base_path.join("configuration"))
}

pub fn get_configuration_from(
    configuration_directory: &std::path::Path,
) -> Result<Config, config::ConfigError> {
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("PLAGA")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config = settings.try_deserialize::<Config>()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    Ok(config)
}

impl Config {
    /// Checks that the model and labels files exist and that scan settings are usable.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let checks = [
            self.model.validate(),
            self.labels.validate(),
            self.scan.validate(),
        ];
        for check in checks {
            if let Err(e) = check {
                tracing::error!("Configuration validation failed: {}", e);
                return Err(config::ConfigError::Message(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        let env: Environment = "Production".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert_eq!(LogLevel::try_from("info".to_string()), Ok(LogLevel::Info));
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }

    #[test]
    fn test_server_address() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_mb: 2,
        };
        assert_eq!(server.get_address(), "127.0.0.1:8501");
        assert_eq!(server.max_upload_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_load_configuration_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            r#"
server:
  host: 127.0.0.1
  port: 9000
log_level: debug
model:
  model_dir: models
  onnx_file: tomato.onnx
  num_instances: 2
labels:
  labels_dir: models
  labels_file: labels.txt
scan:
  upload_dir: uploads
"#,
        )
        .unwrap();

        let config = get_configuration_from(dir.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_upload_mb, 20);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.model.num_instances, 2);
        assert_eq!(config.model.min_probability, 0.2);
        assert_eq!(config.scan.working_size, 340);
        assert_eq!(config.scan.marker_color, [255, 0, 0]);
        assert_eq!(config.report.file_name, "pest_report.pdf");

        // model and labels files are not present in the temp dir
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_model_variable_leaves_model_section_intact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            r#"
server:
  host: 127.0.0.1
  port: 9000
log_level: info
model:
  model_dir: models
  onnx_file: tomato.onnx
labels:
  labels_dir: models
  labels_file: labels.txt
scan:
  upload_dir: uploads
"#,
        )
        .unwrap();

        std::env::set_var("PLAGA_BATCH_MODEL", "/opt/models/other.onnx");
        let config = get_configuration_from(dir.path());
        std::env::remove_var("PLAGA_BATCH_MODEL");

        let config = config.unwrap();
        assert_eq!(config.model.onnx_file, "tomato.onnx");
        assert_eq!(config.model.model_dir, PathBuf::from("models"));
    }

    #[test]
    fn test_scan_config_validation() {
        let mut scan = ScanConfig {
            upload_dir: "uploads".into(),
            working_size: 340,
            marker_thickness: 2,
            marker_color: [255, 0, 0],
            use_label_colors: false,
            jpeg_quality: 90,
        };
        assert!(scan.validate().is_ok());

        scan.jpeg_quality = 0;
        assert!(scan.validate().is_err());
    }
}
