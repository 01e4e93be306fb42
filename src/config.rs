//! Funnel configuration and its file loading.
//!
//! Configuration can be written as TOML or JSON; the format is picked from
//! the file extension. Every field has a default, so an empty file is a valid
//! configuration.

use crate::audit::AuditConfig;
use crate::error::{AuditError, Result};
use crate::ground_truth::{ClassNames, LabelDirectory};
use crate::matching::DEFAULT_IOU_THRESHOLD;
use crate::threshold::{validate_threshold, DEFAULT_CONFIDENCE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the funnel writes its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub audit_required: PathBuf,
    pub final_report: PathBuf,
    pub human_intervention: PathBuf,
    pub aggregated: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            audit_required: PathBuf::from("to_audit.json"),
            final_report: PathBuf::from("final_report.json"),
            human_intervention: PathBuf::from("human_intervention_required.json"),
            aggregated: PathBuf::from("aggregated_data.json"),
        }
    }
}

impl OutputPaths {
    /// The default file names, placed under `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let defaults = Self::default();
        Self {
            audit_required: dir.join(defaults.audit_required),
            final_report: dir.join(defaults.final_report),
            human_intervention: dir.join(defaults.human_intervention),
            aggregated: dir.join(defaults.aggregated),
        }
    }
}

/// Settings for one funnel run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
    pub labels_dir: PathBuf,
    pub class_names_path: PathBuf,
    /// Minimum spacing between verifier calls; 0 disables rate limiting.
    pub rate_limit_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_errors: Option<usize>,
    /// Rewrite the final report after every audited item.
    pub checkpoint_final_report: bool,
    pub outputs: OutputPaths,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            labels_dir: PathBuf::from("data/train/labels"),
            class_names_path: PathBuf::from("data/data.yaml"),
            rate_limit_ms: 1000,
            verifier_timeout_secs: Some(30),
            max_consecutive_errors: None,
            checkpoint_final_report: false,
            outputs: OutputPaths::default(),
        }
    }
}

impl FunnelConfig {
    /// Check ranges before any work starts.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.confidence_threshold)?;
        validate_threshold(self.iou_threshold)?;
        if self.max_consecutive_errors == Some(0) {
            return Err(AuditError::ConfigError(
                "max_consecutive_errors must be at least 1".to_string(),
            ));
        }
        if self.verifier_timeout_secs == Some(0) {
            return Err(AuditError::ConfigError(
                "verifier_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn verifier_timeout(&self) -> Option<Duration> {
        self.verifier_timeout_secs.map(Duration::from_secs)
    }

    /// Audit settings derived from this configuration.
    pub fn audit_config(&self) -> AuditConfig {
        AuditConfig {
            verifier_timeout: self.verifier_timeout(),
            max_consecutive_errors: self.max_consecutive_errors,
            checkpoint_path: self
                .checkpoint_final_report
                .then(|| self.outputs.final_report.clone()),
        }
    }

    pub fn load_class_names(&self) -> Result<ClassNames> {
        ClassNames::from_yaml_file(&self.class_names_path)
    }

    pub fn open_labels(&self) -> Result<LabelDirectory> {
        LabelDirectory::open(&self.labels_dir)
    }
}

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Loads and saves [`FunnelConfig`] files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration, auto-detecting the format from the extension
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use detection_audit::config::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("funnel.toml"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> Result<FunnelConfig> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            AuditError::ConfigError(format!(
                "Unsupported config file extension: {:?}",
                path.extension()
            ))
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            AuditError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::load_from_string(&content, format)
    }

    /// Load and validate configuration from a string with specified format
    pub fn load_from_string(content: &str, format: ConfigFormat) -> Result<FunnelConfig> {
        let config: FunnelConfig = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                AuditError::ConfigError(format!("Failed to parse TOML config: {e}"))
            })?,
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                AuditError::ConfigError(format!("Failed to parse JSON config: {e}"))
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration in the given format
    pub fn save_to_string(config: &FunnelConfig, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
                AuditError::ConfigError(format!("Failed to serialize config to TOML: {e}"))
            }),
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                AuditError::ConfigError(format!("Failed to serialize config to JSON: {e}"))
            }),
        }
    }
}

/// Read a verifier credential from the environment.
///
/// Called once at batch start so a missing key fails the run instead of
/// turning every audit item into an `ERROR`.
pub fn require_env_credential(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuditError::MissingCredential(format!(
            "environment variable {var} is not set"
        ))),
    }
}
