//! Configuration file handling.
//!
//! Settings come from an optional `score_trends.toml`. Every field has a
//! default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "score_trends.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Column naming and component subjects.
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Report output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Maps logical columns to the header names that may carry them.
///
/// The first alias is not special; any alias present in the header selects
/// the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_student_id")]
    pub student_id: Vec<String>,

    #[serde(default = "default_total_score")]
    pub total_score: Vec<String>,

    #[serde(default = "default_exam_date")]
    pub exam_date: Vec<String>,

    /// Optional component subjects. Those present in the header become part
    /// of the dataset schema; absent ones are ignored.
    #[serde(default = "default_components")]
    pub components: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            student_id: default_student_id(),
            total_score: default_total_score(),
            exam_date: default_exam_date(),
            components: default_components(),
        }
    }
}

fn default_student_id() -> Vec<String> {
    vec!["姓名".to_string(), "student_id".to_string()]
}

fn default_total_score() -> Vec<String> {
    vec!["总分".to_string(), "total_score".to_string()]
}

fn default_exam_date() -> Vec<String> {
    vec!["日期".to_string(), "exam_date".to_string()]
}

fn default_components() -> Vec<String> {
    vec!["选择".to_string(), "材料".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory student reports are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "reports".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads `path` when given, otherwise the default file if it exists,
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    debug!(path = DEFAULT_CONFIG_FILE, "Loading default config file");
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
