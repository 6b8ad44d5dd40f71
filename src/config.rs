use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::preprocess::ThresholdPolicy;
use crate::error::{EtlError, Result};

const TEMPERATURE_URL: &str =
    "https://opendata.arcgis.com/datasets/4063314923d74187be9596f10d034914_0.csv";
const FORESTS_URL: &str =
    "https://opendata.arcgis.com/datasets/66dad9817da847b385d3b2323ce1be57_0.csv";

/// Metadata columns both IMF climate datasets carry.
const METADATA_COLUMNS: &[&str] = &[
    "ObjectId",
    "ISO2",
    "ISO3",
    "Unit",
    "Source",
    "CTS_Code",
    "CTS_Name",
    "CTS_Full_Descriptor",
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where a dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{url}"),
            Source::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    /// Name of the SQLite table the cleaned dataset is stored under.
    pub table: String,
    pub source: Source,
    #[serde(default)]
    pub unused_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyseConfig {
    pub enabled: bool,
    pub key_column: String,
    pub indicator_column: String,
    /// Label the first dataset is stored under next to the partitions.
    pub primary_label: String,
}

impl Default for AnalyseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_column: "Country".to_string(),
            indicator_column: "Indicator".to_string(),
            primary_label: "Temperature".to_string(),
        }
    }
}

/// Everything a pipeline run needs. Any field left out of a config file
/// falls back to the built-in climate datasets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database: PathBuf,
    pub threshold_policy: ThresholdPolicy,
    pub datasets: Vec<DatasetConfig>,
    pub analyse: AnalyseConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let unused = |extra: &[&str]| -> Vec<String> {
            METADATA_COLUMNS
                .iter()
                .chain(extra)
                .map(|c| c.to_string())
                .collect()
        };
        Self {
            database: PathBuf::from("data").join("climate_change.db"),
            threshold_policy: ThresholdPolicy::default(),
            datasets: vec![
                DatasetConfig {
                    table: "Annual_Surface_Temperature".to_string(),
                    source: Source::Url(TEMPERATURE_URL.to_string()),
                    unused_columns: unused(&["Indicator"]),
                },
                // Indicator stays: the analyse step partitions on it.
                DatasetConfig {
                    table: "Forest_and_Carbon".to_string(),
                    source: Source::Url(FORESTS_URL.to_string()),
                    unused_columns: unused(&[]),
                },
            ],
            analyse: AnalyseConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EtlError::Config(e.to_string()))
    }
}
