//! Serialized model and transform artifacts
//!
//! Artifacts are stored as JSON documents tagged with their `type`, e.g.
//! `{"type": "linear_model", "features": ["x"], "weights": [2.0], "intercept": 1.0}`.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::batch::{Batch, Record};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Unsupported file type for {path:?}; supported extensions: .json")]
    UnsupportedFileType { path: PathBuf },

    #[error("Failed to read artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode artifact {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[typetag::serde(tag = "type")]
pub trait ModelArtifact: Debug + Send + Sync {
    /// One prediction per row, in row order.
    fn predict(&self, batch: &Batch) -> anyhow::Result<Vec<Value>>;

    /// Names of the numeric input columns, when the artifact knows them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

#[typetag::serde(tag = "type")]
pub trait TransformArtifact: Debug + Send + Sync {
    fn transform(&self, batch: Batch) -> anyhow::Result<Batch>;
}

/// `intercept + sum(weight * feature)` over numeric features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub features: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

#[typetag::serde(name = "linear_model")]
impl ModelArtifact for LinearModel {
    fn predict(&self, batch: &Batch) -> anyhow::Result<Vec<Value>> {
        anyhow::ensure!(
            self.features.len() == self.weights.len(),
            "linear model has {} features but {} weights",
            self.features.len(),
            self.weights.len()
        );
        (0..batch.len())
            .map(|i| {
                let mut total = self.intercept;
                for (feature, weight) in self.features.iter().zip(&self.weights) {
                    let value = batch.value(i, feature).as_f64().ok_or_else(|| {
                        anyhow::anyhow!("feature '{}' of row {} is not a number", feature, i)
                    })?;
                    total += weight * value;
                }
                Ok(json!(total))
            })
            .collect()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(self.features.as_slice())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaling {
    pub mean: f64,
    pub scale: f64,
}

/// Standardizes the listed columns as `(value - mean) / scale`; other columns
/// pass through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnScaler {
    pub columns: BTreeMap<String, Scaling>,
}

#[typetag::serde(name = "column_scaler")]
impl TransformArtifact for ColumnScaler {
    fn transform(&self, batch: Batch) -> anyhow::Result<Batch> {
        let rows = batch
            .into_records()
            .into_iter()
            .map(|mut row| {
                for (name, scaling) in &self.columns {
                    anyhow::ensure!(scaling.scale != 0.0, "column '{}' has zero scale", name);
                    if let Some(value) = row.get_mut(name) {
                        if let Some(number) = value.as_f64() {
                            *value = json!((number - scaling.mean) / scaling.scale);
                        }
                    }
                }
                Ok(row)
            })
            .collect::<anyhow::Result<Vec<Record>>>()?;
        Ok(Batch::from_records(rows))
    }
}

fn read_json_artifact<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(ArtifactError::UnsupportedFileType {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_model(path: impl AsRef<Path>) -> Result<Box<dyn ModelArtifact>, ArtifactError> {
    let path = path.as_ref();
    let model: Box<dyn ModelArtifact> = read_json_artifact(path)?;
    log::info!("Loaded model artifact from {}", path.display());
    Ok(model)
}

pub fn load_transformer(path: impl AsRef<Path>) -> Result<Box<dyn TransformArtifact>, ArtifactError> {
    let path = path.as_ref();
    let transformer: Box<dyn TransformArtifact> = read_json_artifact(path)?;
    log::info!("Loaded transform artifact from {}", path.display());
    Ok(transformer)
}
