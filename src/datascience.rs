//! Capabilities a prediction service composes: a model, optional pre- and
//! post-processing, and optional extra input checks.
//!
//! Closures with the matching signature implement each trait, so small
//! services can be assembled without new types.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::artifact::{self, ArtifactError, ModelArtifact, TransformArtifact};
use crate::batch::Batch;
use crate::schema::ApiObject;

pub trait Predictor: Send + Sync {
    /// One prediction per row of `features`, in row order.
    fn predict(&self, features: &Batch) -> anyhow::Result<Vec<Value>>;
}

pub trait Transformer: Send + Sync {
    fn process(&self, batch: Batch) -> anyhow::Result<Batch>;
}

pub trait PostProcessor: Send + Sync {
    fn process(
        &self,
        input: &Batch,
        preprocessed: &Batch,
        predictions: Vec<Value>,
    ) -> anyhow::Result<Vec<Value>>;
}

/// Extra validation run on the projected input. An error rejects the request
/// with its message.
pub type AdditionalChecks = Arc<dyn Fn(&Batch) -> anyhow::Result<()> + Send + Sync>;

impl<F> Predictor for F
where
    F: Fn(&Batch) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    fn predict(&self, features: &Batch) -> anyhow::Result<Vec<Value>> {
        self(features)
    }
}

impl<F> Transformer for F
where
    F: Fn(Batch) -> anyhow::Result<Batch> + Send + Sync,
{
    fn process(&self, batch: Batch) -> anyhow::Result<Batch> {
        self(batch)
    }
}

impl<F> PostProcessor for F
where
    F: Fn(&Batch, &Batch, Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    fn process(
        &self,
        input: &Batch,
        preprocessed: &Batch,
        predictions: Vec<Value>,
    ) -> anyhow::Result<Vec<Value>> {
        self(input, preprocessed, predictions)
    }
}

/// A loaded model artifact used as a [`Predictor`].
#[derive(Debug)]
pub struct WrappedModel {
    model: Box<dyn ModelArtifact>,
}

impl WrappedModel {
    pub fn new(model: Box<dyn ModelArtifact>) -> Self {
        Self { model }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        Ok(Self::new(artifact::load_model(path)?))
    }

    /// Feature schema derived from the artifact: one required number per
    /// feature it reads.
    pub fn feature_schema(&self) -> Option<ApiObject> {
        let names = self.model.feature_names()?;
        Some(
            ApiObject::object(names.iter().map(|name| (name.clone(), ApiObject::number())))
                .with_reference_name("Features"),
        )
    }
}

impl Predictor for WrappedModel {
    fn predict(&self, features: &Batch) -> anyhow::Result<Vec<Value>> {
        self.model.predict(features)
    }
}

/// A loaded transform artifact used as a [`Transformer`].
#[derive(Debug)]
pub struct WrappedTransformer {
    transformer: Box<dyn TransformArtifact>,
}

impl WrappedTransformer {
    pub fn new(transformer: Box<dyn TransformArtifact>) -> Self {
        Self { transformer }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        Ok(Self::new(artifact::load_transformer(path)?))
    }
}

impl Transformer for WrappedTransformer {
    fn process(&self, batch: Batch) -> anyhow::Result<Batch> {
        self.transformer.transform(batch)
    }
}
