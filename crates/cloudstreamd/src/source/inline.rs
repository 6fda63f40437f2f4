//! Provider for pipelines that carry their points inline as JSON.

use std::sync::Arc;

use serde::Deserialize;

use crate::schema::Dimension;

use super::{MemorySource, PointSource, SourceError, SourceProvider};

/// Accepts pipeline documents of the form
/// `{"dimensions": [{"name", "type", "size"}], "points": [[...], ...]}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlinePipelineProvider;

impl InlinePipelineProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn load(pipeline: &str) -> Result<MemorySource, SourceError> {
        let document: PipelineDocument = serde_json::from_str(pipeline)
            .map_err(|error| SourceError::invalid_pipeline(error.to_string()))?;
        if let Some(dimension) = document
            .dimensions
            .iter()
            .find(|dimension| !dimension.kind.supports_size(dimension.size))
        {
            return Err(SourceError::invalid_pipeline(format!(
                "dimension '{}' cannot be {} bytes of type {}",
                dimension.name, dimension.size, dimension.kind
            )));
        }
        MemorySource::new(document.dimensions, document.points)
    }
}

#[derive(Debug, Deserialize)]
struct PipelineDocument {
    dimensions: Vec<Dimension>,
    #[serde(default)]
    points: Vec<Vec<f64>>,
}

impl SourceProvider for InlinePipelineProvider {
    fn validate(&self, pipeline: &str) -> Result<(), SourceError> {
        Self::load(pipeline).map(drop)
    }

    fn open(&self, pipeline: &str) -> Result<Arc<dyn PointSource>, SourceError> {
        let source = Self::load(pipeline)?;
        Ok(Arc::new(source))
    }
}
