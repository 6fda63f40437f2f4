//! Data-source seam: the opened point cloud a read pulls from.
//!
//! The daemon only needs point counts, schema metadata and three query
//! shapes that fill a caller-owned buffer. Everything about how a source
//! indexes or stores its points stays behind [`PointSource`].

mod inline;
mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::query::{QuadQuery, RadiusQuery, RangeQuery};
use crate::schema::{Dimension, Schema};

pub use inline::InlinePipelineProvider;
pub use memory::MemorySource;

/// An opened, queryable point cloud.
///
/// Reads encode each selected point with `schema` into consecutive
/// `schema.stride()`-byte records at the start of `buffer` and return the
/// number of records written.
pub trait PointSource: Send + Sync {
    /// Total number of points held by the source.
    fn num_points(&self) -> u64;

    /// Native dimensions in source order.
    fn dimensions(&self) -> Vec<Dimension>;

    /// Native schema description as JSON text.
    fn schema_json(&self) -> String;

    /// Reads up to `query.count` points starting at `query.start`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the buffer is too small or the query
    /// cannot be evaluated.
    fn read_range(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RangeQuery,
    ) -> Result<u64, SourceError>;

    /// Reads points selected by index depth and optional bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the buffer is too small or the query
    /// cannot be evaluated.
    fn read_quad(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &QuadQuery,
    ) -> Result<u64, SourceError>;

    /// Reads points within a radius of a centre.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the buffer is too small or the query
    /// cannot be evaluated.
    fn read_radius(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RadiusQuery,
    ) -> Result<u64, SourceError>;
}

/// Opens point sources from pipeline descriptions.
pub trait SourceProvider: Send + Sync {
    /// Checks a pipeline description without executing it.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidPipeline`] when the description is
    /// rejected.
    fn validate(&self, pipeline: &str) -> Result<(), SourceError>;

    /// Executes a pipeline description and returns the opened source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the pipeline is invalid or fails to run.
    fn open(&self, pipeline: &str) -> Result<Arc<dyn PointSource>, SourceError>;
}

/// Errors raised by data sources and providers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The pipeline description was rejected.
    #[error("invalid pipeline: {message}")]
    InvalidPipeline { message: String },
    /// The output buffer cannot hold the selected points.
    #[error("buffer of {available} bytes cannot hold {required} bytes")]
    BufferTooSmall { required: usize, available: usize },
    /// The query could not be evaluated against this source.
    #[error("query failed: {message}")]
    Query { message: String },
}

impl SourceError {
    pub fn invalid_pipeline(message: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}
