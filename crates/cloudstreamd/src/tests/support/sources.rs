//! In-memory sources, pipelines and a mock provider.

use std::sync::Arc;

use mockall::mock;
use serde_json::json;

use crate::query::{QuadQuery, RadiusQuery, RangeQuery};
use crate::schema::{Dimension, DimensionKind, Schema};
use crate::source::{MemorySource, PointSource, SourceError, SourceProvider};

/// `X` and `Y` as 8-byte floats: a 16-byte stride.
pub(crate) fn xy_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::new("X", DimensionKind::Floating, 8),
        Dimension::new("Y", DimensionKind::Floating, 8),
    ]
}

/// Point `i` sits at `(i, 2i)`.
pub(crate) fn sequential_points(count: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|index| {
            let x = f64::from(u32::try_from(index).expect("small fixture"));
            vec![x, x * 2.0]
        })
        .collect()
}

pub(crate) fn sequential_source(count: usize) -> Arc<dyn PointSource> {
    Arc::new(MemorySource::new(xy_dimensions(), sequential_points(count)).expect("valid source"))
}

/// Inline pipeline document describing [`sequential_points`].
pub(crate) fn sequential_pipeline(count: usize) -> String {
    json!({
        "dimensions": [
            {"name": "X", "type": "floating", "size": 8},
            {"name": "Y", "type": "floating", "size": 8},
        ],
        "points": sequential_points(count),
    })
    .to_string()
}

/// Decodes the `X` column of a buffer written with [`xy_dimensions`].
pub(crate) fn decode_x(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(16)
        .map(|record| {
            let x: [u8; 8] = record
                .get(..8)
                .and_then(|slice| slice.try_into().ok())
                .expect("record holds X");
            f64::from_le_bytes(x)
        })
        .collect()
}

/// A source whose queries always fail.
#[derive(Debug)]
pub(crate) struct FailingSource {
    pub(crate) num_points: u64,
}

impl PointSource for FailingSource {
    fn num_points(&self) -> u64 {
        self.num_points
    }

    fn dimensions(&self) -> Vec<Dimension> {
        xy_dimensions()
    }

    fn schema_json(&self) -> String {
        "[]".to_owned()
    }

    fn read_range(&self, _: &mut [u8], _: &Schema, _: &RangeQuery) -> Result<u64, SourceError> {
        Err(SourceError::query("storage unavailable"))
    }

    fn read_quad(&self, _: &mut [u8], _: &Schema, _: &QuadQuery) -> Result<u64, SourceError> {
        Err(SourceError::query("storage unavailable"))
    }

    fn read_radius(&self, _: &mut [u8], _: &Schema, _: &RadiusQuery) -> Result<u64, SourceError> {
        Err(SourceError::query("storage unavailable"))
    }
}

/// A source whose range queries panic.
#[derive(Debug)]
pub(crate) struct PanickingSource;

impl PointSource for PanickingSource {
    fn num_points(&self) -> u64 {
        100
    }

    fn dimensions(&self) -> Vec<Dimension> {
        xy_dimensions()
    }

    fn schema_json(&self) -> String {
        "[]".to_owned()
    }

    fn read_range(&self, _: &mut [u8], _: &Schema, _: &RangeQuery) -> Result<u64, SourceError> {
        panic!("index corrupted")
    }

    fn read_quad(&self, _: &mut [u8], _: &Schema, _: &QuadQuery) -> Result<u64, SourceError> {
        Ok(0)
    }

    fn read_radius(&self, _: &mut [u8], _: &Schema, _: &RadiusQuery) -> Result<u64, SourceError> {
        Ok(0)
    }
}

mock! {
    pub Provider {}

    impl SourceProvider for Provider {
        fn validate(&self, pipeline: &str) -> Result<(), SourceError>;
        fn open(&self, pipeline: &str) -> Result<Arc<dyn PointSource>, SourceError>;
    }
}

/// A provider that opens the given source for any pipeline.
pub(crate) fn provider_opening(source: Arc<dyn PointSource>) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_open()
        .returning(move |_| Ok(Arc::clone(&source)));
    provider.expect_validate().returning(|_| Ok(()));
    provider
}

/// Wraps a source and holds each range read until the test releases it.
pub(crate) struct GatedSource {
    inner: Arc<dyn PointSource>,
    permits: flume::Receiver<()>,
}

impl GatedSource {
    /// Returns the source and the sender that releases one read per message.
    pub(crate) fn new(inner: Arc<dyn PointSource>) -> (Self, flume::Sender<()>) {
        let (release, permits) = flume::unbounded();
        (Self { inner, permits }, release)
    }
}

impl PointSource for GatedSource {
    fn num_points(&self) -> u64 {
        self.inner.num_points()
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.inner.dimensions()
    }

    fn schema_json(&self) -> String {
        self.inner.schema_json()
    }

    fn read_range(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RangeQuery,
    ) -> Result<u64, SourceError> {
        self.permits
            .recv()
            .map_err(|_| SourceError::query("gate closed"))?;
        self.inner.read_range(buffer, schema, query)
    }

    fn read_quad(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &QuadQuery,
    ) -> Result<u64, SourceError> {
        self.inner.read_quad(buffer, schema, query)
    }

    fn read_radius(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RadiusQuery,
    ) -> Result<u64, SourceError> {
        self.inner.read_radius(buffer, schema, query)
    }
}
