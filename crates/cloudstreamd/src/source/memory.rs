//! In-memory point source backed by row-major `f64` values.

use serde_json::json;

use crate::query::{QuadQuery, RadiusQuery, RangeQuery};
use crate::schema::{Dimension, Schema};

use super::{PointSource, SourceError};

/// Point source holding every value in memory.
///
/// Quad-index depth is implied by point order: depth `d` covers the indices
/// `(4^d - 1) / 3 .. (4^(d + 1) - 1) / 3`, so depth 0 is the first point,
/// depth 1 the next four, and so on.
#[derive(Debug, Clone)]
pub struct MemorySource {
    dimensions: Vec<Dimension>,
    points: Vec<Vec<f64>>,
}

impl MemorySource {
    /// Builds a source from native dimensions and one row per point.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidPipeline`] when no dimensions are given
    /// or a row's width differs from the dimension count.
    pub fn new(dimensions: Vec<Dimension>, points: Vec<Vec<f64>>) -> Result<Self, SourceError> {
        if dimensions.is_empty() {
            return Err(SourceError::invalid_pipeline("no dimensions declared"));
        }
        if let Some((index, row)) = points
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != dimensions.len())
        {
            return Err(SourceError::invalid_pipeline(format!(
                "point {index} has {} values, expected {}",
                row.len(),
                dimensions.len()
            )));
        }
        Ok(Self { dimensions, points })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .position(|dimension| dimension.name.eq_ignore_ascii_case(name))
    }

    fn required_column(&self, name: &str) -> Result<usize, SourceError> {
        self.column(name)
            .ok_or_else(|| SourceError::query(format!("source has no '{name}' dimension")))
    }

    fn value(&self, point: usize, column: usize) -> f64 {
        self.points
            .get(point)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or_default()
    }

    /// Encodes the selected points into `buffer` and returns how many were
    /// written.
    fn write_points(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        selected: impl Iterator<Item = usize>,
    ) -> Result<u64, SourceError> {
        let stride = schema.stride();
        let columns: Vec<Option<usize>> = schema
            .dimensions()
            .iter()
            .map(|dimension| self.column(&dimension.name))
            .collect();

        let mut written = 0_usize;
        for point in selected {
            let offset = written * stride;
            let available = buffer.len();
            let record = buffer.get_mut(offset..offset + stride).ok_or(
                SourceError::BufferTooSmall {
                    required: offset + stride,
                    available,
                },
            )?;

            let mut field_offset = 0;
            for (dimension, column) in schema.dimensions().iter().zip(&columns) {
                let end = field_offset + dimension.size;
                if let Some(field) = record.get_mut(field_offset..end) {
                    match column {
                        Some(column) => dimension.encode(self.value(point, *column), field),
                        None => field.fill(0),
                    }
                }
                field_offset = end;
            }
            written += 1;
        }
        Ok(written as u64)
    }
}

/// Depth of the quad-tree level holding point `index`.
fn depth_of(index: usize) -> u32 {
    let mut depth = 0;
    let mut level_start = 0_usize;
    let mut level_size = 1_usize;
    while index >= level_start.saturating_add(level_size) {
        level_start = level_start.saturating_add(level_size);
        level_size = level_size.saturating_mul(4);
        depth += 1;
    }
    depth
}

impl PointSource for MemorySource {
    fn num_points(&self) -> u64 {
        self.points.len() as u64
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    fn schema_json(&self) -> String {
        json!({ "dimensions": self.dimensions }).to_string()
    }

    fn read_range(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RangeQuery,
    ) -> Result<u64, SourceError> {
        let total = self.points.len();
        let start = usize::try_from(query.start).unwrap_or(usize::MAX).min(total);
        let count = usize::try_from(query.count).unwrap_or(usize::MAX);
        let end = start.saturating_add(count).min(total);
        self.write_points(buffer, schema, start..end)
    }

    fn read_quad(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &QuadQuery,
    ) -> Result<u64, SourceError> {
        let axes = match query.bbox {
            Some(_) => Some((self.required_column("X")?, self.required_column("Y")?)),
            None => None,
        };
        let selected = (0..self.points.len()).filter(|&point| {
            let depth = depth_of(point);
            if depth < query.depth_begin || depth >= query.depth_end {
                return false;
            }
            match (query.bbox, axes) {
                (Some(bbox), Some((x, y))) => {
                    bbox.contains(self.value(point, x), self.value(point, y))
                }
                _ => true,
            }
        });
        self.write_points(buffer, schema, selected)
    }

    fn read_radius(
        &self,
        buffer: &mut [u8],
        schema: &Schema,
        query: &RadiusQuery,
    ) -> Result<u64, SourceError> {
        let x = self.required_column("X")?;
        let y = self.required_column("Y")?;
        let z = if query.is_3d {
            Some(self.required_column("Z")?)
        } else {
            None
        };
        let radius_squared = query.radius * query.radius;
        let selected = (0..self.points.len()).filter(|&point| {
            let dx = self.value(point, x) - query.x;
            let dy = self.value(point, y) - query.y;
            let dz = z.map_or(0.0, |z| self.value(point, z) - query.z);
            dx * dx + dy * dy + dz * dz <= radius_squared
        });
        self.write_points(buffer, schema, selected)
    }
}
