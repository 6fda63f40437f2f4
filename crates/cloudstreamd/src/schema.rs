//! Output schemas: ordered, typed, sized dimensions describing one point
//! record on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::PointSource;

/// Numeric interpretation of a dimension's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    /// Two's-complement signed integer.
    #[serde(alias = "signed-int", alias = "int")]
    Signed,
    /// Unsigned integer.
    #[serde(alias = "unsigned-int", alias = "uint")]
    Unsigned,
    /// IEEE 754 floating point.
    #[serde(alias = "float")]
    Floating,
}

impl DimensionKind {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
            Self::Floating => "floating",
        }
    }

    /// Whether values of this kind can be encoded in `size` bytes.
    #[must_use]
    pub fn supports_size(self, size: usize) -> bool {
        match self {
            Self::Floating => matches!(size, 4 | 8),
            Self::Signed | Self::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for DimensionKind {
    type Err = UnknownDimensionKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "signed" | "signed-int" | "int" => Ok(Self::Signed),
            "unsigned" | "unsigned-int" | "uint" => Ok(Self::Unsigned),
            "floating" | "float" => Ok(Self::Floating),
            _ => Err(UnknownDimensionKind(value.to_owned())),
        }
    }
}

/// Raised when a dimension type name is not recognised.
#[derive(Debug, Error)]
#[error("unknown dimension type '{0}'")]
pub struct UnknownDimensionKind(pub String);

/// One named, typed, sized field of a point record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionKind,
    pub size: usize,
}

impl Dimension {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DimensionKind, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
        }
    }

    /// Writes `value` into `out` as little-endian bytes of this dimension's
    /// type and size.
    ///
    /// Out-of-range values saturate. Combinations without a native encoding,
    /// or an `out` whose length differs from `size`, are zero-filled.
    pub fn encode(&self, value: f64, out: &mut [u8]) {
        if out.len() != self.size {
            out.fill(0);
            return;
        }
        match (self.kind, self.size) {
            (DimensionKind::Floating, 4) => out.copy_from_slice(&(value as f32).to_le_bytes()),
            (DimensionKind::Floating, 8) => out.copy_from_slice(&value.to_le_bytes()),
            (DimensionKind::Signed, 1) => out.copy_from_slice(&(value as i8).to_le_bytes()),
            (DimensionKind::Signed, 2) => out.copy_from_slice(&(value as i16).to_le_bytes()),
            (DimensionKind::Signed, 4) => out.copy_from_slice(&(value as i32).to_le_bytes()),
            (DimensionKind::Signed, 8) => out.copy_from_slice(&(value as i64).to_le_bytes()),
            (DimensionKind::Unsigned, 1) => out.copy_from_slice(&(value as u8).to_le_bytes()),
            (DimensionKind::Unsigned, 2) => out.copy_from_slice(&(value as u16).to_le_bytes()),
            (DimensionKind::Unsigned, 4) => out.copy_from_slice(&(value as u32).to_le_bytes()),
            (DimensionKind::Unsigned, 8) => out.copy_from_slice(&(value as u64).to_le_bytes()),
            _ => out.fill(0),
        }
    }
}

/// Ordered list of dimensions requested for a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    dimensions: Vec<Dimension>,
}

impl Schema {
    #[must_use]
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }

    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Byte width of one point record.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.dimensions.iter().map(|dimension| dimension.size).sum()
    }

    /// Replaces an empty schema with every dimension native to `source`, in
    /// the source's order. Non-empty schemas are returned unchanged.
    #[must_use]
    pub fn or_native(self, source: &dyn PointSource) -> Self {
        if self.is_empty() {
            Self::new(source.dimensions())
        } else {
            self
        }
    }
}
