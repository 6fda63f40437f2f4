//! Query variants a read can carry.

/// Axis-aligned bounding box on the X/Y plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BBox {
    #[must_use]
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// True when both maxima are at least their minima.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.x_max >= self.x_min && self.y_max >= self.y_min
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// Contiguous slice of points in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: u64,
    pub count: u64,
}

/// Points whose index depth lies in `depth_begin..depth_end`, optionally
/// restricted to a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadQuery {
    pub bbox: Option<BBox>,
    pub depth_begin: u32,
    pub depth_end: u32,
}

/// Points within `radius` of a centre, in 2D or 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
    pub is_3d: bool,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A decoded read query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Query {
    Range(RangeQuery),
    Quad(QuadQuery),
    Radius(RadiusQuery),
}

impl Query {
    /// Short label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Range(_) => "range",
            Self::Quad(_) => "quad",
            Self::Radius(_) => "radius",
        }
    }
}
