//! Decodes read invocations into commands.
//!
//! Positional arguments after the callback is detached are
//! `host, port, schema` followed by one of three shapes, tried in order:
//!
//! | shape  | trailing arguments                          |
//! |--------|---------------------------------------------|
//! | range  | `start, count`                              |
//! | quad   | `bbox \| null, depth_begin, depth_end`      |
//! | radius | `is_3d, radius, x, y, z`                    |
//!
//! Validation failures are answered through the callback; only a missing
//! callback is returned as an error.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::completion::ReadCallback;
use crate::query::{BBox, QuadQuery, Query, RadiusQuery, RangeQuery};
use crate::scheduler::CancellationToken;
use crate::schema::{Dimension, DimensionKind, Schema};
use crate::source::PointSource;

use super::READ_TARGET;
use super::arguments::{Argument, InvocationError, split_callback};
use super::command::ReadCommand;

pub const HOST_PORT_REQUIRED: &str = "Host, port, and callback must be supplied";
pub const UNIDENTIFIED_READ: &str = "Could not identify 'read' from args";
pub const INVALID_START: &str = "Invalid 'start' in 'read' request";
pub const INVALID_COORDS: &str = "Invalid coords in query";
pub const INVALID_COORD_TYPES: &str = "Invalid coord types in query";
pub const INVALID_RADIUS: &str = "Invalid 'radius' in 'read' request";

/// Fully validated read parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub host: String,
    pub port: u16,
    pub schema: Schema,
    pub query: Query,
}

/// A command ready to schedule together with its caller's callback.
#[derive(Debug)]
pub struct PendingRead {
    pub command: ReadCommand,
    pub callback: ReadCallback,
}

/// Builds a command from a full invocation, callback last.
///
/// Returns `Ok(None)` when the callback has already been invoked with a
/// validation error.
///
/// # Errors
///
/// Returns [`InvocationError::MissingCallback`] when the trailing argument is
/// not a callback.
pub fn create(
    arguments: Vec<Argument>,
    source: Arc<dyn PointSource>,
    token: CancellationToken,
) -> Result<Option<PendingRead>, InvocationError> {
    let (positional, callback) = split_callback(arguments)?;
    Ok(create_with(&positional, callback, source, token))
}

/// Builds a command from positional arguments and a detached callback.
///
/// On failure the callback receives the error message and `None` is
/// returned.
pub fn create_with(
    positional: &[Argument],
    callback: ReadCallback,
    source: Arc<dyn PointSource>,
    token: CancellationToken,
) -> Option<PendingRead> {
    let request = match decode(positional, source.num_points()) {
        Ok(request) => request,
        Err(message) => {
            debug!(target: READ_TARGET, reason = message, "read request rejected");
            callback.reject(message);
            return None;
        }
    };

    match ReadCommand::new(source, request, token) {
        Ok(command) => Some(PendingRead { command, callback }),
        Err(error) => {
            debug!(target: READ_TARGET, %error, "read command construction failed");
            callback.reject(error.to_string());
            None
        }
    }
}

/// Validates positional arguments against a source holding `total_points`.
///
/// # Errors
///
/// Returns the message to deliver through the caller's callback.
pub fn decode(positional: &[Argument], total_points: u64) -> Result<ReadRequest, &'static str> {
    let values: Vec<Option<&Value>> = positional.iter().map(Argument::value).collect();
    let (host, port, schema, rest) = match values.as_slice() {
        [Some(Value::String(host)), Some(port), Some(Value::Object(schema)), rest @ ..] => {
            let port = as_integer(port)
                .and_then(|port| u16::try_from(port).ok())
                .ok_or(HOST_PORT_REQUIRED)?;
            (host.clone(), port, decode_schema(schema), rest)
        }
        _ => return Err(HOST_PORT_REQUIRED),
    };

    let query = match rest {
        [Some(start), Some(count)] if is_integer(start) && is_integer(count) => {
            decode_range(start, count, total_points)?
        }
        [bbox, Some(depth_begin), Some(depth_end)]
            if is_bbox_shape(*bbox) && is_integer(depth_begin) && is_integer(depth_end) =>
        {
            decode_quad(*bbox, depth_begin, depth_end)?
        }
        [Some(Value::Bool(is_3d)), Some(radius), Some(x), Some(y), Some(z)]
            if [radius, x, y, z].iter().all(|value| value.is_number()) =>
        {
            let radius = as_number(radius);
            if radius < 0.0 {
                return Err(INVALID_RADIUS);
            }
            Query::Radius(RadiusQuery {
                is_3d: *is_3d,
                radius,
                x: as_number(x),
                y: as_number(y),
                z: as_number(z),
            })
        }
        _ => return Err(UNIDENTIFIED_READ),
    };

    Ok(ReadRequest {
        host,
        port,
        schema,
        query,
    })
}

fn decode_range(start: &Value, count: &Value, total_points: u64) -> Result<Query, &'static str> {
    let start = as_integer(start).ok_or(UNIDENTIFIED_READ)?;
    let count = as_integer(count).ok_or(UNIDENTIFIED_READ)?;
    if u64::from(start) >= total_points {
        return Err(INVALID_START);
    }
    Ok(Query::Range(RangeQuery {
        start: u64::from(start),
        count: u64::from(count),
    }))
}

fn decode_quad(
    bbox: Option<&Value>,
    depth_begin: &Value,
    depth_end: &Value,
) -> Result<Query, &'static str> {
    let depth_begin = as_integer(depth_begin).ok_or(UNIDENTIFIED_READ)?;
    let depth_end = as_integer(depth_end).ok_or(UNIDENTIFIED_READ)?;
    let bbox = match bbox.and_then(Value::as_array) {
        None => None,
        Some(corners) => {
            let bbox = match corners.as_slice() {
                [x_min, y_min, x_max, y_max, ..]
                    if [x_min, y_min, x_max, y_max]
                        .iter()
                        .all(|value| value.is_number()) =>
                {
                    BBox::new(
                        as_number(x_min),
                        as_number(y_min),
                        as_number(x_max),
                        as_number(y_max),
                    )
                }
                _ => return Err(INVALID_COORD_TYPES),
            };
            if !bbox.is_ordered() {
                return Err(INVALID_COORDS);
            }
            Some(bbox)
        }
    };
    Ok(Query::Quad(QuadQuery {
        bbox,
        depth_begin,
        depth_end,
    }))
}

/// Decodes `{"dimensions": [...]}`, dropping entries without a usable size
/// or type.
fn decode_schema(descriptor: &Map<String, Value>) -> Schema {
    let Some(entries) = descriptor.get("dimensions").and_then(Value::as_array) else {
        return Schema::default();
    };
    Schema::new(entries.iter().filter_map(decode_dimension).collect())
}

fn decode_dimension(entry: &Value) -> Option<Dimension> {
    let entry = entry.as_object()?;
    let name = match entry.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let size = entry.get("size").and_then(parse_size).filter(|size| *size > 0);
    let Some(size) = size else {
        debug!(target: READ_TARGET, dimension = %name, "dropping dimension without positive size");
        return None;
    };
    let kind = entry
        .get("type")
        .and_then(Value::as_str)
        .and_then(|kind| kind.parse::<DimensionKind>().ok());
    match kind {
        Some(kind) if kind.supports_size(size) => Some(Dimension::new(name, kind, size)),
        _ => {
            debug!(
                target: READ_TARGET,
                dimension = %name,
                size,
                "dropping dimension with unsupported type"
            );
            None
        }
    }
}

/// Sizes may arrive as numbers or numeric strings.
fn parse_size(value: &Value) -> Option<usize> {
    match value {
        Value::Number(_) => as_integer(value).and_then(|size| usize::try_from(size).ok()),
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Non-negative integral number that fits in `u32`.
fn as_integer(value: &Value) -> Option<u32> {
    if let Some(integer) = value.as_u64() {
        return u32::try_from(integer).ok();
    }
    let float = value.as_f64()?;
    if float.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&float) {
        Some(float as u32)
    } else {
        None
    }
}

fn is_integer(value: &Value) -> bool {
    as_integer(value).is_some()
}

/// Absent (`None` or `null`) or an array of at least four elements.
fn is_bbox_shape(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(corners)) => corners.len() >= 4,
        Some(_) => false,
    }
}

fn as_number(value: &Value) -> f64 {
    value.as_f64().unwrap_or_default()
}
