//! Read commands and the factory that builds them from invocations.

mod arguments;
mod command;
mod factory;

pub use arguments::{Argument, InvocationError, split_callback};
pub use command::{ReadCommand, ReadError};
pub use factory::{
    HOST_PORT_REQUIRED, INVALID_COORD_TYPES, INVALID_COORDS, INVALID_RADIUS, INVALID_START,
    PendingRead, ReadRequest, UNIDENTIFIED_READ, create, create_with, decode,
};

pub(crate) const READ_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::read");
