//! JSONL request dispatch for session connections.
//!
//! Each connection owns one [`Session`](crate::session::Session). Clients
//! send one request per line:
//!
//! ```json
//! {"command":"read","arguments":["localhost",9000,null,0,10]}
//! ```
//!
//! Every request is answered with one response line tagged by `kind`. Read
//! and pipeline callbacks answer asynchronously, so their responses may
//! interleave with replies to later requests:
//!
//! ```json
//! {"kind":"accepted","error":null,"num_points":10,"num_bytes":160}
//! {"kind":"rejected","error":"Read already in progress"}
//! {"kind":"error","message":"unknown command: bogus"}
//! ```
//!
//! Malformed lines are answered with an `error` response and the connection
//! stays open. Requests over 1 MiB close it.

mod errors;
mod handler;
mod request;
mod response;
mod router;

pub use self::handler::DispatchConnectionHandler;
pub use self::response::DaemonMessage;
