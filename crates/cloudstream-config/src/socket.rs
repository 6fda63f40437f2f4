use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Where the daemon accepts session connections.
///
/// Endpoints are written as URLs: `tcp://host:port` or `unix:///path`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket bound at `path`.
    Unix { path: Utf8PathBuf },
    /// TCP socket bound at `host:port`.
    Tcp { host: String, port: u16 },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Socket path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Creates the parent directory of a Unix socket, owner-only.
    ///
    /// TCP endpoints need no preparation.
    ///
    /// # Errors
    ///
    /// Fails when the socket path has no parent or the directory cannot be
    /// created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        match builder.create(parent.as_std_path()) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host, port))
            }
            "unix" => match url.path() {
                "" | "/" => Err(SocketParseError::MissingUnixPath(input.to_owned())),
                path => Ok(Self::unix(path)),
            },
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Errors raised while parsing a [`SocketEndpoint`].
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Only `tcp` and `unix` are accepted.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// `tcp://` endpoint without a host.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// `tcp://` endpoint without a port.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// `unix://` endpoint without a path.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// Input is not a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised while preparing a Unix socket directory.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path is a bare file name.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// The parent directory could not be created.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
