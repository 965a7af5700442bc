//! Endpoint descriptors for listening and dialing
//!
//! An endpoint is a string such as `tcp:8080`, `tcp:127.0.0.1:8080`,
//! `tcp:host=db.internal:port=5432` or `unix:/run/app.sock`. Endpoints
//! compare by their exact string form, so `tcp:8080` and `tcp:port=8080`
//! are distinct keys even though they describe the same address.

use crate::error::{Error, Result};
use crate::utils::socket::{SocketCleanupGuard, prepare_socket_path};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tracing::debug;

/// Interface used when a TCP endpoint is listened on without a host
const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Host used when a TCP endpoint is dialed without a host
const DEFAULT_CONNECT_HOST: &str = "127.0.0.1";

/// Parsed form of an endpoint string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    Tcp { host: Option<String>, port: u16 },
    Unix(PathBuf),
}

/// Address descriptor for a listening or connecting socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    raw: String,
    address: Address,
}

impl Endpoint {
    /// The endpoint exactly as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The address this endpoint describes
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Bind a listener on this endpoint
    pub async fn listen(&self) -> Result<Listener> {
        let bind_err = |source: io::Error| Error::Bind {
            endpoint: self.raw.clone(),
            source,
        };

        match self.address() {
            Address::Tcp { host, port } => {
                let host = host.as_deref().unwrap_or(DEFAULT_LISTEN_HOST);
                let listener = TcpListener::bind((host, *port)).await.map_err(bind_err)?;
                debug!(endpoint = %self, "Bound TCP listener");
                Ok(Listener::Tcp(listener))
            }
            Address::Unix(path) => {
                prepare_socket_path(path).map_err(|e| bind_err(io::Error::other(e)))?;
                let listener = UnixListener::bind(path).map_err(bind_err)?;
                debug!(endpoint = %self, "Bound Unix listener");
                Ok(Listener::Unix {
                    listener,
                    _cleanup: SocketCleanupGuard::new(path),
                })
            }
        }
    }

    /// Dial this endpoint
    pub async fn connect(&self) -> Result<Connection> {
        let connect_err = |source: io::Error| Error::Connect {
            endpoint: self.raw.clone(),
            source,
        };

        match self.address() {
            Address::Tcp { host, port } => {
                let host = host.as_deref().unwrap_or(DEFAULT_CONNECT_HOST);
                let stream = TcpStream::connect((host, *port))
                    .await
                    .map_err(connect_err)?;
                Ok(Connection::Tcp(stream))
            }
            Address::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(connect_err)?;
                Ok(Connection::Unix(stream))
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let address = parse_address(s)?;
        Ok(Self {
            raw: s.to_string(),
            address,
        })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let address = parse_address(&value)?;
        Ok(Self {
            raw: value,
            address,
        })
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.raw
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn invalid(endpoint: &str, reason: impl Into<String>) -> Error {
    Error::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.into(),
    }
}

fn parse_port(endpoint: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| invalid(endpoint, format!("invalid port '{}'", port)))
}

/// Parse an endpoint string into an address
///
/// Accepted forms:
/// - `tcp:PORT`, `tcp:HOST:PORT`
/// - `tcp:port=PORT[:host=HOST|:interface=HOST]`
/// - `unix:PATH`, `unix:path=PATH`
fn parse_address(s: &str) -> Result<Address> {
    let (scheme, rest) = s
        .split_once(':')
        .ok_or_else(|| invalid(s, "expected '<scheme>:<address>'"))?;

    match scheme {
        "tcp" => {
            let parts: Vec<&str> = rest.split(':').collect();
            if parts.iter().all(|p| p.contains('=')) {
                let mut host = None;
                let mut port = None;
                for part in parts {
                    let (key, value) = part.split_once('=').unwrap_or((part, ""));
                    match key {
                        "host" | "interface" => host = Some(value.to_string()),
                        "port" => port = Some(parse_port(s, value)?),
                        _ => return Err(invalid(s, format!("unknown tcp option '{}'", key))),
                    }
                }
                let port = port.ok_or_else(|| invalid(s, "missing port"))?;
                Ok(Address::Tcp { host, port })
            } else {
                match parts.as_slice() {
                    [port] => Ok(Address::Tcp {
                        host: None,
                        port: parse_port(s, port)?,
                    }),
                    [host, port] if !host.is_empty() => Ok(Address::Tcp {
                        host: Some(host.to_string()),
                        port: parse_port(s, port)?,
                    }),
                    _ => Err(invalid(s, "expected tcp:PORT or tcp:HOST:PORT")),
                }
            }
        }
        "unix" => {
            let path = rest.strip_prefix("path=").unwrap_or(rest);
            if path.is_empty() {
                return Err(invalid(s, "missing socket path"));
            }
            Ok(Address::Unix(PathBuf::from(path)))
        }
        other => Err(invalid(s, format!("unsupported scheme '{}'", other))),
    }
}

/// A bound listener
pub enum Listener {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        /// Removes the socket file once the listener is dropped
        _cleanup: SocketCleanupGuard,
    },
}

impl Listener {
    /// Accept the next inbound connection
    pub async fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener.accept().await?;
                Ok(Connection::Tcp(stream))
            }
            Listener::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().await?;
                Ok(Connection::Unix(stream))
            }
        }
    }

    /// Local TCP port, if this is a TCP listener
    pub fn local_port(&self) -> Option<u16> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok().map(|a| a.port()),
            Listener::Unix { .. } => None,
        }
    }
}

/// A connected byte stream over TCP or a Unix socket
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_flush(cx),
            Connection::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Build a `unix:` endpoint for a filesystem path
pub fn unix_endpoint(path: &Path) -> Endpoint {
    Endpoint {
        raw: format!("unix:{}", path.display()),
        address: Address::Unix(path.to_path_buf()),
    }
}
