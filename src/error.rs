use std::path::PathBuf;
use thiserror::Error;

/// Problems with the harness setup. Nothing can be checked when one of these occurs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("must provide a valid base url")]
    EmptyBaseUrl,
    #[error("could not parse base url ({url}): {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("base url ({0}) has no host")]
    MissingHost(String),
    #[error("could not set up tls: {0}")]
    Tls(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum StreamError {
    /// Too much data was received to resolve the desired operation
    /// such as reading the next line of the response head.
    #[error("buffer overflow while reading response head")]
    BufferOverflow,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection timed out")]
    ConnectionTimeout,
    #[error("connection reset")]
    ConnectionReset,
    /// Other connection error. String contains underlying error text.
    #[error("{0}")]
    Other(String),
    /// Indicates we have previously detected another error with the stream
    /// and any future calls to a method requiring reading will fail.
    #[error("stream not connected")]
    StreamNotConnected,
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                StreamError::ConnectionTimeout
            }
            std::io::ErrorKind::ConnectionReset => StreamError::ConnectionReset,
            std::io::ErrorKind::UnexpectedEof => StreamError::ConnectionClosed,
            _ => StreamError::Other(e.to_string()),
        }
    }
}

/// Failures that leave no response to inspect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not resolve {host}:{port}: {reason}")]
    Resolve { host: String, port: u16, reason: String },
    #[error("could not connect to {addr}: {source}")]
    Connect { addr: String, source: std::io::Error },
    #[error("tls handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("redirect from {from} has no usable location")]
    BadRedirect { from: String },
    #[error("too many redirects (max {max}) starting at {url}")]
    TooManyRedirects { url: String, max: usize },
}

/// Errors that end a single check. Sibling checks keep running.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: TransportError },
    #[error("failed to load fixture {}: {source}", path.display())]
    Fixture { path: PathBuf, source: std::io::Error },
}
