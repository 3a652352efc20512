//! Blocking HTTP/1.1 client used by every check.
//!
//! Each call opens its own connection, sends one request with
//! `Connection: close`, reads one response and drops the connection.
//! Nothing mutable is shared between calls, so a single [`Client`]
//! can be used from many threads at once.

pub mod response;
pub mod stream;

use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use native_tls::{HandshakeError, TlsConnector};
use socket2::{Domain, Protocol, Socket, Type};
use url::Url;
use crate::error::{ConfigError, TransportError};
use crate::request::{origin_prefix, RequestSpec};
use self::response::{read_body, read_head, ResponseResult};
use self::stream::Stream;

pub const USER_AGENT: &str = "integration-tester";

/// Response heads larger than this are treated as malformed.
const HEAD_MAX: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    /// Applies to connect, read and write separately. `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
    pub accept_invalid_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            user_agent: USER_AGENT.to_owned(),
            io_timeout: Some(Duration::from_secs(30)),
            accept_invalid_certs: false,
        }
    }
}

pub struct Client {
    options: ClientOptions,
    tls: TlsConnector,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Client, ConfigError> {
        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| ConfigError::Tls(e.to_string()))?;
        Ok(Client { options, tls })
    }

    /// Sends the request once. Redirect responses are returned as they are.
    pub fn execute(&self, spec: &RequestSpec) -> Result<ResponseResult, TransportError> {
        self.send(spec.origin(), &spec.target(), spec.headers())
    }

    /// Sends the request and follows up to `max_hops` redirects.
    /// A redirect still pending after that is an error.
    pub fn execute_with_redirects(
        &self,
        spec: &RequestSpec,
        max_hops: usize,
    ) -> Result<ResponseResult, TransportError> {
        let started = Instant::now();
        let mut origin = spec.origin().clone();
        let mut target = spec.target();
        let mut hops = 0;
        loop {
            let mut res = self.send(&origin, &target, spec.headers())?;
            if !res.is_redirect() {
                res.elapsed = started.elapsed();
                return Ok(res);
            }
            if hops >= max_hops {
                return Err(TransportError::TooManyRedirects {
                    url: spec.url_string(),
                    max: max_hops,
                });
            }
            let next = res
                .location()
                .and_then(|loc| Url::parse(&res.url).ok()?.join(loc).ok())
                .filter(|u| u.scheme() == "http" || u.scheme() == "https")
                .ok_or_else(|| TransportError::BadRedirect { from: res.url.clone() })?;
            target = match next.query() {
                Some(q) => format!("{}?{}", next.path(), q),
                None => next.path().to_owned(),
            };
            origin = next;
            hops += 1;
        }
    }

    fn send(
        &self,
        origin: &Url,
        target: &str,
        headers: &[(String, String)],
    ) -> Result<ResponseResult, TransportError> {
        let started = Instant::now();
        let host = origin.host_str().unwrap_or_default();
        let tcp = self.connect(origin)?;

        let mut stream = if origin.scheme() == "https" {
            // brackets are part of the url host for ipv6, not of the tls name
            let domain = host.trim_start_matches('[').trim_end_matches(']');
            let tls = self.tls.connect(domain, tcp).map_err(|e| match e {
                HandshakeError::Failure(ee) => TransportError::Tls {
                    host: host.to_owned(),
                    reason: ee.to_string(),
                },
                HandshakeError::WouldBlock(_) => TransportError::Tls {
                    host: host.to_owned(),
                    reason: "handshake timed out".to_owned(),
                },
            })?;
            Stream::new(tls, HEAD_MAX)
        } else {
            Stream::new(tcp, HEAD_MAX)
        };

        let mut lines = vec![
            format!("GET {} HTTP/1.1", target),
            format!("Host: {}", host_header(origin)),
            format!("User-Agent: {}", self.options.user_agent),
        ];
        for (name, value) in headers {
            lines.push(format!("{}: {}", name, value));
        }
        lines.push("Connection: close\r\n\r\n".to_owned());
        stream.write_all(lines.join("\r\n").as_bytes())?;

        let head = read_head(&mut stream)?;
        let body = read_body(&mut stream, &head)?;

        Ok(ResponseResult {
            status: head.status,
            headers: head.headers,
            body,
            url: format!("{}{}", origin_prefix(origin), target),
            elapsed: started.elapsed(),
        })
    }

    /// Tries every resolved address in turn, returning the first connection.
    fn connect(&self, origin: &Url) -> Result<TcpStream, TransportError> {
        let host = origin.host_str().unwrap_or_default().to_owned();
        let port = origin.port_or_known_default().unwrap_or(80);
        let addrs = origin
            .socket_addrs(|| None)
            .map_err(|e| TransportError::Resolve {
                host: host.clone(),
                port,
                reason: e.to_string(),
            })?;

        let mut last_err = None;
        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some((addr, e)),
            }
        }
        Err(match last_err {
            Some((addr, source)) => TransportError::Connect { addr: addr.to_string(), source },
            None => TransportError::Resolve {
                host,
                port,
                reason: "no addresses found".to_owned(),
            },
        })
    }

    fn connect_addr(&self, addr: SocketAddr) -> Result<TcpStream, std::io::Error> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.set_read_timeout(self.options.io_timeout)?;
        socket.set_write_timeout(self.options.io_timeout)?;
        match self.options.io_timeout {
            Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
            None => socket.connect(&addr.into())?,
        }
        Ok(socket.into())
    }
}

fn host_header(origin: &Url) -> String {
    let host = origin.host_str().unwrap_or_default();
    match origin.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_owned(),
    }
}
