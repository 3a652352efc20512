// Canned HTTP responses and an in-process server for the tests. Note that rust
// always uses newlines in their strings, regardless of the files actual line
// endings. To ensure "proper" CRLF line endings, we must manually add a \r.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use socket2::{Domain, Protocol, Socket, Type};
use tempfile::TempDir;

use crate::catalog::Deployment;
use crate::config::{BaseAddress, Harness, Profile};
use crate::encoding::{encode, AcceptEncoding, ContentCoding};
use crate::fixtures::mimetype;
use crate::transport::stream::Stream;
use crate::transport::{Client, ClientOptions};

pub const HTTP_RES_HELLO: &str = "HTTP/1.1 200 OK\r
Content-Type: text/plain\r
Content-Length: 13\r
\r
Hello, world!";
pub const HTTP_RES_CHUNKED: &str = "HTTP/1.1 200 OK\r
Transfer-Encoding: chunked\r
\r
7\r
Hello, \r
6\r
world!\r
0\r
\r
";
pub const HTTP_RES_NO_LENGTH: &str = "HTTP/1.1 200 OK\r
Content-Type: text/plain\r
\r
until the end";
pub const HTTP_RES_INTERIM_THEN_OK: &str = "HTTP/1.1 100 Continue\r
\r
HTTP/1.1 200 OK\r
Content-Length: 2\r
\r
ok";
pub const HTTP_RES_REDIRECT: &str = "HTTP/1.1 301 Moved Permanently\r
Location: /static/\r
Content-Length: 0\r
\r
";

/// The four item listing exactly as a conforming server renders it.
pub const LINES_4: &str = "<ol>
  <li>Item number: 1</li>
  <li>Item number: 2</li>
  <li>Item number: 3</li>
  <li>Item number: 4</li>
</ol>";

/// Listings with at least this many items are served without item indentation.
const LONG_LISTING: usize = 100;

/// Bodies shorter than this are left uncompressed by the mock server.
const COMPRESS_MIN_LEN: usize = 200;

pub fn create_server_socket() -> (TcpListener, SocketAddr) {
    let server_addr = "127.0.0.1:0".parse::<SocketAddr>().unwrap();
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
    socket.set_reuse_address(true).unwrap();
    socket.bind(&server_addr.into()).unwrap();
    socket.listen(128).unwrap();
    let server_addr_real = socket.local_addr().unwrap().as_socket().unwrap();
    (socket.into(), server_addr_real)
}

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub raw_head: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub accept_encoding: Option<AcceptEncoding>,
}

impl MockRequest {
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn text(status: u16, body: &str) -> Reply {
        Reply {
            status,
            headers: vec![("Content-Type".to_owned(), "text/plain".to_owned())],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn redirect(status: u16, location: &str) -> Reply {
        Reply {
            status,
            headers: vec![("Location".to_owned(), location.to_owned())],
            body: vec![],
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Reply {
        self.headers.retain(|(k, _)| k != "Content-Type");
        self.headers.push(("Content-Type".to_owned(), content_type.to_owned()));
        self
    }

    fn content_type(&self) -> &str {
        self.headers
            .iter()
            .find(|(k, _)| k == "Content-Type")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    fn compressed(mut self, coding: ContentCoding) -> Reply {
        self.body = encode(coding, &self.body);
        self.headers.push(("Content-Encoding".to_owned(), coding.token().to_owned()));
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let reason = match self.status {
            200 => "OK",
            301 => "Moved Permanently",
            302 => "Found",
            307 => "Temporary Redirect",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            _ => "Whatever",
        };
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", self.body.len()));
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Knobs for making the conforming mock misbehave in one specific way.
#[derive(Debug, Clone)]
pub struct ServerBehavior {
    pub invalid_status: u16,
    /// Always use this coding when compressing, whether the client listed it or not.
    pub coding: Option<ContentCoding>,
    pub enforce_name_limit: bool,
    pub async_delay_ms: u64,
    pub compress_series: bool,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        ServerBehavior {
            invalid_status: 404,
            coding: None,
            enforce_name_limit: true,
            async_delay_ms: 20,
            compress_series: false,
        }
    }
}

/// Serves one request per connection on a background thread until dropped.
pub struct MockServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl MockServer {
    pub fn start<F>(handler: F) -> MockServer
    where
        F: Fn(&MockRequest) -> Reply + Send + Sync + 'static,
    {
        let (listener, addr) = create_server_socket();
        let handler = Arc::new(handler);
        let hits = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let (server_hits, server_stop) = (hits.clone(), stop.clone());
        thread::spawn(move || {
            for conn in listener.incoming() {
                if server_stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(sock) = conn else { continue };
                server_hits.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                thread::spawn(move || serve_connection(sock, handler.as_ref()));
            }
        });

        MockServer { addr, hits, stop }
    }

    /// A server that follows the endpoint contract of `profile`,
    /// except where `behavior` says otherwise.
    pub fn conforming(profile: Profile, behavior: ServerBehavior, fixtures: &Path) -> MockServer {
        let fixtures = fixtures.to_path_buf();
        MockServer::start(move |req| conforming_reply(profile, &behavior, &fixtures, req))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // wake up the accept loop so it sees the flag
        let _ = TcpStream::connect(self.addr);
    }
}

fn serve_connection(sock: TcpStream, handler: &(dyn Fn(&MockRequest) -> Reply + Send + Sync)) {
    let _ = sock.set_read_timeout(Some(Duration::from_secs(5)));
    let mut stream = Stream::new(sock, 64 * 1024);

    let mut lines = vec![];
    loop {
        match stream.next_line() {
            Ok(line) if line.is_empty() => break,
            Ok(line) => lines.push(line),
            Err(_) => return,
        }
    }
    let Some(target) = lines.first().and_then(|l| l.split(' ').nth(1)) else {
        return;
    };
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_owned(), q.to_owned()),
        None => (target.to_owned(), String::new()),
    };
    let accept_encoding = lines.iter().skip(1).find_map(|l| {
        let (name, value) = l.split_once(':')?;
        name.eq_ignore_ascii_case("accept-encoding")
            .then(|| AcceptEncoding::new(value.trim()))
    });

    let req = MockRequest {
        raw_head: format!("{}\r\n\r\n", lines.join("\r\n")),
        path,
        query: url::form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        accept_encoding,
    };
    let reply = handler(&req);
    let _ = stream.write_all(&reply.to_bytes());
}

fn conforming_reply(
    profile: Profile,
    behavior: &ServerBehavior,
    fixtures: &Path,
    req: &MockRequest,
) -> Reply {
    let d = Deployment::for_profile(profile);
    let text_type = match profile {
        Profile::Basic => "text/plain",
        Profile::Full => "text/plain; charset=utf-8",
    };
    let invalid = Reply::text(behavior.invalid_status, "nope");
    let path = req.path.as_str();

    if path == d.greeting_path || Some(path) == d.async_greeting_path {
        if Some(path) == d.async_greeting_path {
            thread::sleep(Duration::from_millis(behavior.async_delay_ms));
        }
        let name = req.query_value("name").unwrap_or_default();
        if behavior.enforce_name_limit && name.chars().count() > d.name_max_len {
            return Reply::text(400, "name too long");
        }
        let body = if name.is_empty() {
            "Hello, world!".to_owned()
        } else {
            format!("Hello, {}!", name)
        };
        let reply = Reply::text(200, &body).with_content_type(text_type);
        return negotiate(reply, req, behavior, false);
    }
    if Some(path) == d.lines_path {
        return match req.query_value("n").map(str::parse::<usize>) {
            Some(Ok(n)) => negotiate(
                Reply::text(200, &served_listing(n)).with_content_type(text_type),
                req,
                behavior,
                false,
            ),
            _ => Reply::text(400, "bad n"),
        };
    }
    if Some(path) == d.series_path {
        return match req.query_value("n").map(str::parse::<u32>) {
            Some(Ok(n)) => {
                let sum: f64 = (0..n).map(|i| (-0.5f64).powi(i as i32)).sum();
                let reply = Reply::text(200, &sum.to_string()).with_content_type(text_type);
                if behavior.compress_series {
                    negotiate(reply, req, behavior, true)
                } else {
                    reply
                }
            }
            _ => Reply::text(400, "bad n"),
        };
    }
    if let Some(prefix) = d.static_prefix {
        if path == prefix {
            return Reply::redirect(301, &format!("{}/", prefix));
        }
        if let Some(file) = path.strip_prefix(prefix).and_then(|p| p.strip_prefix('/')) {
            let servable = !file.is_empty() && !file.contains('/') && !file.contains("..");
            return match std::fs::read(fixtures.join(file)) {
                Ok(bytes) if servable => {
                    let reply = Reply {
                        status: 200,
                        headers: vec![],
                        body: bytes,
                    }
                    .with_content_type(mimetype(file).unwrap_or("application/octet-stream"));
                    negotiate(reply, req, behavior, false)
                }
                _ => invalid,
            };
        }
    }
    invalid
}

/// The line listing as the mock serves it. Long listings drop the item indent.
pub fn served_listing(n: usize) -> String {
    if n == 4 {
        return LINES_4.to_owned();
    }
    let indent = if n >= LONG_LISTING { "" } else { "  " };
    let items: String = (1..=n)
        .map(|i| format!("{}<li>Item number: {}</li>\n", indent, i))
        .collect();
    format!("<ol>\n{}</ol>", items)
}

/// Compresses text bodies that are long enough, preferring brotli among the advertised codings.
fn negotiate(reply: Reply, req: &MockRequest, behavior: &ServerBehavior, force: bool) -> Reply {
    let Some(accept) = &req.accept_encoding else {
        return reply;
    };
    let small = reply.body.len() < COMPRESS_MIN_LEN && !force;
    if !reply.content_type().starts_with("text/") || small {
        return reply;
    }
    let supported = accept.supported();
    let coding = behavior.coding.or_else(|| {
        supported
            .iter()
            .find(|c| **c == ContentCoding::Brotli)
            .or(supported.first())
            .copied()
    });
    match coding {
        Some(coding) => reply.compressed(coding),
        None => reply,
    }
}

/// A fixture directory holding `basic.html` and `scout.webp`.
pub fn write_fixtures() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut html = String::from("<!doctype html>\r\n<html>\r\n<body>\r\n<table>\r\n");
    for i in 0..20 {
        html.push_str(&format!("  <tr><td>row {}</td></tr>\r\n", i));
    }
    html.push_str("</table>\r\n</body>\r\n</html>\r\n");
    std::fs::write(dir.path().join("basic.html"), html).unwrap();

    let mut webp = b"RIFF\x24\x00\x00\x00WEBPVP8 ".to_vec();
    webp.extend((0..=255u8).cycle().take(600));
    std::fs::write(dir.path().join("scout.webp"), webp).unwrap();
    dir
}

pub fn harness_for(server: &MockServer, profile: Profile, fixtures: &Path) -> Harness {
    Harness {
        base: BaseAddress::parse(&server.base_url()).unwrap(),
        client: Client::new(ClientOptions {
            io_timeout: Some(Duration::from_secs(5)),
            ..ClientOptions::default()
        })
        .unwrap(),
        deployment: Deployment::for_profile(profile),
        fixtures: fixtures.to_path_buf(),
        min_async_delay: Duration::from_millis(15),
        strict_status: false,
    }
}
