use url::Url;
use crate::config::BaseAddress;
use crate::encoding::AcceptEncoding;

/// A request to be issued against the server under test.
///
/// The path is kept verbatim. Nothing here removes dot segments or
/// re-encodes it, so traversal attempts reach the server as written.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    origin: Url,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(base: &BaseAddress) -> RequestSpec {
        RequestSpec {
            origin: base.uri(),
            path: String::from("/"),
            query: vec![],
            headers: vec![],
        }
    }

    pub fn path(mut self, path: &str) -> RequestSpec {
        self.set_path(path);
        self
    }

    /// Appends a query value. The same key given twice is sent twice.
    pub fn query(mut self, name: &str, value: &str) -> RequestSpec {
        self.add_query(name, value);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> RequestSpec {
        self.set_header(name, value);
        self
    }

    pub fn accept_encoding(self, accept: &AcceptEncoding) -> RequestSpec {
        self.header("Accept-Encoding", accept.as_str())
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_owned();
    }

    pub fn add_query(&mut self, name: &str, value: &str) {
        self.query.push((name.to_owned(), value.to_owned()));
    }

    /// Replaces every value of `name` with a single one, keeping its position.
    pub fn set_query(&mut self, name: &str, value: &str) {
        match self.query.iter().position(|(k, _)| k == name) {
            Some(first) => {
                self.query[first].1 = value.to_owned();
                let mut idx = 0;
                self.query.retain(|(k, _)| {
                    idx += 1;
                    idx - 1 == first || k != name
                });
            }
            None => self.add_query(name, value),
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Clears path, query and headers so the request can be rebuilt from scratch.
    pub fn reset(&mut self) {
        self.path = String::from("/");
        self.query.clear();
        self.headers.clear();
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Origin-form request target: the verbatim path plus the encoded query.
    pub fn target(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        if self.query.is_empty() {
            return path.to_owned();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{}", path, query)
    }

    /// Full url for reports.
    pub fn url_string(&self) -> String {
        format!("{}{}", origin_prefix(&self.origin), self.target())
    }
}

/// `scheme://host[:port]` without a trailing slash.
pub fn origin_prefix(url: &Url) -> String {
    let mut prefix = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        prefix.push_str(&format!(":{}", port));
    }
    prefix
}

/// Values of length exactly `max_len` and `max_len + 1`, for probing an input size limit.
pub fn boundary_values(max_len: usize, fill: char) -> (String, String) {
    let at_limit = fill.to_string().repeat(max_len);
    let over_limit = format!("{}{}", at_limit, fill);
    (at_limit, over_limit)
}
