use std::io::Read;
use std::time::Duration;
use crate::error::TransportError;
use super::stream::Stream;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// What came back for one request. Owned by the check that issued it.
#[derive(Debug, Clone)]
pub struct ResponseResult {
    pub status: u16,
    pub headers: Vec<HttpHeader>,
    /// Raw body, still encoded if the server declared a content coding.
    pub body: Vec<u8>,
    /// Url of the request that produced this response, after any redirects.
    pub url: String,
    pub elapsed: Duration,
}

impl ResponseResult {
    /// Header names are stored lowercased.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding").filter(|v| !v.is_empty())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }
}

/// Status line and headers, before the body is read.
#[derive(Debug, PartialEq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<HttpHeader>,
}

impl ResponseHead {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    fn content_length(&self) -> Result<Option<usize>, TransportError> {
        match self.header("content-length") {
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| {
                    TransportError::MalformedResponse(format!("bad content-length '{}'", v))
                }),
            None => Ok(None),
        }
    }

    fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// 1xx, 204 and 304 never carry a body.
    fn has_body(&self) -> bool {
        !(self.status < 200 || self.status == 204 || self.status == 304)
    }
}

fn parse_status_line(line: &str) -> Result<u16, TransportError> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") => code
            .parse::<u16>()
            .ok()
            .filter(|c| (100..1000).contains(c))
            .ok_or_else(|| {
                TransportError::MalformedResponse(format!("bad status line '{}'", line))
            }),
        _ => Err(TransportError::MalformedResponse(format!("bad status line '{}'", line))),
    }
}

fn parse_header(line: &str) -> Result<HttpHeader, TransportError> {
    match line.find(':') {
        Some(idx) => Ok(HttpHeader {
            name: line[0..idx].trim().to_ascii_lowercase(),
            value: line[idx + 1..].trim().to_owned(),
        }),
        None => Err(TransportError::MalformedResponse(format!("bad header line '{}'", line))),
    }
}

/// Reads the status line and all headers. Interim 1xx responses are skipped.
pub fn read_head(stream: &mut Stream) -> Result<ResponseHead, TransportError> {
    loop {
        let status = parse_status_line(&stream.next_line()?)?;
        let mut headers = vec![];
        loop {
            let line = stream.next_line()?;
            // empty line indicates we've finished processing the head
            if line.is_empty() {
                break;
            }
            headers.push(parse_header(&line)?);
        }
        if (100..200).contains(&status) && status != 101 {
            continue;
        }
        return Ok(ResponseHead { status, headers });
    }
}

/// Reads the body framed by chunked encoding, content-length or connection close.
pub fn read_body(stream: &mut Stream, head: &ResponseHead) -> Result<Vec<u8>, TransportError> {
    if !head.has_body() {
        return Ok(vec![]);
    }
    if head.is_chunked() {
        let mut body = vec![];
        chunked_transfer::Decoder::new(stream)
            .read_to_end(&mut body)
            .map_err(|e| TransportError::MalformedResponse(format!("bad chunked body: {}", e)))?;
        return Ok(body);
    }
    match head.content_length()? {
        Some(len) => Ok(stream.next_bytes(len)?),
        None => Ok(stream.read_to_close()?),
    }
}
