//! Compares a [`ResponseResult`] against what a check expects.
//!
//! Verification never stops at the first problem. Every independent
//! deviation is returned so a single check can report all of them.

use std::fmt;
use std::time::Duration;
use crate::encoding::{AcceptEncoding, ContentCoding};
use crate::transport::response::ResponseResult;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusExpectation {
    Exactly(u16),
    /// Anything in 400..=499.
    ClientError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentTypeExpectation {
    Unchecked,
    Exactly(String),
    /// For servers that may or may not append a charset.
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyExpectation {
    Unchecked,
    Text(String),
    Bytes(Vec<u8>),
    /// A decimal numeral within `expected ± tolerance`, bounds included.
    Number { expected: f64, tolerance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodingExpectation {
    /// Decode whatever the server declares, without judging the choice.
    Unchecked,
    /// No Content-Encoding header at all.
    Identity,
    /// The server must pick exactly this coding.
    Exactly(ContentCoding),
    /// Either no coding, or one the client listed and the harness can decode.
    AnyOf(AcceptEncoding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedOutcome {
    pub status: StatusExpectation,
    pub content_type: ContentTypeExpectation,
    pub body: BodyExpectation,
    pub encoding: EncodingExpectation,
}

impl ExpectedOutcome {
    pub fn status(status: StatusExpectation) -> ExpectedOutcome {
        ExpectedOutcome {
            status,
            content_type: ContentTypeExpectation::Unchecked,
            body: BodyExpectation::Unchecked,
            encoding: EncodingExpectation::Unchecked,
        }
    }

    pub fn ok() -> ExpectedOutcome {
        ExpectedOutcome::status(StatusExpectation::Exactly(200))
    }

    pub fn content_type(mut self, content_type: ContentTypeExpectation) -> ExpectedOutcome {
        self.content_type = content_type;
        self
    }

    pub fn text(mut self, body: &str) -> ExpectedOutcome {
        self.body = BodyExpectation::Text(body.to_owned());
        self
    }

    pub fn bytes(mut self, body: Vec<u8>) -> ExpectedOutcome {
        self.body = BodyExpectation::Bytes(body);
        self
    }

    pub fn number(mut self, expected: f64, tolerance: f64) -> ExpectedOutcome {
        self.body = BodyExpectation::Number { expected, tolerance };
        self
    }

    pub fn encoding(mut self, encoding: EncodingExpectation) -> ExpectedOutcome {
        self.encoding = encoding;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    Status,
    ContentType,
    ContentEncoding,
    Body,
    Elapsed,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Status => "status code",
            Field::ContentType => "content type",
            Field::ContentEncoding => "content encoding",
            Field::Body => "body",
            Field::Elapsed => "response time",
        })
    }
}

/// One assertion that did not hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub field: Field,
    pub expected: String,
    pub actual: String,
    /// Which request of a check this came from, when a check issues several.
    pub context: Option<String>,
}

impl Mismatch {
    pub fn new(field: Field, expected: impl Into<String>, actual: impl Into<String>) -> Mismatch {
        Mismatch {
            field,
            expected: expected.into(),
            actual: actual.into(),
            context: None,
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Mismatch {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: ", context)?;
        }
        write!(f, "invalid {}; want: {}, got: {}", self.field, self.expected, self.actual)
    }
}

pub fn verify(got: &ResponseResult, want: &ExpectedOutcome) -> Vec<Mismatch> {
    let mut failures = vec![];

    if let Some(m) = verify_status(got.status, &want.status) {
        failures.push(m);
    }
    if let Some(m) = verify_content_type(got.content_type(), &want.content_type) {
        failures.push(m);
    }
    if let Some(m) = verify_encoding(got.content_encoding(), &want.encoding) {
        failures.push(m);
    }

    if want.body != BodyExpectation::Unchecked {
        match decoded_body(got) {
            Ok(body) => {
                if let Some(m) = verify_body(&body, &want.body) {
                    failures.push(m);
                }
            }
            Err(m) => failures.push(m),
        }
    }

    failures
}

/// The response must not have arrived sooner than `min`.
pub fn verify_min_elapsed(got: &ResponseResult, min: Duration) -> Option<Mismatch> {
    (got.elapsed < min).then(|| {
        Mismatch::new(
            Field::Elapsed,
            format!("at least {:?}", min),
            format!("{:?}", got.elapsed),
        )
    })
}

fn verify_status(got: u16, want: &StatusExpectation) -> Option<Mismatch> {
    match want {
        StatusExpectation::Exactly(code) if got != *code => {
            Some(Mismatch::new(Field::Status, code.to_string(), got.to_string()))
        }
        StatusExpectation::ClientError if !(400..=499).contains(&got) => {
            Some(Mismatch::new(Field::Status, "4xx", got.to_string()))
        }
        _ => None,
    }
}

fn verify_content_type(got: Option<&str>, want: &ContentTypeExpectation) -> Option<Mismatch> {
    let actual = got.unwrap_or("<none>");
    match want {
        ContentTypeExpectation::Unchecked => None,
        ContentTypeExpectation::Exactly(t) => {
            (got != Some(t.as_str())).then(|| Mismatch::new(Field::ContentType, t.as_str(), actual))
        }
        ContentTypeExpectation::Prefix(t) => {
            let matches = got.map(|g| g.starts_with(t.as_str())).unwrap_or(false);
            (!matches).then(|| Mismatch::new(Field::ContentType, format!("prefix {}", t), actual))
        }
    }
}

fn verify_encoding(got: Option<&str>, want: &EncodingExpectation) -> Option<Mismatch> {
    let actual = got.unwrap_or("<none>");
    match want {
        EncodingExpectation::Unchecked => None,
        EncodingExpectation::Identity => {
            got.map(|g| Mismatch::new(Field::ContentEncoding, "<none>", g))
        }
        EncodingExpectation::Exactly(coding) => {
            let chosen = got.and_then(ContentCoding::from_token);
            (chosen != Some(*coding))
                .then(|| Mismatch::new(Field::ContentEncoding, coding.token(), actual))
        }
        EncodingExpectation::AnyOf(accept) => match got {
            // uncompressed is always acceptable, small bodies often are not worth it
            None => None,
            Some(g) => {
                let allowed = ContentCoding::from_token(g)
                    .map(|c| accept.allows(c))
                    .unwrap_or(false);
                (!allowed).then(|| {
                    Mismatch::new(
                        Field::ContentEncoding,
                        format!("<none> or one of [{}]", accept.as_str()),
                        g,
                    )
                })
            }
        },
    }
}

/// The body as the server meant it, with any declared content coding removed.
fn decoded_body(got: &ResponseResult) -> Result<Vec<u8>, Mismatch> {
    let declared = match got.content_encoding() {
        None => return Ok(got.body.clone()),
        Some(d) => d,
    };
    let coding = ContentCoding::from_token(declared).ok_or_else(|| {
        Mismatch::new(Field::Body, "a decodable body", format!("unknown coding '{}'", declared))
    })?;
    coding.decode(&got.body).map_err(|e| {
        Mismatch::new(
            Field::Body,
            format!("valid {} data", coding),
            format!("failed to uncompress: {}", e),
        )
    })
}

fn verify_body(got: &[u8], want: &BodyExpectation) -> Option<Mismatch> {
    match want {
        BodyExpectation::Unchecked => None,
        BodyExpectation::Text(text) => (got != text.as_bytes())
            .then(|| Mismatch::new(Field::Body, text.as_str(), String::from_utf8_lossy(got))),
        BodyExpectation::Bytes(bytes) => (got != bytes.as_slice()).then(|| {
            let first_diff = got
                .iter()
                .zip(bytes.iter())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| got.len().min(bytes.len()));
            Mismatch::new(
                Field::Body,
                format!("{} bytes", bytes.len()),
                format!("{} bytes, first difference at offset {}", got.len(), first_diff),
            )
        }),
        BodyExpectation::Number { expected, tolerance } => {
            let (low, high) = (expected - tolerance, expected + tolerance);
            let text = String::from_utf8_lossy(got);
            match text.parse::<f64>() {
                Ok(n) if (low..=high).contains(&n) => None,
                Ok(n) => Some(Mismatch::new(
                    Field::Body,
                    format!("a number between {:.3} and {:.3}", low, high),
                    format!("{:.3}", n),
                )),
                Err(_) => Some(Mismatch::new(Field::Body, "a decimal number", text)),
            }
        }
    }
}
