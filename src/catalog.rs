//! The checks run against the server under test.
//!
//! Every check composes its own requests from the shared [`Harness`],
//! so checks can run in any order and on any thread.

use crate::config::{Harness, Profile};
use crate::encoding::{AcceptEncoding, ContentCoding};
use crate::error::CheckError;
use crate::fixtures::{load_fixture, mimetype};
use crate::request::{boundary_values, RequestSpec};
use crate::transport::response::ResponseResult;
use crate::verify::{
    verify, verify_min_elapsed, ContentTypeExpectation, EncodingExpectation, ExpectedOutcome,
    Mismatch, StatusExpectation,
};

pub type CheckResult = Result<Vec<Mismatch>, CheckError>;

#[derive(Clone, Copy)]
pub struct Check {
    pub name: &'static str,
    pub run: fn(&Harness) -> CheckResult,
}

/// Redirect hops followed when probing paths that should not exist.
pub const MAX_REDIRECTS: usize = 2;

/// The coding servers are expected to pick from a list like `unknown, br`.
pub const PINNED_CODING: ContentCoding = ContentCoding::Brotli;

pub const NUMERIC_TOLERANCE: f64 = 0.001;

const DEFAULT_GREETING: &str = "Hello, world!";
const LONG_LINES: usize = 100;

const INVALID_PATHS: [&str; 6] = [
    "/",
    "/thing",
    "/static",
    "/static/",
    "/static/no-file-here",
    "/static/../main.go",
];

const POWER_RECIPROCALS_ALT: [(u32, f64); 3] = [(0, 0.0), (1, 1.0), (100, 0.666)];

/// Endpoint layout and limits of one kind of server deployment.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub profile: Profile,
    pub greeting_path: &'static str,
    pub async_greeting_path: Option<&'static str>,
    pub lines_path: Option<&'static str>,
    pub series_path: Option<&'static str>,
    pub static_prefix: Option<&'static str>,
    pub name_max_len: usize,
    pub text_type: ContentTypeExpectation,
    /// Accept-Encoding sent by the compression checks.
    pub compression_probe: AcceptEncoding,
    /// Require [`PINNED_CODING`] instead of accepting any advertised coding or none.
    pub pin_coding: bool,
}

impl Deployment {
    pub fn for_profile(profile: Profile) -> Deployment {
        match profile {
            Profile::Basic => Deployment {
                profile,
                greeting_path: "/hello",
                async_greeting_path: None,
                lines_path: None,
                series_path: None,
                static_prefix: None,
                name_max_len: 100,
                text_type: ContentTypeExpectation::Exactly("text/plain".to_owned()),
                compression_probe: AcceptEncoding::new("gzip, br"),
                pin_coding: false,
            },
            Profile::Full => Deployment {
                profile,
                greeting_path: "/strings/hello",
                async_greeting_path: Some("/strings/async-hello"),
                lines_path: Some("/strings/lines"),
                series_path: Some("/math/power-reciprocals-alt"),
                static_prefix: Some("/static"),
                name_max_len: 500,
                text_type: ContentTypeExpectation::Prefix("text/plain; charset=utf-8".to_owned()),
                compression_probe: AcceptEncoding::new("unknown, br"),
                pin_coding: true,
            },
        }
    }

    fn compression(&self) -> EncodingExpectation {
        if self.pin_coding {
            EncodingExpectation::Exactly(PINNED_CODING)
        } else {
            EncodingExpectation::AnyOf(self.compression_probe.clone())
        }
    }
}

/// Checks that apply to the deployment, in reporting order.
pub fn catalog(deployment: &Deployment) -> Vec<Check> {
    let mut checks = vec![
        Check { name: "hello", run: hello },
        Check { name: "hello-with-name", run: hello_with_name },
        Check { name: "hello-with-empty-name", run: hello_with_empty_name },
        Check { name: "hello-name-max-length", run: hello_name_max_length },
        Check { name: "hello-compression", run: hello_compression },
    ];
    if deployment.async_greeting_path.is_some() {
        checks.push(Check { name: "async-hello", run: async_hello });
    }
    if deployment.lines_path.is_some() {
        checks.extend([
            Check { name: "lines", run: lines },
            Check { name: "lines-idempotent", run: lines_idempotent },
            Check {
                name: "lines-long-response-is-compressed",
                run: lines_long_response_is_compressed,
            },
            Check { name: "lines-compressed-matches-plain", run: lines_compressed_matches_plain },
        ]);
    }
    if deployment.static_prefix.is_some() {
        checks.extend([
            Check { name: "invalid-paths", run: invalid_paths },
            Check { name: "static-basic", run: static_basic },
            Check { name: "static-basic-compressed", run: static_basic_compressed },
            Check { name: "static-image", run: static_image },
        ]);
    }
    if deployment.series_path.is_some() {
        checks.extend([
            Check { name: "power-reciprocals-alt", run: power_reciprocals_alt },
            Check {
                name: "power-reciprocals-alt-is-not-compressed",
                run: power_reciprocals_alt_is_not_compressed,
            },
        ]);
    }
    checks
}

/// Expected body of the line listing for `n` items, with indented items.
pub fn lines_body(n: usize) -> String {
    list_items(n, "  ")
}

/// Expected body of the long line listing, where items are not indented.
pub fn lines_body_compact(n: usize) -> String {
    list_items(n, "")
}

fn list_items(n: usize, indent: &str) -> String {
    let mut body = String::from("<ol>\n");
    for i in 1..=n {
        body.push_str(&format!("{}<li>Item number: {}</li>\n", indent, i));
    }
    body.push_str("</ol>");
    body
}

fn execute(h: &Harness, req: &RequestSpec) -> Result<ResponseResult, CheckError> {
    h.client.execute(req).map_err(|source| CheckError::Transport {
        url: req.url_string(),
        source,
    })
}

fn execute_with_redirects(h: &Harness, req: &RequestSpec) -> Result<ResponseResult, CheckError> {
    h.client
        .execute_with_redirects(req, MAX_REDIRECTS)
        .map_err(|source| CheckError::Transport {
            url: req.url_string(),
            source,
        })
}

fn with_context(failures: Vec<Mismatch>, context: &str) -> Vec<Mismatch> {
    failures.into_iter().map(|m| m.context(context)).collect()
}

fn uncompressed_text(h: &Harness, body: &str) -> ExpectedOutcome {
    ExpectedOutcome::ok()
        .content_type(h.deployment.text_type.clone())
        .text(body)
        .encoding(EncodingExpectation::Identity)
}

fn path_of(optional: Option<&'static str>) -> &'static str {
    optional.unwrap_or("/")
}

fn static_path(h: &Harness, file: &str) -> String {
    format!("{}/{}", path_of(h.deployment.static_prefix), file)
}

fn hello(h: &Harness) -> CheckResult {
    let res = execute(h, &h.request(h.deployment.greeting_path))?;
    Ok(verify(&res, &uncompressed_text(h, DEFAULT_GREETING)))
}

fn hello_with_name(h: &Harness) -> CheckResult {
    let req = h
        .request(h.deployment.greeting_path)
        .query("name", "some COOL guy");
    let res = execute(h, &req)?;
    Ok(verify(&res, &uncompressed_text(h, "Hello, some COOL guy!")))
}

fn hello_with_empty_name(h: &Harness) -> CheckResult {
    let req = h.request(h.deployment.greeting_path).query("name", "");
    let res = execute(h, &req)?;
    Ok(verify(&res, &uncompressed_text(h, DEFAULT_GREETING)))
}

fn hello_name_max_length(h: &Harness) -> CheckResult {
    let path = h.deployment.greeting_path;
    let (at_limit, over_limit) = boundary_values(h.deployment.name_max_len, 'a');

    // Max length should succeed.
    let mut req = h.request(path).query("name", &at_limit);
    let res = execute(h, &req)?;
    let mut failures = with_context(
        verify(&res, &uncompressed_text(h, &format!("Hello, {}!", at_limit))),
        "max length name",
    );

    // Too long should fail.
    req.reset();
    req.set_path(path);
    req.add_query("name", &over_limit);
    let res = execute(h, &req)?;
    failures.extend(with_context(
        verify(&res, &ExpectedOutcome::status(StatusExpectation::Exactly(400))),
        "name too long",
    ));
    Ok(failures)
}

fn hello_compression(h: &Harness) -> CheckResult {
    let mut req = h
        .request(h.deployment.greeting_path)
        .accept_encoding(&h.deployment.compression_probe);
    let mut want = String::from(DEFAULT_GREETING);
    if h.deployment.pin_coding {
        // some frameworks don't compress small responses
        let (name, _) = boundary_values(h.deployment.name_max_len, 'a');
        req.set_query("name", &name);
        want = format!("Hello, {}!", name);
    }
    let res = execute(h, &req)?;
    Ok(verify(
        &res,
        &ExpectedOutcome::ok()
            .content_type(h.deployment.text_type.clone())
            .text(&want)
            .encoding(h.deployment.compression()),
    ))
}

fn async_hello(h: &Harness) -> CheckResult {
    let res = execute(h, &h.request(path_of(h.deployment.async_greeting_path)))?;
    let mut failures = verify(&res, &uncompressed_text(h, DEFAULT_GREETING));
    failures.extend(verify_min_elapsed(&res, h.min_async_delay));
    Ok(failures)
}

fn lines(h: &Harness) -> CheckResult {
    let mut failures = vec![];
    for n in [0, 1, 4] {
        let req = h
            .request(path_of(h.deployment.lines_path))
            .query("n", &n.to_string());
        let res = execute(h, &req)?;
        failures.extend(with_context(
            verify(&res, &uncompressed_text(h, &lines_body(n))),
            &format!("n={}", n),
        ));
    }
    Ok(failures)
}

fn lines_idempotent(h: &Harness) -> CheckResult {
    let req = h.request(path_of(h.deployment.lines_path)).query("n", "7");
    let first = execute(h, &req)?;
    let second = execute(h, &req)?;

    let mut failures = with_context(verify(&first, &uncompressed_text(h, &lines_body(7))), "first");
    failures.extend(with_context(
        verify(&second, &ExpectedOutcome::ok().bytes(first.body.clone())),
        "second compared to first",
    ));
    Ok(failures)
}

fn lines_long_response_is_compressed(h: &Harness) -> CheckResult {
    let req = h
        .request(path_of(h.deployment.lines_path))
        .query("n", &LONG_LINES.to_string())
        .accept_encoding(&h.deployment.compression_probe);
    let res = execute(h, &req)?;
    Ok(verify(
        &res,
        &ExpectedOutcome::ok()
            .content_type(h.deployment.text_type.clone())
            .text(&lines_body_compact(LONG_LINES))
            .encoding(h.deployment.compression()),
    ))
}

/// A decoded compressed body must equal the same resource fetched uncompressed.
fn lines_compressed_matches_plain(h: &Harness) -> CheckResult {
    let plain_req = h
        .request(path_of(h.deployment.lines_path))
        .query("n", &LONG_LINES.to_string());
    let compressed_req = plain_req
        .clone()
        .accept_encoding(&h.deployment.compression_probe);

    let plain = execute(h, &plain_req)?;
    let mut failures = with_context(
        verify(
            &plain,
            &ExpectedOutcome::ok().encoding(EncodingExpectation::Identity),
        ),
        "uncompressed",
    );
    let compressed = execute(h, &compressed_req)?;
    failures.extend(with_context(
        verify(
            &compressed,
            &ExpectedOutcome::ok()
                .bytes(plain.body.clone())
                .encoding(h.deployment.compression()),
        ),
        "compressed",
    ));
    Ok(failures)
}

fn invalid_paths(h: &Harness) -> CheckResult {
    // Exact 404 versus any 4xx reflects how different routers answer, e.g. with a redirect first.
    let status = if h.strict_status {
        StatusExpectation::Exactly(404)
    } else {
        StatusExpectation::ClientError
    };
    let mut failures = vec![];
    for path in INVALID_PATHS {
        let req = h.request(path);
        let res = execute_with_redirects(h, &req)?;
        failures.extend(with_context(
            verify(&res, &ExpectedOutcome::status(status.clone())),
            &req.url_string(),
        ));
    }
    Ok(failures)
}

fn static_outcome(h: &Harness, file: &str) -> Result<ExpectedOutcome, CheckError> {
    let expected = load_fixture(&h.fixtures, file)?;
    let content_type = mimetype(file).unwrap_or("application/octet-stream");
    Ok(ExpectedOutcome::ok()
        .content_type(ContentTypeExpectation::Prefix(content_type.to_owned()))
        .bytes(expected))
}

fn static_basic(h: &Harness) -> CheckResult {
    let want = static_outcome(h, "basic.html")?.encoding(EncodingExpectation::Identity);
    let res = execute(h, &h.request(&static_path(h, "basic.html")))?;
    Ok(verify(&res, &want))
}

fn static_basic_compressed(h: &Harness) -> CheckResult {
    let want = static_outcome(h, "basic.html")?.encoding(h.deployment.compression());
    let req = h
        .request(&static_path(h, "basic.html"))
        .accept_encoding(&h.deployment.compression_probe);
    let res = execute(h, &req)?;
    Ok(verify(&res, &want))
}

fn static_image(h: &Harness) -> CheckResult {
    // already compressed formats are usually sent as they are
    let want = static_outcome(h, "scout.webp")?
        .encoding(EncodingExpectation::AnyOf(h.deployment.compression_probe.clone()));
    let req = h
        .request(&static_path(h, "scout.webp"))
        .accept_encoding(&h.deployment.compression_probe);
    let res = execute(h, &req)?;
    Ok(verify(&res, &want))
}

fn power_reciprocals_alt(h: &Harness) -> CheckResult {
    let mut failures = vec![];
    for (n, want) in POWER_RECIPROCALS_ALT {
        let req = h
            .request(path_of(h.deployment.series_path))
            .query("n", &n.to_string());
        let res = execute(h, &req)?;
        failures.extend(with_context(
            verify(
                &res,
                &ExpectedOutcome::ok()
                    .content_type(h.deployment.text_type.clone())
                    .number(want, NUMERIC_TOLERANCE),
            ),
            &format!("n={}", n),
        ));
    }
    Ok(failures)
}

fn power_reciprocals_alt_is_not_compressed(h: &Harness) -> CheckResult {
    let req = h
        .request(path_of(h.deployment.series_path))
        .query("n", "100")
        .accept_encoding(&AcceptEncoding::new("br, gzip"));
    let res = execute(h, &req)?;
    Ok(verify(
        &res,
        &ExpectedOutcome::ok()
            .content_type(h.deployment.text_type.clone())
            .number(0.666, NUMERIC_TOLERANCE)
            .encoding(EncodingExpectation::Identity),
    ))
}
