use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use crate::catalog::Deployment;
use crate::error::ConfigError;
use crate::request::RequestSpec;
use crate::transport::Client;

/// Endpoint layouts seen across server deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Profile {
    /// `/hello` only, names up to 100 characters.
    Basic,
    /// Namespaced string, math and static endpoints, names up to 500 characters.
    Full,
}

/// Scheme, host and port of the server under test. Parsed once, then only cloned.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseAddress {
    uri: Url,
}

impl BaseAddress {
    pub fn parse(raw: &str) -> Result<BaseAddress, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        let mut uri = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;
        if uri.scheme() != "http" && uri.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(uri.scheme().to_owned()));
        }
        if uri.host_str().map(|h| h.is_empty()).unwrap_or(true) {
            return Err(ConfigError::MissingHost(raw.to_owned()));
        }
        // only scheme + host + port are kept
        uri.set_path("/");
        uri.set_query(None);
        uri.set_fragment(None);
        Ok(BaseAddress { uri })
    }

    /// An independent copy; callers may change it freely.
    pub fn uri(&self) -> Url {
        self.uri.clone()
    }
}

/// Everything a check needs. Built once at startup and shared by reference.
pub struct Harness {
    pub base: BaseAddress,
    pub client: Client,
    pub deployment: Deployment,
    pub fixtures: PathBuf,
    /// Lower bound for the deferred greeting's response time.
    pub min_async_delay: Duration,
    /// Invalid paths must answer exactly 404 instead of any 4xx.
    pub strict_status: bool,
}

impl Harness {
    pub fn request(&self, path: &str) -> RequestSpec {
        RequestSpec::new(&self.base).path(path)
    }
}
