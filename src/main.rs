#[macro_use]
mod log;
mod catalog;
mod config;
mod encoding;
mod error;
mod fixtures;
mod request;
mod runner;
mod transport;
mod verify;
#[cfg(test)]
mod test_data;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use clap::Parser;
use crate::catalog::{catalog, Check, Deployment};
use crate::config::{BaseAddress, Harness, Profile};
use crate::error::ConfigError;
use crate::transport::{Client, ClientOptions};

#[derive(Parser, Debug)]
#[command(about = "Black-box conformance checks for a small HTTP server", author, version = None, long_about = None)]
struct Args {
    #[arg(short, long, help = "Base URL of the server under test, e.g. http://localhost:8080")]
    base_url: String,

    #[arg(short, long, value_enum, default_value_t = Profile::Full, help = "Endpoint layout of the deployment")]
    profile: Profile,

    #[arg(long, default_value = "data", help = "Directory holding the expected static files")]
    fixtures: PathBuf,

    #[arg(long, help = "Invalid paths must answer exactly 404")]
    strict_status: bool,

    #[arg(short, long, default_value_t = 1, help = "Number of checks run concurrently")]
    jobs: usize,

    #[arg(long, default_value_t = 15, help = "Minimum response time of the deferred greeting")]
    min_async_delay_ms: u64,

    #[arg(long, default_value_t = 30000, help = "Connect, read and write timeout; 0 disables it")]
    timeout_ms: u64,

    #[arg(long, help = "Accept invalid TLS certificates")]
    insecure: bool,

    /// Only run checks whose name contains this text
    #[arg(short, long)]
    filter: Option<String>,

    #[arg(long, help = "Print the selected checks and exit")]
    list: bool,
}

fn harness(args: &Args) -> Result<Harness, ConfigError> {
    let base = BaseAddress::parse(&args.base_url)?;
    let client = Client::new(ClientOptions {
        io_timeout: (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms)),
        accept_invalid_certs: args.insecure,
        ..ClientOptions::default()
    })?;
    Ok(Harness {
        base,
        client,
        deployment: Deployment::for_profile(args.profile),
        fixtures: args.fixtures.clone(),
        min_async_delay: Duration::from_millis(args.min_async_delay_ms),
        strict_status: args.strict_status,
    })
}

fn select(checks: Vec<Check>, filter: Option<&str>) -> Vec<Check> {
    match filter {
        Some(f) => checks.into_iter().filter(|c| c.name.contains(f)).collect(),
        None => checks,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let h = match harness(&args) {
        Ok(h) => h,
        Err(e) => {
            log!(Error, "{}", e);
            return ExitCode::from(2);
        }
    };

    let checks = select(catalog(&h.deployment), args.filter.as_deref());
    if args.list {
        for c in &checks {
            println!("{}", c.name);
        }
        return ExitCode::SUCCESS;
    }
    if checks.is_empty() {
        log!(Warning, "no checks selected");
        return ExitCode::SUCCESS;
    }

    log!(
        Info,
        "running {} checks against {} ({:?} profile)",
        checks.len(),
        h.base.uri(),
        args.profile
    );
    let reports = runner::run(&h, &checks, args.jobs);
    if runner::report(&reports).all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
