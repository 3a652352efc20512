use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use crate::catalog::Check;
use crate::config::Harness;
use crate::error::CheckError;
use crate::verify::Mismatch;

#[derive(Debug)]
pub enum Outcome {
    Passed,
    Failed(Vec<Mismatch>),
    /// The check could not get far enough to verify anything.
    Errored(CheckError),
}

#[derive(Debug)]
pub struct CheckReport {
    pub name: &'static str,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

fn run_one(h: &Harness, check: &Check) -> CheckReport {
    let started = Instant::now();
    let outcome = match (check.run)(h) {
        Ok(failures) if failures.is_empty() => Outcome::Passed,
        Ok(failures) => Outcome::Failed(failures),
        Err(e) => Outcome::Errored(e),
    };
    CheckReport {
        name: check.name,
        outcome,
        elapsed: started.elapsed(),
    }
}

/// Runs every check and returns the reports in catalog order.
/// With `jobs > 1` checks are spread over that many threads.
pub fn run(h: &Harness, checks: &[Check], jobs: usize) -> Vec<CheckReport> {
    if jobs <= 1 || checks.len() <= 1 {
        return checks.iter().map(|c| run_one(h, c)).collect();
    }

    let cursor = AtomicUsize::new(0);
    let mut indexed: Vec<(usize, CheckReport)> = thread::scope(|s| {
        let workers: Vec<_> = (0..jobs.min(checks.len()))
            .map(|_| {
                s.spawn(|| {
                    let mut done = vec![];
                    loop {
                        let i = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some(check) = checks.get(i) else { break };
                        done.push((i, run_one(h, check)));
                    }
                    done
                })
            })
            .collect();

        workers
            .into_iter()
            .flat_map(|w| match w.join() {
                Ok(done) => done,
                Err(_) => {
                    log!(Error, "a check worker panicked, its remaining checks are lost");
                    vec![]
                }
            })
            .collect()
    });
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}

/// Logs each report and the totals.
pub fn report(reports: &[CheckReport]) -> Summary {
    let mut summary = Summary::default();
    for r in reports {
        match &r.outcome {
            Outcome::Passed => {
                summary.passed += 1;
                log!(Pass, "{} ({} ms)", r.name, r.elapsed.as_millis());
            }
            Outcome::Failed(failures) => {
                summary.failed += 1;
                log!(Fail, "{} ({} ms)", r.name, r.elapsed.as_millis());
                for f in failures {
                    log!(Fail, "  {}", f);
                }
            }
            Outcome::Errored(e) => {
                summary.errored += 1;
                log!(Error, "{}: {}", r.name, e);
            }
        }
    }
    log!(
        Info,
        "{} passed, {} failed, {} errored",
        summary.passed,
        summary.failed,
        summary.errored
    );
    summary
}
