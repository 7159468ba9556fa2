//! Hourly triggering with whole-run retries.

use crate::pipeline::error::PipelineError;
use crate::pipeline::{RunReport, Runner};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use log::warn;
use std::time::Duration;

/// The first top of the hour strictly after `now`.
pub fn next_top_of_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour = TimeDelta::hours(1);
    match now.duration_trunc(hour) {
        Ok(truncated) => truncated + hour,
        Err(_) => now + hour,
    }
}

/// Runs `runner` once, retrying the whole run up to `retries` more times after
/// `delay` each. `sleep` is called between attempts.
pub fn run_with_retries(
    runner: &mut Runner,
    retries: u32,
    delay: Duration,
    mut sleep: impl FnMut(Duration),
    mut clock: impl FnMut() -> DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    let mut attempt = 0;
    loop {
        match runner.run(clock()) {
            Ok(report) => return Ok(report),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    "Attempt {} failed while {}, retrying in {}s",
                    attempt,
                    e.stage(),
                    delay.as_secs()
                );
                sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::error::ArchiveError;
    use crate::archive::ArchiveStore;
    use crate::fetcher::error::FetchError;
    use crate::fetcher::ObservationSource;
    use crate::forecast::linear_trend::LinearTrend;
    use crate::pipeline::{RunState, Stage};
    use crate::report::ReportRenderer;
    use crate::types::artifact::DataFormat;
    use crate::types::observation::{Observation, ObservationWindow};
    use crate::writer::ResultWriter;
    use chrono::FixedOffset;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::rc::Rc;

    /// Fails the first `failures` fetches, then returns a three-hour window.
    struct FlakySource {
        failures: u32,
        attempts: Rc<Cell<u32>>,
    }

    impl ObservationSource for FlakySource {
        fn fetch(
            &self,
            _location: &str,
            _window_hours: usize,
            _now: DateTime<Utc>,
        ) -> Result<ObservationWindow, FetchError> {
            let attempt = self.attempts.get() + 1;
            self.attempts.set(attempt);
            if attempt <= self.failures {
                let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                return Err(FetchError::DataShape {
                    url: "http://provider.test/history.json".to_string(),
                    source,
                });
            }
            let start = DateTime::parse_from_rfc3339("2025-04-25T07:00:00-04:00").unwrap();
            let observations = [(20.0, 50.0), (21.0, 52.0), (22.0, 49.0)]
                .iter()
                .enumerate()
                .map(|(i, (t, h))| Observation::new(start + TimeDelta::hours(i as i64), *t, *h))
                .collect();
            Ok(ObservationWindow::new(observations).unwrap())
        }
    }

    #[derive(Default)]
    struct MemoryStore(RefCell<BTreeMap<String, Vec<u8>>>);

    impl ArchiveStore for MemoryStore {
        fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
            self.0.borrow_mut().insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        fn list_artifacts(&self, prefix: &str) -> Result<Vec<String>, ArchiveError> {
            Ok(self
                .0
                .borrow()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn download(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
            self.0
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| ArchiveError::Download {
                    key: key.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
        }
    }

    fn flaky_runner(failures: u32, work_dir: &Path) -> (Runner, Rc<Cell<u32>>) {
        let zone = FixedOffset::west_opt(4 * 3600).unwrap();
        let attempts = Rc::new(Cell::new(0));
        let source = FlakySource {
            failures,
            attempts: attempts.clone(),
        };
        let runner = Runner::builder()
            .source(Box::new(source))
            .forecaster(Box::new(LinearTrend))
            .store(Box::new(MemoryStore::default()))
            .writer(ResultWriter::new(DataFormat::Csv, zone))
            .renderer(ReportRenderer::new(zone, "test"))
            .location("Mount Pleasant, MI, US")
            .work_dir(work_dir.to_path_buf())
            .zone(zone)
            .build();
        (runner, attempts)
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_top_of_hour() {
        assert_eq!(
            next_top_of_hour(at("2025-04-25T14:05:31+00:00")),
            at("2025-04-25T15:00:00+00:00")
        );
        assert_eq!(
            next_top_of_hour(at("2025-04-25T14:00:00+00:00")),
            at("2025-04-25T15:00:00+00:00")
        );
        assert_eq!(
            next_top_of_hour(at("2025-04-25T23:59:59+00:00")),
            at("2025-04-26T00:00:00+00:00")
        );
    }

    #[test]
    fn test_retry_recovers_after_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, attempts) = flaky_runner(1, dir.path());
        let delay = Duration::from_secs(300);
        let mut sleeps = Vec::new();

        let report = run_with_retries(
            &mut runner,
            1,
            delay,
            |d| sleeps.push(d),
            || at("2025-04-25T14:05:00+00:00"),
        )
        .unwrap();

        assert_eq!(attempts.get(), 2);
        assert_eq!(sleeps, vec![delay]);
        assert_eq!(runner.state(), RunState::Done);
        assert!(report.forecast.predicted_temperature.is_finite());
    }

    #[test]
    fn test_retry_gives_up_after_all_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, attempts) = flaky_runner(u32::MAX, dir.path());
        let delay = Duration::from_secs(60);
        let mut sleeps = Vec::new();

        let err = run_with_retries(
            &mut runner,
            2,
            delay,
            |d| sleeps.push(d),
            || at("2025-04-25T14:05:00+00:00"),
        )
        .unwrap_err();

        assert_eq!(err.stage(), Stage::Fetching);
        assert_eq!(attempts.get(), 3);
        assert_eq!(sleeps, vec![delay, delay]);
        assert_eq!(runner.state(), RunState::Failed(Stage::Fetching));
    }

    #[test]
    fn test_no_retries_never_sleeps() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, attempts) = flaky_runner(1, dir.path());
        let mut sleeps = Vec::new();

        let result = run_with_retries(
            &mut runner,
            0,
            Duration::from_secs(300),
            |d| sleeps.push(d),
            || at("2025-04-25T14:05:00+00:00"),
        );

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
        assert!(sleeps.is_empty());
    }
}
