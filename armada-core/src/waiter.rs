//! Generic state waiter for eventually-consistent remote resources.
//!
//! Remote control planes accept create/delete requests immediately but move
//! the resource through named transitional states before it is usable or
//! fully removed. [`WaitSpec`] polls a caller-supplied refresh function on a
//! fixed interval and classifies each observed status label as pending,
//! target, or failure. Unrecognized labels keep the wait polling until the
//! timeout; they never resolve the wait.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Default delay between two status probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One observation from the status source.
#[derive(Debug, Clone)]
pub struct Probe<T> {
    /// Most recent view of the resource, if the source returned one.
    pub value: Option<T>,
    /// Status label, matched against the wait's pending/target/failure sets.
    pub status: String,
    /// Diagnostic detail attached by the refresh function, surfaced when
    /// the status is classified as a failure.
    pub detail: Option<String>,
}

impl<T> Probe<T> {
    pub fn new(value: impl Into<Option<T>>, status: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status: status.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Ways a wait can end without reaching a target state.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Time bound exceeded before a target or failure status was observed.
    #[error("timed out after {timeout:?} waiting for target state (last status: {last_status:?})")]
    Timeout {
        last_status: Option<String>,
        /// Debug rendering of the last observed value, for diagnostics.
        last_value: Option<String>,
        timeout: Duration,
    },

    /// The resource reported a terminal failure status.
    #[error("resource entered failure state {status:?}: {}", detail.as_deref().unwrap_or("no detail"))]
    StatusFailure {
        status: String,
        detail: Option<String>,
        /// Debug rendering of the value observed with the failure status.
        value: Option<String>,
    },

    /// The refresh function could not determine the current status. Probe
    /// errors are not retried here; retry policy belongs inside the
    /// refresh function.
    #[error("status probe failed: {0}")]
    Probe(anyhow::Error),

    #[error("wait spec has no target states")]
    EmptyTarget,

    #[error("wait spec pending and target sets overlap on {0:?}")]
    OverlappingSets(String),
}

/// Configuration for one wait: status vocabularies, a time bound, and the
/// refresh function performing one status probe.
///
/// Pending and target sets must be disjoint and the target set non-empty.
/// The failure set is supplied per call site; different resource kinds use
/// different vocabularies for terminal failure.
pub struct WaitSpec<F> {
    /// Labels the resource is expected to pass through. May be empty.
    pub pending: Vec<String>,
    /// Labels that resolve the wait successfully.
    pub target: Vec<String>,
    /// Labels that terminate the wait with [`WaitError::StatusFailure`].
    pub failure: Vec<String>,
    /// Maximum total duration of the wait.
    pub timeout: Duration,
    /// Delay between two probes.
    pub poll_interval: Duration,
    /// Performs one status probe. An `Err` fails the wait immediately.
    pub refresh: F,
}

impl<F> WaitSpec<F> {
    fn validate(&self) -> Result<(), WaitError> {
        if self.target.is_empty() {
            return Err(WaitError::EmptyTarget);
        }
        if let Some(label) = self.pending.iter().find(|s| self.target.contains(s)) {
            return Err(WaitError::OverlappingSets(label.clone()));
        }
        Ok(())
    }

    /// Poll until a target status is observed, a failure status is
    /// observed, or the timeout elapses.
    ///
    /// Probes are strictly sequential; the first probe happens immediately.
    /// Returns the value observed together with the target status. Waits
    /// that end with the resource absent (e.g. after delete) resolve with
    /// `None` when the refresh function reports the terminal label without
    /// a value. Failure and timeout errors carry a rendering of the
    /// observed value for diagnostics.
    pub async fn wait_for_state<T, Fut>(mut self) -> Result<Option<T>, WaitError>
    where
        T: std::fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Probe<T>>>,
    {
        self.validate()?;

        let deadline = Instant::now() + self.timeout;
        let mut last_status: Option<String> = None;
        let mut last_value: Option<String> = None;

        loop {
            let probe = (self.refresh)().await.map_err(WaitError::Probe)?;
            debug!(status = %probe.status, "Observed status");

            if self.target.iter().any(|s| *s == probe.status) {
                return Ok(probe.value);
            }
            if self.failure.iter().any(|s| *s == probe.status) {
                return Err(WaitError::StatusFailure {
                    status: probe.status,
                    detail: probe.detail,
                    value: probe.value.map(|v| format!("{v:?}")),
                });
            }
            if !probe.status.is_empty() && !self.pending.iter().any(|s| *s == probe.status) {
                debug!(status = %probe.status, "Unrecognized status, still waiting");
            }
            last_status = Some(probe.status);
            last_value = probe.value.map(|v| format!("{v:?}"));

            if Instant::now() >= deadline {
                warn!(
                    last_status = last_status.as_deref().unwrap_or(""),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for target state"
                );
                return Err(WaitError::Timeout {
                    last_status,
                    last_value,
                    timeout: self.timeout,
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn resolves_on_first_probe_when_target() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);
        let spec = WaitSpec {
            pending: vec!["PROVISIONING".into()],
            target: vec!["ACTIVE".into()],
            failure: vec!["ERROR".into()],
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            refresh: move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Probe::new(42u32, "ACTIVE"))
                }
            },
        };

        let out = spec.wait_for_state().await.unwrap();
        assert_eq!(out, Some(42));
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_always_pending() {
        let start = Instant::now();
        let spec = WaitSpec {
            pending: vec!["PROVISIONING".into()],
            target: vec!["ACTIVE".into()],
            failure: vec![],
            timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            refresh: || async { Ok(Probe::new(3u32, "PROVISIONING")) },
        };

        let err = spec.wait_for_state().await.unwrap_err();
        // No earlier than the timeout, no later than one extra interval.
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(50 + 2 * 10));
        match err {
            WaitError::Timeout {
                last_status,
                last_value,
                ..
            } => {
                assert_eq!(last_status.as_deref(), Some("PROVISIONING"));
                assert_eq!(last_value.as_deref(), Some("3"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_status_fails_immediately() {
        let start = std::time::Instant::now();
        let spec = WaitSpec {
            pending: vec!["PROVISIONING".into()],
            target: vec!["ACTIVE".into()],
            failure: vec!["ERROR".into()],
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(10),
            refresh: || async {
                Ok(Probe::new(11u32, "ERROR").with_detail("quota exceeded"))
            },
        };

        let err = spec.wait_for_state().await.unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        match err {
            WaitError::StatusFailure {
                status,
                detail,
                value,
            } => {
                assert_eq!(status, "ERROR");
                assert_eq!(detail.as_deref(), Some("quota exceeded"));
                assert_eq!(value.as_deref(), Some("11"));
            }
            other => panic!("expected status failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_status_keeps_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let spec = WaitSpec {
            pending: vec![],
            target: vec!["ACTIVE".into()],
            failure: vec![],
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            refresh: move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(Probe::new(None, "LIMBO"))
                    } else {
                        Ok(Probe::new(7u32, "ACTIVE"))
                    }
                }
            },
        };

        assert_eq!(spec.wait_for_state().await.unwrap(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn probe_error_passes_through() {
        let spec = WaitSpec {
            pending: vec![],
            target: vec!["ACTIVE".into()],
            failure: vec![],
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            refresh: || async { Err::<Probe<u32>, _>(anyhow::anyhow!("connection reset")) },
        };

        let err = spec.wait_for_state().await.unwrap_err();
        match err {
            WaitError::Probe(e) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected probe error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_empty_target_set() {
        let spec = WaitSpec {
            pending: vec![],
            target: vec![],
            failure: vec![],
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            refresh: || async { Ok(Probe::new(1u32, "ACTIVE")) },
        };
        assert!(matches!(
            spec.wait_for_state().await.unwrap_err(),
            WaitError::EmptyTarget
        ));
    }

    #[tokio::test]
    async fn rejects_overlapping_pending_and_target() {
        let spec = WaitSpec {
            pending: vec!["ACTIVE".into()],
            target: vec!["ACTIVE".into()],
            failure: vec![],
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            refresh: || async { Ok(Probe::new(1u32, "ACTIVE")) },
        };
        match spec.wait_for_state().await.unwrap_err() {
            WaitError::OverlappingSets(label) => assert_eq!(label, "ACTIVE"),
            other => panic!("expected overlap error, got {other:?}"),
        }
    }
}
