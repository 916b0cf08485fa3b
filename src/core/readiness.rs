// EN: src/core/readiness.rs

//! Decides when the backend is ready for the frontend to be launched.
//!
//! The default is a fixed settle delay with no probing at all. A TCP connect
//! probe can be configured instead for backends that listen on a known port.

use crate::core::events::SessionEvent;
use crate::core::supervisor::SupervisorError;
use crate::models::Readiness;
use crate::system::process::ManagedProcess;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Waits until `backend` is considered ready according to `readiness`.
///
/// Returns the event describing how readiness was established.
///
/// # Errors
/// - `BackendExited` if the backend is found dead once the wait is over (or, when
///   probing, between two attempts).
/// - `ReadinessTimeout` if a probe never succeeds within its timeout.
pub async fn await_ready(
    readiness: &Readiness,
    backend: &mut ManagedProcess,
) -> Result<SessionEvent, SupervisorError> {
    match readiness {
        Readiness::Delay(delay) => {
            tokio::time::sleep(*delay).await;
            ensure_running(backend)?;
            Ok(SessionEvent::SettleElapsed { delay: *delay })
        }
        Readiness::TcpProbe {
            address,
            timeout,
            interval,
        } => probe_tcp(address, *timeout, *interval, backend).await,
    }
}

async fn probe_tcp(
    address: &str,
    timeout: Duration,
    interval: Duration,
    backend: &mut ManagedProcess,
) -> Result<SessionEvent, SupervisorError> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        ensure_running(backend)?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SupervisorError::ReadinessTimeout {
                address: address.to_string(),
                timeout,
            });
        }

        match tokio::time::timeout(remaining, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => {
                return Ok(SessionEvent::ProbeSucceeded {
                    address: address.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            Ok(Err(e)) => log::debug!("Readiness probe on {} failed: {}", address, e),
            Err(_) => log::debug!("Readiness probe on {} timed out", address),
        }

        let pause = interval.min(deadline.saturating_duration_since(Instant::now()));
        tokio::time::sleep(pause).await;
    }
}

fn ensure_running(backend: &mut ManagedProcess) -> Result<(), SupervisorError> {
    if backend.is_alive() {
        return Ok(());
    }
    Err(SupervisorError::BackendExited {
        exit: backend.exit().unwrap_or_default(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::{ExitCode, LaunchSpec, Role};
    use tokio::net::TcpListener;

    fn backend(script: &str) -> ManagedProcess {
        let spec = LaunchSpec::new("/bin/sh").with_args(vec!["-c".to_string(), script.to_string()]);
        ManagedProcess::spawn(Role::Backend, &spec).unwrap()
    }

    #[tokio::test]
    async fn test_delay_elapses_for_running_backend() {
        let mut process = backend("exec sleep 30");
        let delay = Duration::from_millis(100);

        let event = await_ready(&Readiness::Delay(delay), &mut process).await.unwrap();

        assert_eq!(event, SessionEvent::SettleElapsed { delay });
        process.force_kill().unwrap();
    }

    #[tokio::test]
    async fn test_delay_reports_backend_that_died() {
        let mut process = backend("exit 7");

        let result = await_ready(&Readiness::Delay(Duration::from_millis(300)), &mut process).await;

        match result {
            Err(SupervisorError::BackendExited { exit }) => {
                assert_eq!(exit, ExitCode::from_code(7));
            }
            other => panic!("unexpected readiness result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_succeeds_once_port_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let mut process = backend("exec sleep 30");

        let readiness = Readiness::TcpProbe {
            address: address.clone(),
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(50),
        };
        let event = await_ready(&readiness, &mut process).await.unwrap();

        assert!(matches!(event, SessionEvent::ProbeSucceeded { address: a, .. } if a == address));
        process.force_kill().unwrap();
    }

    #[tokio::test]
    async fn test_probe_times_out_on_closed_port() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut process = backend("exec sleep 30");

        let readiness = Readiness::TcpProbe {
            address: address.clone(),
            timeout: Duration::from_millis(400),
            interval: Duration::from_millis(50),
        };
        let started = std::time::Instant::now();
        let result = await_ready(&readiness, &mut process).await;

        assert!(matches!(result, Err(SupervisorError::ReadinessTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
        process.force_kill().unwrap();
    }

    #[tokio::test]
    async fn test_probe_stops_when_backend_exits() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut process = backend("exit 2");

        let readiness = Readiness::TcpProbe {
            address,
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(50),
        };
        let result = await_ready(&readiness, &mut process).await;

        assert!(matches!(result, Err(SupervisorError::BackendExited { .. })));
    }
}
