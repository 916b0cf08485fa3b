// EN: src/core/events.rs

use crate::core::session::Phase;
use crate::models::{ExitCode, Role};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A lifecycle step of a supervision session.
///
/// The supervisor never writes to the logger itself: it reports these to a
/// [`SessionObserver`], which decides where they go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session began.
    Started {
        /// Unique id of the session, repeated in its logs.
        session_id: Uuid,
    },
    /// The state machine moved to a new phase.
    PhaseEntered(Phase),
    /// A process is about to be spawned.
    SpawnAttempted {
        /// Which process.
        role: Role,
        /// The executable path, as it will be launched.
        executable: String,
    },
    /// A process was spawned.
    Spawned {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
    },
    /// The fixed settle delay is over and the backend is still running.
    SettleElapsed {
        /// The delay that was waited.
        delay: Duration,
    },
    /// The backend accepted a TCP connection.
    ProbeSucceeded {
        /// The probed `host:port`.
        address: String,
        /// Time from the first attempt to the successful one.
        elapsed: Duration,
    },
    /// The frontend exited on its own.
    FrontendExited {
        /// How it ended.
        exit: ExitCode,
    },
    /// A graceful stop request is about to be sent.
    GracefulStopRequested {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
    },
    /// The process exited within the grace timeout.
    StoppedGracefully {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
        /// How it ended.
        exit: ExitCode,
    },
    /// The process ignored the graceful request. A forced kill follows.
    GraceTimeoutElapsed {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
        /// The grace timeout that elapsed.
        timeout: Duration,
    },
    /// The process was killed and reaped.
    ForceKilled {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
    },
    /// Nothing to stop: the process had exited before cleanup.
    AlreadyExited {
        /// Which process.
        role: Role,
        /// Its OS process id.
        pid: u32,
    },
    /// Something went wrong that does not change the outcome by itself.
    Fault {
        /// Human readable description.
        message: String,
    },
    /// The session is over.
    Terminated {
        /// Human readable outcome.
        outcome: String,
    },
}

/// How serious an event is, mapped onto log levels by [`LogObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// State machine noise.
    Debug,
    /// Normal lifecycle steps.
    Info,
    /// Unexpected but handled.
    Warning,
    /// A fault.
    Error,
}

impl SessionEvent {
    /// How loudly this event should be reported.
    pub fn severity(&self) -> Severity {
        match self {
            Self::PhaseEntered(_) => Severity::Debug,
            Self::GraceTimeoutElapsed { .. } => Severity::Warning,
            Self::Fault { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { session_id } => write!(f, "Starting supervision session {}", session_id),
            Self::PhaseEntered(phase) => write!(f, "Entering phase {:?}", phase),
            Self::SpawnAttempted { role, executable } => {
                write!(f, "Starting {} from: {}", role, executable)
            }
            Self::Spawned { role, pid } => write!(f, "{} started with PID: {}", capitalize(*role), pid),
            Self::SettleElapsed { delay } => write!(
                f,
                "Waited {} ms for the backend to start, assuming it is ready",
                delay.as_millis()
            ),
            Self::ProbeSucceeded { address, elapsed } => write!(
                f,
                "Backend accepted a connection on {} after {} ms",
                address,
                elapsed.as_millis()
            ),
            Self::FrontendExited { exit } => write!(f, "Frontend closed with {}", exit),
            Self::GracefulStopRequested { role, pid } => {
                write!(f, "Requesting the {} to stop (PID: {})", role, pid)
            }
            Self::StoppedGracefully { role, pid, exit } => {
                write!(f, "{} process {} stopped cleanly ({})", capitalize(*role), pid, exit)
            }
            Self::GraceTimeoutElapsed { role, pid, timeout } => write!(
                f,
                "The {} (PID: {}) did not stop within {} ms, forcing it",
                role,
                pid,
                timeout.as_millis()
            ),
            Self::ForceKilled { role, pid } => {
                write!(f, "{} process {} killed", capitalize(*role), pid)
            }
            Self::AlreadyExited { role, pid } => {
                write!(f, "{} process {} had already exited", capitalize(*role), pid)
            }
            Self::Fault { message } => write!(f, "{}", message),
            Self::Terminated { outcome } => write!(f, "Supervisor finished: {}", outcome),
        }
    }
}

fn capitalize(role: Role) -> &'static str {
    match role {
        Role::Backend => "Backend",
        Role::Frontend => "Frontend",
    }
}

/// Receives every event of a session, in order.
pub trait SessionObserver: Send + Sync {
    /// Called synchronously from the supervisor for each event.
    fn on_event(&self, event: &SessionEvent);
}

/// The default observer: one log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event.severity() {
            Severity::Debug => log::debug!("{}", event),
            Severity::Info => log::info!("{}", event),
            Severity::Warning => log::warn!("{}", event),
            Severity::Error => log::error!("{}", event),
        }
    }
}

impl<T: SessionObserver + ?Sized> SessionObserver for &T {
    fn on_event(&self, event: &SessionEvent) {
        (**self).on_event(event);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event so tests can assert on ordering.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        events: Mutex<Vec<SessionEvent>>,
    }

    impl RecordingObserver {
        pub(crate) fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Index of the first event matching `pred`.
        pub(crate) fn position(&self, pred: impl Fn(&SessionEvent) -> bool) -> Option<usize> {
            self.events().iter().position(pred)
        }
    }

    impl SessionObserver for RecordingObserver {
        fn on_event(&self, event: &SessionEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_grace_timeout_is_a_warning() {
        let event = SessionEvent::GraceTimeoutElapsed {
            role: Role::Backend,
            pid: 42,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(event.severity(), Severity::Warning);
        assert_eq!(
            event.to_string(),
            "The backend (PID: 42) did not stop within 5000 ms, forcing it"
        );
    }

    #[test]
    fn test_lifecycle_messages() {
        let spawned = SessionEvent::Spawned {
            role: Role::Backend,
            pid: 7,
        };
        assert_eq!(spawned.to_string(), "Backend started with PID: 7");
        assert_eq!(spawned.severity(), Severity::Info);

        let exited = SessionEvent::FrontendExited {
            exit: ExitCode::from_code(0),
        };
        assert_eq!(exited.to_string(), "Frontend closed with code 0");
    }

    #[test]
    fn test_phase_changes_are_debug() {
        let event = SessionEvent::PhaseEntered(Phase::Monitoring);
        assert_eq!(event.severity(), Severity::Debug);
    }

    #[test]
    fn test_recording_observer_through_reference() {
        fn notify<O: SessionObserver>(observer: O) {
            observer.on_event(&SessionEvent::PhaseEntered(Phase::Idle));
        }

        let recorder = RecordingObserver::default();
        notify(&recorder);
        assert_eq!(recorder.events(), vec![SessionEvent::PhaseEntered(Phase::Idle)]);
    }
}
