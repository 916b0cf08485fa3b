// EN: src/core/session.rs

use crate::constants::{EXIT_FAILURE, EXIT_INTERRUPTED};
use crate::core::events::{SessionEvent, SessionObserver};
use crate::core::supervisor::SupervisorError;
use crate::models::{ExitCode, ProcessSummary};
use crate::system::process::ManagedProcess;
use uuid::Uuid;

/// The supervisor's state machine, in the order a normal session walks through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Nothing started yet.
    Idle,
    /// Validating and spawning the backend.
    BackendStarting,
    /// Backend spawned, readiness gate in progress.
    BackendReady,
    /// Validating and spawning the frontend.
    FrontendStarting,
    /// Parked on the frontend's exit.
    Monitoring,
    /// Stopping a frontend that is still running after a fault or interrupt.
    ShuttingDownFrontend,
    /// Stopping the backend.
    ShuttingDownBackend,
    /// Done. Both processes are gone.
    Terminal,
}

/// Owns both processes of one supervised run.
///
/// Nothing outside the supervisor can reach the handles, so every state change
/// goes through the supervisor's sequencing.
#[derive(Debug)]
pub struct SupervisionSession {
    id: Uuid,
    phase: Phase,
    pub(crate) backend: Option<ManagedProcess>,
    pub(crate) frontend: Option<ManagedProcess>,
}

impl SupervisionSession {
    /// An idle session with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Idle,
            backend: None,
            frontend: None,
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The phase the session is currently in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: Phase, observer: &impl SessionObserver) {
        self.phase = phase;
        observer.on_event(&SessionEvent::PhaseEntered(phase));
    }

    /// Kills whatever is still running without waiting. Used when the async
    /// cleanup could not run (panic or a dropped supervision future).
    pub fn abandon(&mut self) {
        if let Some(frontend) = self.frontend.as_mut() {
            frontend.abandon();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.abandon();
        }
    }

    /// Releases the process handles, keeping only their final summaries.
    pub fn into_report(self, outcome: Result<ExitCode, SupervisorError>) -> SessionReport {
        SessionReport {
            session_id: self.id,
            outcome,
            backend: self.backend.as_ref().map(ManagedProcess::summary),
            frontend: self.frontend.as_ref().map(ManagedProcess::summary),
        }
    }
}

impl Default for SupervisionSession {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionReport {
    /// Id of the finished session.
    pub session_id: Uuid,
    /// The frontend's exit on the normal path, or why the session failed.
    pub outcome: Result<ExitCode, SupervisorError>,
    /// Final state of the backend, if it was ever spawned.
    pub backend: Option<ProcessSummary>,
    /// Final state of the frontend, if it was ever spawned.
    pub frontend: Option<ProcessSummary>,
}

impl SessionReport {
    /// The status the supervisor process should exit with.
    pub fn exit_status(&self) -> i32 {
        match &self.outcome {
            Ok(exit) => exit.as_status(),
            Err(SupervisorError::Interrupted) => EXIT_INTERRUPTED,
            Err(_) => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::tests::RecordingObserver;
    use crate::system::process::LaunchError;
    use crate::models::Role;
    use std::path::PathBuf;

    #[test]
    fn test_enter_reports_phase() {
        let recorder = RecordingObserver::default();
        let mut session = SupervisionSession::new();
        assert_eq!(session.phase(), Phase::Idle);

        session.enter(Phase::BackendStarting, &recorder);

        assert_eq!(session.phase(), Phase::BackendStarting);
        assert_eq!(
            recorder.events(),
            vec![SessionEvent::PhaseEntered(Phase::BackendStarting)]
        );
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(Phase::Idle < Phase::BackendStarting);
        assert!(Phase::Monitoring < Phase::ShuttingDownFrontend);
        assert!(Phase::ShuttingDownFrontend < Phase::ShuttingDownBackend);
        assert!(Phase::ShuttingDownBackend < Phase::Terminal);
    }

    #[test]
    fn test_report_exit_status() {
        let ok = SupervisionSession::new().into_report(Ok(ExitCode::from_code(4)));
        assert_eq!(ok.exit_status(), 4);

        let interrupted = SupervisionSession::new().into_report(Err(SupervisorError::Interrupted));
        assert_eq!(interrupted.exit_status(), EXIT_INTERRUPTED);

        let missing = SupervisionSession::new().into_report(Err(SupervisorError::Launch(
            LaunchError::MissingExecutable {
                role: Role::Backend,
                path: PathBuf::from("/nowhere"),
            },
        )));
        assert_eq!(missing.exit_status(), EXIT_FAILURE);
        assert!(missing.backend.is_none());
        assert!(missing.frontend.is_none());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(SupervisionSession::new().id(), SupervisionSession::new().id());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandon_kills_both_processes() {
        use crate::models::{LaunchSpec, ProcessState};

        let sleeper = LaunchSpec::new("/bin/sh")
            .with_args(vec!["-c".to_string(), "exec sleep 30".to_string()]);
        let mut session = SupervisionSession::new();
        session.backend = Some(ManagedProcess::spawn(Role::Backend, &sleeper).unwrap());
        session.frontend = Some(ManagedProcess::spawn(Role::Frontend, &sleeper).unwrap());

        session.abandon();

        for process in [session.backend.as_mut(), session.frontend.as_mut()]
            .into_iter()
            .flatten()
        {
            let exit = process.wait().await.unwrap();
            assert_eq!(exit.signal, Some(9));
            assert_eq!(process.state(), ProcessState::Killed);
        }
    }
}
