// EN: src/core/supervisor.rs

use crate::constants::KILL_REAP_TIMEOUT;
use crate::core::events::{LogObserver, SessionEvent, SessionObserver};
use crate::core::readiness;
use crate::core::session::{Phase, SessionReport, SupervisionSession};
use crate::models::{ExitCode, LaunchPlan, LaunchSpec, Role, WaitOutcome};
use crate::system::process::{LaunchError, ManagedProcess};
use scopeguard::ScopeGuard;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Why a session ended without a frontend exit to report.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A process could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// The backend died before the frontend was started.
    #[error("The backend exited before the frontend was started ({exit})")]
    BackendExited {
        /// How the backend ended.
        exit: ExitCode,
    },
    /// The TCP readiness probe never succeeded.
    #[error("The backend did not accept connections on {address} within {} ms", .timeout.as_millis())]
    ReadinessTimeout {
        /// The probed `host:port`.
        address: String,
        /// The probe budget that elapsed.
        timeout: Duration,
    },
    /// An OS call failed while supervising.
    #[error("Unexpected fault while {context}: {source}")]
    Fault {
        /// What the supervisor was doing.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The stop future passed to `run_until` resolved first.
    #[error("The supervisor was asked to stop.")]
    Interrupted,
}

/// Runs a backend for exactly as long as its frontend.
///
/// A session walks the phases of [`Phase`]: start the backend, wait until it is
/// ready, start the frontend, park until the frontend exits, then stop whatever
/// is still running. Stopping is always graceful first, then forced once the
/// grace timeout has elapsed.
///
/// Cleanup runs on every path out of the session. If the session future is
/// dropped or unwinds before it can clean up, both processes are killed
/// synchronously instead.
#[derive(Debug)]
pub struct Supervisor<O = LogObserver> {
    plan: LaunchPlan,
    observer: O,
}

impl Supervisor<LogObserver> {
    /// A supervisor that reports its events to the log.
    pub fn new(plan: LaunchPlan) -> Self {
        Self::with_observer(plan, LogObserver)
    }
}

impl<O: SessionObserver> Supervisor<O> {
    /// A supervisor that reports its events to `observer`.
    pub fn with_observer(plan: LaunchPlan, observer: O) -> Self {
        Self { plan, observer }
    }

    /// The plan this supervisor runs.
    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Supervises one session until the frontend exits.
    pub async fn run(&self) -> SessionReport {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), but ends the session early with
    /// [`SupervisorError::Interrupted`] if `stop` resolves first.
    pub async fn run_until<F>(&self, stop: F) -> SessionReport
    where
        F: Future<Output = ()>,
    {
        let mut session = scopeguard::guard(SupervisionSession::new(), |mut session| {
            session.abandon();
        });
        self.emit(SessionEvent::Started {
            session_id: session.id(),
        });

        let outcome = self.drive(&mut session, stop).await;
        match &outcome {
            Ok(_) | Err(SupervisorError::Interrupted) => {}
            Err(e) => self.emit(SessionEvent::Fault {
                message: e.to_string(),
            }),
        }

        self.cleanup(&mut session).await;

        session.enter(Phase::Terminal, &self.observer);
        self.emit(SessionEvent::Terminated {
            outcome: describe(&outcome),
        });
        ScopeGuard::into_inner(session).into_report(outcome)
    }

    async fn drive<F>(
        &self,
        session: &mut SupervisionSession,
        stop: F,
    ) -> Result<ExitCode, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        session.enter(Phase::BackendStarting, &self.observer);
        let process = self.launch(Role::Backend, &self.plan.backend)?;
        session.enter(Phase::BackendReady, &self.observer);
        let backend = session.backend.insert(process);

        let ready = tokio::select! {
            result = readiness::await_ready(&self.plan.readiness, backend) => result?,
            () = &mut stop => return Err(SupervisorError::Interrupted),
        };
        self.emit(ready);

        session.enter(Phase::FrontendStarting, &self.observer);
        let process = self.launch(Role::Frontend, &self.plan.frontend)?;
        session.enter(Phase::Monitoring, &self.observer);
        let frontend = session.frontend.insert(process);

        // The session's only long-lived suspension point.
        let exit = tokio::select! {
            biased;
            result = frontend.wait() => result.map_err(|source| SupervisorError::Fault {
                context: "waiting for the frontend to exit",
                source,
            })?,
            () = &mut stop => return Err(SupervisorError::Interrupted),
        };
        self.emit(SessionEvent::FrontendExited { exit });
        Ok(exit)
    }

    fn launch(&self, role: Role, spec: &LaunchSpec) -> Result<ManagedProcess, LaunchError> {
        self.emit(SessionEvent::SpawnAttempted {
            role,
            executable: spec.executable.display().to_string(),
        });
        let process = ManagedProcess::spawn(role, spec)?;
        self.emit(SessionEvent::Spawned {
            role,
            pid: process.pid(),
        });
        Ok(process)
    }

    /// Stops the frontend if it is somehow still running, then the backend.
    async fn cleanup(&self, session: &mut SupervisionSession) {
        let frontend_alive = session
            .frontend
            .as_mut()
            .is_some_and(ManagedProcess::is_alive);
        if frontend_alive {
            session.enter(Phase::ShuttingDownFrontend, &self.observer);
            if let Some(frontend) = session.frontend.as_mut() {
                self.shut_down(frontend).await;
            }
        }

        if session.backend.is_some() {
            session.enter(Phase::ShuttingDownBackend, &self.observer);
            if let Some(backend) = session.backend.as_mut() {
                if backend.is_alive() {
                    self.shut_down(backend).await;
                } else {
                    self.emit(SessionEvent::AlreadyExited {
                        role: backend.role(),
                        pid: backend.pid(),
                    });
                }
            }
        }
    }

    /// Graceful request, bounded wait, then unconditional kill.
    async fn shut_down(&self, process: &mut ManagedProcess) {
        let (role, pid) = (process.role(), process.pid());
        let timeout = self.plan.grace_timeout;

        self.emit(SessionEvent::GracefulStopRequested { role, pid });
        if let Err(e) = process.request_graceful_stop() {
            self.emit(SessionEvent::Fault {
                message: e.to_string(),
            });
        }

        match process.wait_timeout(timeout).await {
            Ok(WaitOutcome::Exited(exit)) => {
                self.emit(SessionEvent::StoppedGracefully { role, pid, exit });
                return;
            }
            Ok(WaitOutcome::TimedOut) => {
                self.emit(SessionEvent::GraceTimeoutElapsed { role, pid, timeout });
            }
            Err(e) => self.emit(SessionEvent::Fault {
                message: format!("Could not wait for the {} (PID: {}): {}", role, pid, e),
            }),
        }

        if let Err(e) = process.force_kill() {
            self.emit(SessionEvent::Fault {
                message: e.to_string(),
            });
            return;
        }
        match process.wait_timeout(KILL_REAP_TIMEOUT).await {
            Ok(WaitOutcome::Exited(_)) => self.emit(SessionEvent::ForceKilled { role, pid }),
            Ok(WaitOutcome::TimedOut) => self.emit(SessionEvent::Fault {
                message: format!(
                    "The {} (PID: {}) was killed but did not exit within {} ms",
                    role,
                    pid,
                    KILL_REAP_TIMEOUT.as_millis()
                ),
            }),
            Err(e) => self.emit(SessionEvent::Fault {
                message: format!("Could not reap the {} (PID: {}): {}", role, pid, e),
            }),
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.observer.on_event(&event);
    }
}

fn describe(outcome: &Result<ExitCode, SupervisorError>) -> String {
    match outcome {
        Ok(exit) => format!("frontend exited with {}", exit),
        Err(e) => e.to_string(),
    }
}
