//! Scan orchestration: request, optional job polling, and a single terminal outcome.
//!
//! Each scan runs as a [`ScanSession`]. Starting a session supersedes the
//! previous one; every await point races against that signal and every reply
//! is checked against the active session id before it touches any state, so a
//! late reply for an old session is dropped.

use crate::report::{normalizer, scorer};
use crate::target::TargetUrl;
use crate::transport::response::{self, InitialReply, Payload, PollReply};
use crate::transport::{ScanTransport, Verb};
use crate::types::{
    truncate_chars, ErrorKind, JobStatus, ReconError, Result, ScanJob, ScanReport, ScanResult,
    MAX_ERROR_BODY,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Identity of one scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Orchestrator states. `Completed`, `Failed` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Idle,
    Requesting,
    AwaitingJob,
    Polling,
    Completed,
    Failed(ErrorKind),
    TimedOut,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Failed(_) | ScanState::TimedOut
        )
    }
}

/// Receives state transitions and progress of the active session.
pub trait ScanObserver: Send + Sync {
    fn on_transition(&self, _session: SessionId, _from: ScanState, _to: ScanState) {}

    /// Progress fraction in [0, 1]; never decreases within a session.
    fn on_progress(&self, _session: SessionId, _fraction: f64) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Timing and retry policy.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock limit for the initial request, fallback included.
    pub request_timeout: Duration,
    /// Delay before the first status check of a job.
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Status checks allowed before giving up on a job.
    pub max_attempts: u32,
    /// Upper bound for the backoff after transient poll errors.
    pub max_backoff: Duration,
    /// Retry once with the alternate verb after a network-level failure.
    pub verb_fallback: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(3),
            max_attempts: 40,
            max_backoff: Duration::from_secs(30),
            verb_fallback: true,
        }
    }
}

/// Working state of one scan.
#[derive(Debug)]
pub struct ScanSession {
    id: SessionId,
    target: TargetUrl,
    job: Option<ScanJob>,
    state: ScanState,
    progress: f64,
    started: Instant,
    active: watch::Receiver<Option<SessionId>>,
}

impl ScanSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> &TargetUrl {
        &self.target
    }

    pub fn job(&self) -> Option<&ScanJob> {
        self.job.as_ref()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether a newer session or an explicit cancel has replaced this one.
    pub fn is_cancelled(&self) -> bool {
        *self.active.borrow() != Some(self.id)
    }
}

/// Terminal result of running a session.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(Box<ScanReport>),
    Failed(ReconError),
    /// The job was still processing when the attempt cap was reached.
    TimedOut(ScanJob),
    /// Superseded or cancelled; nothing was applied.
    Cancelled,
}

impl ScanOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ScanOutcome::Completed(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ScanOutcome::Failed(error) => Some(error.kind()),
            ScanOutcome::TimedOut(_) => Some(ErrorKind::Timeout),
            _ => None,
        }
    }

    /// Flatten into a serializable record.
    pub fn into_result(self, target: &str) -> ScanResult {
        let (status, report, error) = match self {
            ScanOutcome::Completed(report) => ("completed", Some(*report), None),
            ScanOutcome::Failed(error) => ("failed", None, Some(error)),
            ScanOutcome::TimedOut(job) => (
                "timed_out",
                None,
                Some(ReconError::PollTimeout {
                    job_id: job.id,
                    attempts: job.attempts,
                }),
            ),
            ScanOutcome::Cancelled => ("cancelled", None, None),
        };

        ScanResult {
            target: target.to_string(),
            status: status.to_string(),
            report,
            error_kind: error.as_ref().map(ReconError::kind),
            error: error.map(|e| e.user_message()),
        }
    }
}

/// Drives scans against a [`ScanTransport`], one active session at a time.
pub struct ScanOrchestrator<T> {
    transport: Arc<T>,
    config: OrchestratorConfig,
    observer: Arc<dyn ScanObserver>,
    active: Arc<watch::Sender<Option<SessionId>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for ScanOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            observer: self.observer.clone(),
            active: self.active.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T: ScanTransport> ScanOrchestrator<T> {
    pub fn new(transport: T, config: OrchestratorConfig) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            transport: Arc::new(transport),
            config,
            observer: Arc::new(NoopObserver),
            active: Arc::new(active),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Report transitions and progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Currently active session, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        *self.active.borrow()
    }

    /// Open a new session for `target`, superseding any session in flight.
    pub fn begin(&self, target: TargetUrl) -> ScanSession {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if let Some(previous) = self.active.send_replace(Some(id)) {
            debug!("Session {} supersedes {}", id, previous);
        }

        ScanSession {
            id,
            target,
            job: None,
            state: ScanState::Idle,
            progress: 0.0,
            started: Instant::now(),
            active: self.active.subscribe(),
        }
    }

    /// Cancel the active session. Its pending timers and replies are discarded.
    pub fn cancel(&self) {
        if let Some(previous) = self.active.send_replace(None) {
            info!("Cancelled scan session {}", previous);
        }
    }

    /// Begin and run a session.
    pub async fn scan(&self, target: TargetUrl) -> ScanOutcome {
        let session = self.begin(target);
        self.run(session).await
    }

    /// Run a session to its terminal outcome.
    pub async fn run(&self, mut session: ScanSession) -> ScanOutcome {
        match self.drive(&mut session).await {
            Some(outcome) => outcome,
            None => {
                debug!("Session {} superseded, dropping its results", session.id);
                ScanOutcome::Cancelled
            }
        }
    }

    /// `None` means the session stopped being current.
    async fn drive(&self, session: &mut ScanSession) -> Option<ScanOutcome> {
        self.transition(session, ScanState::Requesting)?;
        self.report_progress(session, 0.0)?;

        let payload = match self.request(session).await? {
            Ok(Payload::Json(payload)) => payload,
            Ok(Payload::Text(text)) => {
                let excerpt = truncate_chars(&text, MAX_ERROR_BODY);
                return self.fail(session, ReconError::Unparseable(excerpt));
            }
            Err(error) => return self.fail(session, error),
        };

        match response::initial_reply(payload) {
            InitialReply::Final(report) => self.complete(session, report),
            InitialReply::Failed(message) => self.fail(session, ReconError::JobFailed(message)),
            InitialReply::Job(job_id) => {
                info!("Scan of {} queued as job {}", session.target, job_id);
                session.job = Some(ScanJob::new(job_id.clone()));
                self.transition(session, ScanState::AwaitingJob)?;
                self.poll_job(session, &job_id).await
            }
        }
    }

    /// Primary request, plus one alternate-verb retry on a network failure.
    async fn request(&self, session: &ScanSession) -> Option<Result<Payload>> {
        let deadline = Instant::now() + self.config.request_timeout;
        let protocol = self.transport.protocol();

        let result = self.attempt(session, protocol.primary(), deadline).await?;
        match result {
            Err(error) if error.kind() == ErrorKind::NetworkFailure && self.config.verb_fallback => {
                let alternate = protocol.alternate();
                warn!(
                    "{} request for {} failed ({}), retrying with {}",
                    protocol.primary(),
                    session.target,
                    error,
                    alternate
                );
                self.attempt(session, alternate, deadline).await
            }
            other => Some(other),
        }
    }

    async fn attempt(
        &self,
        session: &ScanSession,
        verb: Verb,
        deadline: Instant,
    ) -> Option<Result<Payload>> {
        let call = tokio::time::timeout_at(deadline, self.transport.request(&session.target, verb));
        let result = self.guarded(session, call).await?;
        Some(result.unwrap_or(Err(ReconError::Timeout(self.config.request_timeout))))
    }

    async fn poll_job(&self, session: &mut ScanSession, job_id: &str) -> Option<ScanOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_delay;
        let mut consecutive_errors = 0u32;

        self.transition(session, ScanState::Polling)?;

        loop {
            self.guarded(session, tokio::time::sleep(delay)).await?;
            trace!("Polling job {} for session {}", job_id, session.id);

            match self.guarded(session, self.transport.poll(job_id)).await? {
                Ok(Payload::Json(reply)) => {
                    consecutive_errors = 0;
                    match response::poll_reply(reply) {
                        PollReply::Processing => {
                            let attempts = self.record_attempt(session);
                            self.report_progress(session, attempts as f64 / max_attempts as f64)?;
                            if attempts >= max_attempts {
                                return self.time_out(session);
                            }
                            self.transition(session, ScanState::Polling)?;
                            delay = self.config.poll_interval;
                        }
                        PollReply::Completed(report) => {
                            self.set_job_status(session, JobStatus::Completed);
                            return self.complete(session, report);
                        }
                        PollReply::Failed(message) => {
                            self.set_job_status(session, JobStatus::Failed);
                            return self.fail(session, ReconError::JobFailed(message));
                        }
                    }
                }
                Ok(Payload::Text(text)) => {
                    self.set_job_status(session, JobStatus::Failed);
                    let excerpt = truncate_chars(&text, MAX_ERROR_BODY);
                    return self.fail(session, ReconError::Unparseable(excerpt));
                }
                Err(error) if is_transient(&error) => {
                    let attempts = self.record_attempt(session);
                    if attempts >= max_attempts {
                        self.set_job_status(session, JobStatus::Failed);
                        return self.fail(session, error);
                    }
                    consecutive_errors += 1;
                    delay = self.backoff(consecutive_errors);
                    warn!(
                        "Status check {}/{} for job {} failed: {}; retrying in {:?}",
                        attempts, max_attempts, job_id, error, delay
                    );
                }
                Err(error) => {
                    self.set_job_status(session, JobStatus::Failed);
                    return self.fail(session, error);
                }
            }
        }
    }

    fn backoff(&self, consecutive_errors: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_errors.min(16));
        self.config
            .poll_interval
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }

    fn record_attempt(&self, session: &mut ScanSession) -> u32 {
        match session.job.as_mut() {
            Some(job) => {
                job.attempts += 1;
                job.attempts
            }
            None => 0,
        }
    }

    fn set_job_status(&self, session: &mut ScanSession, status: JobStatus) {
        if let Some(job) = session.job.as_mut() {
            job.status = status;
        }
    }

    /// Await `work` unless the session is superseded first.
    async fn guarded<F: Future>(&self, session: &ScanSession, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = superseded(session.active.clone(), session.id) => None,
            output = work => (!session.is_cancelled()).then_some(output),
        }
    }

    fn transition(&self, session: &mut ScanSession, to: ScanState) -> Option<()> {
        if session.is_cancelled() {
            return None;
        }
        let from = session.state;
        debug!("Session {}: {:?} -> {:?}", session.id, from, to);
        session.state = to;
        self.observer.on_transition(session.id, from, to);
        Some(())
    }

    fn report_progress(&self, session: &mut ScanSession, fraction: f64) -> Option<()> {
        if session.is_cancelled() {
            return None;
        }
        session.progress = session.progress.max(fraction.clamp(0.0, 1.0));
        self.observer.on_progress(session.id, session.progress);
        Some(())
    }

    fn complete(&self, session: &mut ScanSession, raw: Value) -> Option<ScanOutcome> {
        self.transition(session, ScanState::Completed)?;
        self.report_progress(session, 1.0)?;

        let report = ScanReport {
            target: session.target.to_string(),
            normalized: normalizer::normalize(Some(&raw)),
            assessment: scorer::assess(Some(&raw)),
            raw,
            job: session.job.clone(),
            duration_secs: session.elapsed().as_secs_f64(),
        };
        info!(
            "Scan of {} completed in {:.2}s (security {})",
            report.target, report.duration_secs, report.assessment.level
        );
        Some(ScanOutcome::Completed(Box::new(report)))
    }

    fn fail(&self, session: &mut ScanSession, error: ReconError) -> Option<ScanOutcome> {
        self.transition(session, ScanState::Failed(error.kind()))?;
        warn!("Scan of {} failed: {}", session.target, error);
        Some(ScanOutcome::Failed(error))
    }

    fn time_out(&self, session: &mut ScanSession) -> Option<ScanOutcome> {
        self.transition(session, ScanState::TimedOut)?;
        let job = session.job.clone()?;
        warn!(
            "Job {} still processing after {} status checks, giving up",
            job.id, job.attempts
        );
        Some(ScanOutcome::TimedOut(job))
    }
}

/// Network errors and per-call timeouts are worth another status check.
fn is_transient(error: &ReconError) -> bool {
    matches!(error.kind(), ErrorKind::NetworkFailure | ErrorKind::Timeout)
}

/// Resolves once `id` is no longer the active session.
async fn superseded(mut active: watch::Receiver<Option<SessionId>>, id: SessionId) {
    loop {
        if *active.borrow_and_update() != Some(id) {
            return;
        }
        if active.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
