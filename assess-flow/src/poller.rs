//! Poller – drives a [`RemoteJob`] to a terminal state within a wall-clock budget.
//!
//! The wait is a single future bounded by a hard deadline of
//! `budget + interval`. Dropping the future stops polling, so callers can layer
//! their own request timeout on top (`tokio::time::timeout(.., poller.wait_for(&job))`).
//!
//! Transitions per observation:
//! * `Processed` → return the payload.
//! * `Failed` → [`FlowError::JobFailed`] with the job's message. No further calls are made.
//! * anything else → sleep `interval`, poll again.
//! * budget exhausted → [`FlowError::TimedOut`].
//!
//! Errors returned by [`RemoteJob::check`] end the wait immediately; nothing is retried.

use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::{
    error::{FlowError, Result},
    job::{JobState, RemoteJob},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two consecutive observations.
    pub interval: Duration,
    /// Wall-clock time after which no new observation is started.
    pub budget: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, budget: Duration) -> Self {
        Self { interval, budget }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_BUDGET)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Poll `job` until it is processed, fails, or the budget runs out.
    pub async fn wait_for<J: RemoteJob>(&self, job: &J) -> Result<J::Output> {
        let started = Instant::now();
        let soft_deadline = started + self.policy.budget;
        let hard_deadline = soft_deadline + self.policy.interval;

        info!(
            job_id = %job.id(),
            interval_secs = self.policy.interval.as_secs_f64(),
            budget_secs = self.policy.budget.as_secs_f64(),
            "Waiting for remote job"
        );

        match timeout_at(hard_deadline, self.poll_until(job, soft_deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.timed_out(job, started)),
        }
    }

    async fn poll_until<J: RemoteJob>(&self, job: &J, deadline: Instant) -> Result<J::Output> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                return Err(self.timed_out(job, started));
            }

            let snapshot = job.check().await?;
            polls += 1;

            match snapshot.state {
                JobState::Processed => {
                    info!(job_id = %job.id(), polls, "Remote job processed");
                    return snapshot.payload.ok_or_else(|| {
                        FlowError::provider(200, "job reported Processed without a result payload")
                    });
                }
                JobState::Failed => {
                    let message = snapshot
                        .error_message
                        .unwrap_or_else(|| "Unknown error".to_string());
                    warn!(job_id = %job.id(), polls, error = %message, "Remote job failed");
                    return Err(FlowError::JobFailed(message));
                }
                state => {
                    debug!(job_id = %job.id(), polls, state = %state, "Remote job not ready");
                }
            }

            sleep(self.policy.interval).await;
        }
    }

    fn timed_out<J: RemoteJob>(&self, job: &J, started: Instant) -> FlowError {
        let waited = started.elapsed();
        warn!(
            job_id = %job.id(),
            waited_secs = waited.as_secs_f64(),
            "Remote job timed out"
        );
        FlowError::TimedOut {
            job_id: job.id().to_string(),
            waited,
        }
    }
}
