//! Monthly budget reset.
//!
//! The loop sleeps until `expires_at`, restores the balance, moves the expiry
//! one month ahead (midnight UTC) and sleeps again. A failed reset is logged
//! and the timer still rearms for the next monthly boundary.

use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Engine, ResultEngine};

/// One month after `now`, truncated to the start of that day (UTC).
#[must_use]
pub fn next_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = now.checked_add_months(Months::new(1)).unwrap_or(now);
    next.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(next, |midnight| midnight.and_utc())
}

#[derive(Debug)]
pub struct BudgetResetScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BudgetResetScheduler {
    /// Read the current expiry and arm the timer. Stops when `shutdown` is
    /// cancelled or on [`stop`](Self::stop).
    pub async fn start(engine: Engine, shutdown: &CancellationToken) -> ResultEngine<Self> {
        let deadline = engine.budget_state().await?.expires_at;
        let cancel = shutdown.child_token();
        tracing::info!(%deadline, "budget reset scheduler armed");
        let handle = tokio::spawn(run(engine, deadline, cancel.clone()));
        Ok(Self { cancel, handle })
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::error!(error = %err, "budget reset scheduler panicked");
        }
    }

    /// `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit (after cancellation).
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            tracing::error!(error = %err, "budget reset scheduler panicked");
        }
    }
}

async fn run(engine: Engine, mut deadline: DateTime<Utc>, cancel: CancellationToken) {
    loop {
        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("budget reset scheduler stopped");
                return;
            }
            () = tokio::time::sleep(wait) => {}
        }

        let next = next_expiry(Utc::now());
        match engine.reset_budget(next).await {
            Ok(balance) => tracing::info!(%balance, next_expiry = %next, "budget reset"),
            Err(err) => {
                tracing::error!(error = %err, next_expiry = %next, "budget reset failed");
            }
        }
        deadline = next;
    }
}
