//! Periodic remaining-time readout

use crate::clock::Clock;
use crate::registry::{ActiveIdentity, RegistrySnapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Token lifetime as shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NoSession,
    NoExpiry,
    Remaining(Duration),
    Expired,
}

impl TokenStatus {
    pub fn evaluate(active: Option<&ActiveIdentity>, now_ms: i64) -> Self {
        let Some(active) = active else {
            return Self::NoSession;
        };
        let Some(expires_at) = active.expires_at else {
            return Self::NoExpiry;
        };
        match u64::try_from(expires_at - now_ms) {
            Ok(remaining) if remaining > 0 => Self::Remaining(Duration::from_millis(remaining)),
            _ => Self::Expired,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "Not authenticated"),
            Self::NoExpiry => write!(f, "Authenticated (expiry unknown)"),
            Self::Expired => write!(f, "Expired"),
            Self::Remaining(remaining) => {
                let seconds = remaining.as_millis().div_ceil(1000);
                write!(f, "Expires in {}m {:02}s", seconds / 60, seconds % 60)
            }
        }
    }
}

/// Background task republishing [`TokenStatus`] on a fixed interval
///
/// Only produces a readout; arming is left to the notifier. Stops when
/// dropped.
pub struct Ticker {
    status: watch::Receiver<TokenStatus>,
    _guard: DropGuard,
}

impl Ticker {
    pub fn spawn(
        interval: Duration,
        mut changes: watch::Receiver<RegistrySnapshot>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial = TokenStatus::evaluate(changes.borrow().active.as_ref(), clock.now_ms());
        let (status_tx, status) = watch::channel(initial);
        let shutdown = CancellationToken::new();
        let cancelled = shutdown.clone();

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut registry_open = true;

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticks.tick() => {},
                    changed = changes.changed(), if registry_open => {
                        registry_open = changed.is_ok();
                    }
                }

                let next = TokenStatus::evaluate(changes.borrow().active.as_ref(), clock.now_ms());
                status_tx.send_if_modified(|current| {
                    let modified = *current != next;
                    *current = next;
                    modified
                });
            }
        });

        Self {
            status,
            _guard: shutdown.drop_guard(),
        }
    }

    /// Latest readout
    pub fn status(&self) -> TokenStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TokenStatus> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(expires_at: Option<i64>) -> ActiveIdentity {
        ActiveIdentity {
            key: "ada@example.com".into(),
            email: "ada@example.com".into(),
            expires_at,
            accounts: 0,
        }
    }

    #[test]
    fn evaluates_each_state() {
        assert_eq!(TokenStatus::evaluate(None, 0), TokenStatus::NoSession);
        assert_eq!(
            TokenStatus::evaluate(Some(&active(None)), 0),
            TokenStatus::NoExpiry
        );
        assert_eq!(
            TokenStatus::evaluate(Some(&active(Some(60_000))), 60_000),
            TokenStatus::Expired
        );
        assert_eq!(
            TokenStatus::evaluate(Some(&active(Some(60_000))), 0),
            TokenStatus::Remaining(Duration::from_secs(60))
        );
    }

    #[test]
    fn display_rounds_up_to_whole_seconds() {
        assert_eq!(
            TokenStatus::Remaining(Duration::from_millis(200_001)).to_string(),
            "Expires in 3m 21s"
        );
        assert_eq!(
            TokenStatus::Remaining(Duration::from_secs(5)).to_string(),
            "Expires in 0m 05s"
        );
        assert_eq!(TokenStatus::Expired.to_string(), "Expired");
    }
}
