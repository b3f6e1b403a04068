//! Expiry notifier
//!
//! Schedules a single refresh prompt shortly before the active identity's
//! access token expires. Arming always cancels the outstanding prompt first,
//! so at most one prompt is pending per notifier. When the prompt fires the
//! operator's decision is published as an [`ExpiryEvent`]; acting on it is
//! left to whoever owns the HTTP client.

mod task;
mod ticker;

pub use task::ScheduledTask;
pub use ticker::{Ticker, TokenStatus};

use crate::clock::Clock;
use crate::registry::{ActiveIdentity, RegistrySnapshot};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Default lead time between the prompt and the token expiry
pub const DEFAULT_PROMPT_WINDOW: Duration = Duration::from_secs(180);

const EVENT_CAPACITY: usize = 16;

/// Identity whose token is about to expire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDue {
    pub key: String,
    pub email: String,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
}

/// Operator answer to a refresh prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    RefreshNow,
    LetExpire,
}

/// Surfaces the "refresh now or let it expire" question to the operator
#[async_trait]
pub trait RefreshPrompt: Send + Sync {
    async fn prompt(&self, due: &PromptDue) -> RefreshDecision;
}

/// Prompt that always answers the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompt(pub RefreshDecision);

#[async_trait]
impl RefreshPrompt for FixedPrompt {
    async fn prompt(&self, _due: &PromptDue) -> RefreshDecision {
        self.0
    }
}

/// Published once a prompt has been answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryEvent {
    Prompted {
        due: PromptDue,
        decision: RefreshDecision,
    },
}

/// Whether a prompt is pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierState {
    Idle,
    Armed { key: String, prompt_at: i64 },
}

/// Result of an [`ExpiryNotifier::arm`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Prompt scheduled at the given epoch milliseconds
    Armed { prompt_at: i64 },
    /// The prompt time is already behind us
    WindowPassed,
    /// The active identity has no known expiry
    NoExpiry,
    NoActiveIdentity,
}

struct Armed {
    key: String,
    prompt_at: i64,
    generation: u64,
    task: ScheduledTask,
}

struct Inner {
    clock: Arc<dyn Clock>,
    window: Duration,
    prompt: Arc<dyn RefreshPrompt>,
    slot: Mutex<Option<Armed>>,
    generation: AtomicU64,
    events: broadcast::Sender<ExpiryEvent>,
    registry: Mutex<Option<watch::Receiver<RegistrySnapshot>>>,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<Armed>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the tracked registry still shows `due` as the active token
    ///
    /// Always true when no registry is attached.
    fn still_due(&self, due: &PromptDue) -> bool {
        let registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.as_ref().is_none_or(|changes| {
            changes.borrow().active.as_ref().is_some_and(|active| {
                active.key == due.key && active.expires_at == Some(due.expires_at)
            })
        })
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    async fn fire(&self, generation: u64, due: PromptDue) {
        {
            let mut slot = self.lock_slot();
            match slot.take() {
                Some(armed) if armed.generation == generation => armed.task.detach(),
                other => {
                    // Superseded by a later arm
                    *slot = other;
                    return;
                }
            }
        }

        if !self.still_due(&due) {
            debug!(identity = %due.key, "Identity no longer active at prompt time, dropping prompt");
            return;
        }

        info!(identity = %due.key, expires_at = due.expires_at, "Token expiry window reached, prompting for refresh");
        let decision = self.prompt.prompt(&due).await;
        debug!(identity = %due.key, ?decision, "Refresh prompt answered");

        // No subscribers is fine; the decision is simply dropped
        let _ = self.events.send(ExpiryEvent::Prompted { due, decision });
    }
}

/// Schedules the pre-expiry refresh prompt for the active identity
#[derive(Clone)]
pub struct ExpiryNotifier {
    inner: Arc<Inner>,
}

impl ExpiryNotifier {
    /// Create a notifier with the default three minute window
    pub fn new(clock: Arc<dyn Clock>, prompt: Arc<dyn RefreshPrompt>) -> Self {
        Self::with_window(clock, prompt, DEFAULT_PROMPT_WINDOW)
    }

    /// Create a notifier that prompts `window` ahead of expiry
    pub fn with_window(
        clock: Arc<dyn Clock>,
        prompt: Arc<dyn RefreshPrompt>,
        window: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                clock,
                window,
                prompt,
                slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                events,
                registry: Mutex::new(None),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Subscribe to answered prompts
    pub fn subscribe(&self) -> broadcast::Receiver<ExpiryEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> NotifierState {
        self.inner
            .lock_slot()
            .as_ref()
            .map_or(NotifierState::Idle, |armed| NotifierState::Armed {
                key: armed.key.clone(),
                prompt_at: armed.prompt_at,
            })
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock_slot().is_some()
    }

    /// Cancel any pending prompt and schedule one for `active`
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, active: Option<&ActiveIdentity>) -> ArmOutcome {
        let mut slot = self.inner.lock_slot();
        if let Some(previous) = slot.take() {
            debug!(identity = %previous.key, "Cancelled pending expiry prompt");
            previous.task.cancel();
        }

        let Some(active) = active else {
            return ArmOutcome::NoActiveIdentity;
        };
        let Some(expires_at) = active.expires_at else {
            debug!(identity = %active.key, "No expiry known, prompt not scheduled");
            return ArmOutcome::NoExpiry;
        };

        let prompt_at = expires_at.saturating_sub(self.inner.window_ms());
        let now = self.inner.clock.now_ms();
        if prompt_at <= now {
            debug!(identity = %active.key, "Prompt window already passed");
            return ArmOutcome::WindowPassed;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = Duration::from_millis(u64::try_from(prompt_at - now).unwrap_or(0));
        let due = PromptDue {
            key: active.key.clone(),
            email: active.email.clone(),
            expires_at,
        };

        let inner = Arc::clone(&self.inner);
        let task = ScheduledTask::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation, due).await;
        });

        info!(identity = %active.key, prompt_in_ms = prompt_at - now, "Armed expiry prompt");
        *slot = Some(Armed {
            key: active.key.clone(),
            prompt_at,
            generation,
            task,
        });

        ArmOutcome::Armed { prompt_at }
    }

    /// Cancel the pending prompt, returning whether one was armed
    pub fn disarm(&self) -> bool {
        self.inner.lock_slot().take().is_some_and(|armed| {
            armed.task.cancel();
            true
        })
    }

    /// Only prompt while `changes` still shows the armed identity and expiry
    pub fn attach(&self, changes: watch::Receiver<RegistrySnapshot>) {
        *self
            .inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(changes);
    }

    /// Re-arm whenever the active identity or its expiry changes
    ///
    /// Also attaches `changes`, so a prompt that comes due before the
    /// follower catches up is dropped if its identity is no longer active.
    pub fn follow(&self, mut changes: watch::Receiver<RegistrySnapshot>) -> ScheduledTask {
        self.attach(changes.clone());
        let notifier = self.clone();
        ScheduledTask::spawn(async move {
            let mut last: Option<(String, Option<i64>)> = None;
            loop {
                let active = changes.borrow_and_update().active.clone();
                let current = active
                    .as_ref()
                    .map(|active| (active.key.clone(), active.expires_at));
                if current != last {
                    notifier.arm(active.as_ref());
                    last = current;
                }

                if changes.changed().await.is_err() {
                    debug!("Registry dropped, expiry follower stopping");
                    break;
                }
            }
        })
    }

    /// Start the once-per-interval remaining-time readout
    pub fn ticker(&self, interval: Duration, changes: watch::Receiver<RegistrySnapshot>) -> Ticker {
        Ticker::spawn(interval, changes, Arc::clone(&self.inner.clock))
    }
}
