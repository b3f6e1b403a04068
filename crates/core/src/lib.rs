//! Teller core: session bookkeeping for the banking API client
//!
//! The [`SessionRegistry`] owns every logged-in identity and publishes a
//! snapshot on each mutation. The [`ExpiryNotifier`] follows those snapshots
//! and schedules a refresh prompt ahead of the active token's expiry.

pub mod clock;
pub mod error;
pub mod identity;
pub mod notifier;
pub mod registry;

pub use clock::{Clock, RuntimeClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use identity::{AccountSummary, Identity, IssuedTokens, identity_key};
pub use notifier::{
    ArmOutcome, DEFAULT_PROMPT_WINDOW, ExpiryEvent, ExpiryNotifier, FixedPrompt, NotifierState,
    PromptDue, RefreshDecision, RefreshPrompt, ScheduledTask, Ticker, TokenStatus,
};
pub use registry::{ActiveIdentity, RegistrySnapshot, SessionRegistry};
