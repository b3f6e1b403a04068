//! Teller: operator harness for the banking API
//!
//! The [`Workbench`] ties the HTTP client to the session registry and the
//! expiry notifier. The front ends built on it are the interactive
//! [`shell`], the scripted [`demo`] walkthrough, and [`flow`] files.

pub mod demo;
pub mod error;
pub mod flow;
pub mod prompt;
pub mod settings;
pub mod shell;
pub mod workbench;

pub use error::{FlowError, WorkbenchError, WorkbenchResult};
pub use prompt::{ChannelPrompt, PromptRequest};
pub use settings::{LogFormat, Settings};
pub use workbench::{Workbench, WorkbenchConfig};
