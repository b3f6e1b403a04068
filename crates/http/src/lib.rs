//! Teller HTTP module: JSON gateway client for the banking API
//!
//! [`client::ApiClient::call`] is the single request primitive; the typed
//! wrappers in [`client`] decode into the bodies defined in [`types`].

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, Authorized, ClientError, DEVICE_ID_HEADER, Payload};
