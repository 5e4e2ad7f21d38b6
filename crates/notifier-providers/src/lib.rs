// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider adapters for the notification dispatcher.
//!
//! This crate provides:
//! - [`Notifier`]: the delivery trait every adapter implements
//! - Chat, incident, message bus and webhook adapters
//! - Commit status reporting for source hosts, with de-duplication
//! - [`Factory`]: builds a notifier from a provider type and its options
//!
//! # Example
//!
//! ```no_run
//! use notifier_core::{Context, Event};
//! use notifier_providers::{Factory, NotifierOptions};
//!
//! # async fn example(event: Event) -> Result<(), notifier_providers::NotifyError> {
//! let factory = Factory::new(NotifierOptions::new("https://hooks.example.com/flux"));
//! let notifier = factory.notifier("generic")?;
//! notifier.post(&Context::background(), &event).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod chat;
pub mod commit_status;
mod credentials;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod incident;
mod message;
pub mod notifier;
pub mod options;
pub mod webhook;

pub use error::NotifyError;
pub use factory::{lookup, provider_types, Factory, ProviderEntry, ProviderRegistry};
pub use notifier::Notifier;
pub use options::{NotifierOptions, ProviderInstance, TlsSettings, PROVIDER_KIND};
