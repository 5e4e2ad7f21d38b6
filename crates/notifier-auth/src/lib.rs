// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token acquisition for the notifier.
//!
//! Notifiers never talk to credential providers directly: they ask a
//! [`TokenCache`] for a token and hand it a fetch closure built from a
//! [`TokenSource`] or [`github_app::fetch_app_token`].

pub mod azure;
pub mod cache;
pub mod error;
pub mod gcp;
pub mod github_app;
pub mod jwt;
pub mod source;

pub use azure::AzureImdsSource;
pub use cache::{InvolvedObject, TokenCache, OPERATION_POST};
pub use error::AuthError;
pub use gcp::GcpSource;
pub use github_app::{fetch_app_token, AppToken, GithubAppConfig};
pub use source::{Token, TokenOptions, TokenSource};
