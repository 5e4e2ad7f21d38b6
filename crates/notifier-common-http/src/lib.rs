// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP transport for notifiers.
//!
//! This crate provides:
//! - Client construction bound to a proxy, a TLS trust store and a client
//!   certificate, with a consistent User-Agent header
//! - Retry logic with exponential backoff that honors a [`Context`]
//! - [`Transport`], which encodes, signs and sends one outbound request
//! - HMAC-SHA256 body signing
//!
//! [`Context`]: notifier_core::Context

mod client;
mod error;
mod request;
mod retry;
pub mod signature;

pub use client::{build_client, builder, user_agent, ClientOptions, TlsConfig};
pub use error::HttpError;
pub use request::{HttpResponse, OutboundRequest, Transport};
pub use retry::{retry, RetryConfig, RetryableError};
