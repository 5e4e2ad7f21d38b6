// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Message bus notifiers. Each publishes the full event JSON.

pub mod eventhub;
pub mod nats;
pub mod pubsub;

pub use eventhub::EventHub;
pub use nats::Nats;
pub use pubsub::PubSub;
