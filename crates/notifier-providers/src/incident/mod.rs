// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Incident management and observability notifiers.

pub mod alertmanager;
pub mod datadog;
pub mod grafana;
pub mod opsgenie;
pub mod pagerduty;
pub mod sentry;

pub use alertmanager::Alertmanager;
pub use datadog::Datadog;
pub use grafana::Grafana;
pub use opsgenie::Opsgenie;
pub use pagerduty::PagerDuty;
pub use sentry::Sentry;
