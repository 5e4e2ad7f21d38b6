// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Chat and messaging notifiers.

pub mod googlechat;
pub mod lark;
pub mod matrix;
pub mod msteams;
pub mod slack;
pub mod telegram;
pub mod webex;

pub use googlechat::GoogleChat;
pub use lark::Lark;
pub use matrix::Matrix;
pub use msteams::MsTeams;
pub use slack::{Flavor as SlackFlavor, Slack};
pub use telegram::Telegram;
pub use webex::Webex;
