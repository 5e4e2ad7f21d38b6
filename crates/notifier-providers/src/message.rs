// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Text rendering shared by the chat and incident adapters.

use notifier_core::{Event, Severity};

pub(crate) const COLOR_GOOD: &str = "#2eb886";
pub(crate) const COLOR_DANGER: &str = "#a30200";

/// Slack-style attachment color name.
pub(crate) fn severity_color_name(severity: Severity) -> &'static str {
	match severity {
		Severity::Error => "danger",
		Severity::Info | Severity::Trace => "good",
	}
}

pub(crate) fn severity_color_hex(severity: Severity) -> &'static str {
	match severity {
		Severity::Error => COLOR_DANGER,
		Severity::Info | Severity::Trace => COLOR_GOOD,
	}
}

/// Headline used by every chat adapter, e.g. `kustomization/apps.flux-system`.
pub(crate) fn title(event: &Event) -> String {
	event.object_key()
}

/// `key: value` lines for the human-visible metadata, in key order.
pub(crate) fn metadata_lines(event: &Event) -> Vec<String> {
	event
		.annotations()
		.map(|(k, v)| format!("{k}: {v}"))
		.collect()
}

/// Message text followed by the metadata lines.
pub(crate) fn plain_text(event: &Event) -> String {
	let mut text = event.message.clone();
	for line in metadata_lines(event) {
		text.push('\n');
		text.push_str(&line);
	}
	text
}

/// Markdown body: bold title, message, then a bullet per metadata entry.
pub(crate) fn markdown(event: &Event) -> String {
	let mut text = format!("**{}**\n\n{}", title(event), event.message);
	let lines = metadata_lines(event);
	if !lines.is_empty() {
		text.push('\n');
		for line in lines {
			text.push_str("\n- ");
			text.push_str(&line);
		}
	}
	text
}

/// Escape text for Telegram's MarkdownV2 parse mode.
pub(crate) fn escape_markdown_v2(text: &str) -> String {
	const SPECIAL: &[char] = &[
		'_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
	];
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		if SPECIAL.contains(&c) {
			out.push('\\');
		}
		out.push(c);
	}
	out
}
