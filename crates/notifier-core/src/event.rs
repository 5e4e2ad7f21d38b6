// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The normalized event delivered to every notifier.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Metadata key carrying the encoded source revision.
pub const META_REVISION: &str = "revision";
/// Metadata key carrying the revision of the origin artifact.
pub const META_ORIGIN_REVISION: &str = "originRevision";
/// Metadata key whose value is appended to the commit-status genre.
pub const META_SUMMARY: &str = "summary";
/// Metadata key marking status-refresh-only events.
pub const META_COMMIT_STATUS: &str = "commit_status";
/// Value of [`META_COMMIT_STATUS`] for status-refresh-only events.
pub const COMMIT_STATUS_UPDATE: &str = "update";
/// Reason emitted while a reconciliation is still running.
pub const REASON_PROGRESSING: &str = "Progressing";

const MAX_METADATA_VALUE_BYTES: usize = 1024;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Info,
	Error,
	Trace,
}

impl Severity {
	pub fn as_str(&self) -> &'static str {
		match self {
			Severity::Info => "info",
			Severity::Error => "error",
			Severity::Trace => "trace",
		}
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Reference to the resource an event concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
	pub kind: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub uid: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub api_version: String,
}

/// A control-plane event.
///
/// Serializes with the camelCase field names receivers of the generic
/// webhook already understand. Metadata is kept in a [`BTreeMap`] so every
/// payload derived from it iterates keys in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub involved_object: ObjectReference,
	pub severity: Severity,
	pub timestamp: DateTime<Utc>,
	pub message: String,
	pub reason: String,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub metadata: BTreeMap<String, String>,
	pub reporting_controller: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub reporting_instance: String,
}

impl Event {
	/// Check the event invariants.
	pub fn validate(&self) -> Result<(), EventError> {
		if self.timestamp.timestamp() == 0 && self.timestamp.timestamp_subsec_nanos() == 0 {
			return Err(EventError::ZeroTimestamp);
		}
		if self.involved_object.kind.is_empty() {
			return Err(EventError::EmptyObjectField { field: "kind" });
		}
		if self.involved_object.name.is_empty() {
			return Err(EventError::EmptyObjectField { field: "name" });
		}
		for (key, value) in &self.metadata {
			if value.len() > MAX_METADATA_VALUE_BYTES {
				return Err(EventError::MetadataTooLong {
					key: key.clone(),
					limit: MAX_METADATA_VALUE_BYTES,
				});
			}
			if value.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
				return Err(EventError::MetadataNotPrintable { key: key.clone() });
			}
		}
		Ok(())
	}

	/// `kind/name.namespace` with the kind lowercased.
	pub fn object_key(&self) -> String {
		let obj = &self.involved_object;
		format!("{}/{}.{}", obj.kind.to_lowercase(), obj.name, obj.namespace)
	}

	pub fn metadata_value(&self, key: &str) -> Option<&str> {
		self.metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
	}

	pub fn revision(&self) -> Option<&str> {
		self.metadata_value(META_REVISION)
	}

	pub fn summary(&self) -> Option<&str> {
		self.metadata_value(META_SUMMARY)
	}

	/// True for events that only exist to refresh a commit status.
	pub fn is_commit_status_update(&self) -> bool {
		self.metadata_value(META_COMMIT_STATUS) == Some(COMMIT_STATUS_UPDATE)
	}

	pub fn is_progressing(&self) -> bool {
		self.reason == REASON_PROGRESSING
	}

	/// Metadata entries shown to humans, excluding the dispatcher's own
	/// control keys.
	pub fn annotations(&self) -> impl Iterator<Item = (&str, &str)> {
		self
			.metadata
			.iter()
			.filter(|(k, _)| k.as_str() != META_COMMIT_STATUS)
			.map(|(k, v)| (k.as_str(), v.as_str()))
	}
}


#[cfg(test)]
mod tests {
	use super::fixtures::event;
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn serializes_with_camel_case_fields() {
		let json = serde_json::to_value(event()).unwrap();
		assert_eq!(json["involvedObject"]["kind"], "Kustomization");
		assert_eq!(json["involvedObject"]["apiVersion"], "kustomize.toolkit.fluxcd.io/v1");
		assert_eq!(json["severity"], "info");
		assert_eq!(json["reportingController"], "kustomize-controller");
		assert!(json.get("metadata").is_none());
		assert!(json.get("reportingInstance").is_none());
	}

	#[test]
	fn deserializes_upstream_event() {
		let raw = r#"{
			"involvedObject": {"kind": "GitRepository", "name": "podinfo", "namespace": "default"},
			"severity": "error",
			"timestamp": "2024-05-01T12:00:00Z",
			"message": "fetch failed",
			"reason": "GitOperationFailed",
			"metadata": {"revision": "main@sha1:abc"},
			"reportingController": "source-controller"
		}"#;
		let ev: Event = serde_json::from_str(raw).unwrap();
		assert_eq!(ev.severity, Severity::Error);
		assert_eq!(ev.revision(), Some("main@sha1:abc"));
		assert!(ev.validate().is_ok());
	}

	#[test]
	fn validate_rejects_zero_timestamp() {
		let mut ev = event();
		ev.timestamp = Utc.timestamp_opt(0, 0).unwrap();
		assert_eq!(ev.validate(), Err(EventError::ZeroTimestamp));
	}

	#[test]
	fn validate_rejects_empty_name() {
		let mut ev = event();
		ev.involved_object.name.clear();
		assert_eq!(
			ev.validate(),
			Err(EventError::EmptyObjectField { field: "name" })
		);
	}

	#[test]
	fn validate_rejects_oversized_metadata() {
		let mut ev = event();
		ev.metadata.insert("blob".to_string(), "x".repeat(2000));
		assert!(matches!(
			ev.validate(),
			Err(EventError::MetadataTooLong { .. })
		));
	}

	#[test]
	fn validate_rejects_control_characters() {
		let mut ev = event();
		ev.metadata.insert("bell".to_string(), "ding\u{7}".to_string());
		assert!(matches!(
			ev.validate(),
			Err(EventError::MetadataNotPrintable { .. })
		));
	}

	#[test]
	fn commit_status_update_flag() {
		let mut ev = event();
		assert!(!ev.is_commit_status_update());
		ev.metadata.insert(META_COMMIT_STATUS.to_string(), "update".to_string());
		assert!(ev.is_commit_status_update());
		assert_eq!(ev.annotations().count(), 0);
	}

	#[test]
	fn object_key_lowercases_kind() {
		assert_eq!(event().object_key(), "kustomization/apps.flux-system");
	}

	#[test]
	fn empty_metadata_values_are_absent() {
		let mut ev = event();
		ev.metadata.insert(META_SUMMARY.to_string(), String::new());
		assert_eq!(ev.summary(), None);
	}
}
