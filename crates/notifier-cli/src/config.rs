// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider and event files.
//!
//! A provider file is TOML holding a [`ProviderInstance`]. Secrets and PEM
//! material may be kept in separate files and referenced with the `*_file`
//! keys; relative paths are resolved against the provider file's directory.
//!
//! ```toml
//! type = "github"
//! name = "status"
//! namespace = "flux-system"
//! address = "https://github.com/org/repo"
//! commit_status_id = "kustomization/apps"
//! token_file = "github-token"
//! ```

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use notifier_core::{Event, SecretString};
use notifier_providers::{ProviderInstance, TlsSettings};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderFile {
	#[serde(flatten)]
	instance: ProviderInstance,
	token_file: Option<PathBuf>,
	password_file: Option<PathBuf>,
	ca_file: Option<PathBuf>,
	cert_file: Option<PathBuf>,
	key_file: Option<PathBuf>,
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		base.join(path)
	}
}

fn read_trimmed(base: &Path, path: &Path) -> Result<String> {
	let path = resolve(base, path);
	let contents =
		fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
	Ok(contents.trim_end_matches(['\r', '\n']).to_string())
}

/// Parse a provider file's contents, reading referenced files relative to
/// `base`.
pub fn parse_provider(contents: &str, base: &Path) -> Result<ProviderInstance> {
	let file: ProviderFile = toml::from_str(contents).context("invalid provider file")?;
	let mut instance = file.instance;

	if let Some(path) = &file.token_file {
		if instance.token.non_empty().is_some() {
			bail!("token and token_file are mutually exclusive");
		}
		instance.token = SecretString::from(read_trimmed(base, path)?);
	}
	if let Some(path) = &file.password_file {
		if instance.password.non_empty().is_some() {
			bail!("password and password_file are mutually exclusive");
		}
		instance.password = SecretString::from(read_trimmed(base, path)?);
	}

	if file.ca_file.is_some() || file.cert_file.is_some() || file.key_file.is_some() {
		let mut tls = instance.tls.take().unwrap_or_default();
		if let Some(path) = &file.ca_file {
			tls.ca_pem = Some(read_trimmed(base, path)?);
		}
		if let Some(path) = &file.cert_file {
			tls.cert_pem = Some(read_trimmed(base, path)?);
		}
		if let Some(path) = &file.key_file {
			tls.key_pem = Some(SecretString::from(read_trimmed(base, path)?));
		}
		instance.tls = Some(tls);
	}

	validate_tls(instance.tls.as_ref())?;

	if instance.provider_type.trim().is_empty() {
		bail!("provider file is missing 'type'");
	}
	Ok(instance)
}

fn validate_tls(tls: Option<&TlsSettings>) -> Result<()> {
	match tls {
		Some(t) if t.cert_pem.is_some() != t.key_pem.is_some() => {
			bail!("a client certificate and its key must be given together")
		}
		_ => Ok(()),
	}
}

pub fn load_provider(path: &Path) -> Result<ProviderInstance> {
	let contents =
		fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
	let base = path.parent().unwrap_or_else(|| Path::new("."));
	parse_provider(&contents, base).with_context(|| format!("loading provider {}", path.display()))
}

/// Read an event as JSON from a file, or from stdin when the path is `-`.
pub fn load_event(path: &Path) -> Result<Event> {
	let contents = if path == Path::new("-") {
		let mut buf = String::new();
		std::io::stdin().read_to_string(&mut buf).context("failed to read event from stdin")?;
		buf
	} else {
		fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
	};
	serde_json::from_str(&contents).context("invalid event JSON")
}
