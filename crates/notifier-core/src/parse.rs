// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Git address and revision parsing.

use url::Url;

use crate::error::ParseError;

/// Split a repository URL into `(host, id)`.
///
/// `host` is `scheme://authority` without a path; `id` is the repository
/// path trimmed of slashes, lowercased and stripped of a `.git` suffix.
/// SSH remotes (`ssh://git@host/org/repo` or `git@host:org/repo`) map to an
/// `https` host without the SSH port, since the API lives there.
pub fn parse_git_address(address: &str) -> Result<(String, String), ParseError> {
	let trimmed = address.trim();
	let normalized = normalize_scp_address(trimmed);

	let url = Url::parse(&normalized).map_err(|e| ParseError::InvalidAddress {
		address: address.to_string(),
		reason: e.to_string(),
	})?;

	let host = url.host_str().ok_or_else(|| ParseError::InvalidAddress {
		address: address.to_string(),
		reason: "missing host".to_string(),
	})?;

	let host = match (url.scheme(), url.port()) {
		("ssh", _) => format!("https://{host}"),
		(scheme, Some(port)) => format!("{scheme}://{host}:{port}"),
		(scheme, None) => format!("{scheme}://{host}"),
	};

	let path = url.path().trim_matches('/').to_lowercase();
	let id = path
		.strip_suffix(".git")
		.unwrap_or(&path)
		.trim_end_matches('/')
		.to_string();

	if id.is_empty() {
		return Err(ParseError::MissingPath {
			address: address.to_string(),
		});
	}

	Ok((host, id))
}

/// Rewrite `user@host:path` into `ssh://user@host/path`.
fn normalize_scp_address(address: &str) -> String {
	if address.contains("://") {
		return address.to_string();
	}
	match address.split_once(':') {
		Some((authority, path)) if authority.contains('@') && !path.starts_with("//") => {
			format!("ssh://{authority}/{}", path.trim_start_matches('/'))
		}
		_ => address.to_string(),
	}
}

/// Extract the commit id from an encoded revision.
///
/// Accepted forms, tried in order: `<ref>@sha1:<hex>`, `<ref>@sha256:<hex>`,
/// `sha1:<hex>`, `sha256:<hex>`, the legacy `<branch>/<hex>`, and bare `<hex>`.
pub fn parse_revision(revision: &str) -> Result<String, ParseError> {
	let rev = revision.trim();
	let invalid = || ParseError::InvalidRevision {
		revision: revision.to_string(),
	};

	if let Some((_, digest)) = rev.rsplit_once('@') {
		return strip_digest_algorithm(digest)
			.and_then(hex_commit)
			.ok_or_else(invalid);
	}

	if let Some(hex) = strip_digest_algorithm(rev) {
		return hex_commit(hex).ok_or_else(invalid);
	}

	if let Some((_, hex)) = rev.rsplit_once('/') {
		return hex_commit(hex).ok_or_else(invalid);
	}

	hex_commit(rev).ok_or_else(invalid)
}

fn strip_digest_algorithm(digest: &str) -> Option<&str> {
	digest
		.strip_prefix("sha1:")
		.or_else(|| digest.strip_prefix("sha256:"))
}

fn hex_commit(candidate: &str) -> Option<String> {
	if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
		Some(candidate.to_string())
	} else {
		None
	}
}

/// Split a repository id into exactly `expected` path components.
pub fn split_repo_id(id: &str, expected: usize) -> Result<Vec<String>, ParseError> {
	let parts: Vec<String> = id
		.split('/')
		.filter(|p| !p.is_empty())
		.map(str::to_string)
		.collect();

	if parts.len() != expected {
		return Err(ParseError::RepoIdArity {
			id: id.to_string(),
			expected,
			found: parts.len(),
		});
	}

	Ok(parts)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const SHA: &str = "69b59063470310ebbd88a9156325322a124e55a3";

	#[test]
	fn parses_https_address() {
		let (host, id) = parse_git_address("https://github.com/FluxCD/Flux2.git").unwrap();
		assert_eq!(host, "https://github.com");
		assert_eq!(id, "fluxcd/flux2");
	}

	#[test]
	fn keeps_explicit_port() {
		let (host, id) = parse_git_address("http://gitea.local:3000/org/repo/").unwrap();
		assert_eq!(host, "http://gitea.local:3000");
		assert_eq!(id, "org/repo");
	}

	#[test]
	fn ssh_addresses_map_to_https() {
		let (host, id) = parse_git_address("ssh://git@github.com:22/org/repo.git").unwrap();
		assert_eq!(host, "https://github.com");
		assert_eq!(id, "org/repo");

		let (host, id) = parse_git_address("git@gitlab.com:group/sub/project.git").unwrap();
		assert_eq!(host, "https://gitlab.com");
		assert_eq!(id, "group/sub/project");
	}

	#[test]
	fn rejects_address_without_path() {
		assert!(matches!(
			parse_git_address("https://github.com"),
			Err(ParseError::MissingPath { .. })
		));
		assert!(matches!(
			parse_git_address("https://github.com/.git"),
			Err(ParseError::MissingPath { .. })
		));
	}

	#[test]
	fn rejects_unparseable_address() {
		assert!(matches!(
			parse_git_address("not a url"),
			Err(ParseError::InvalidAddress { .. })
		));
	}

	#[test]
	fn parses_all_revision_forms() {
		assert_eq!(parse_revision(&format!("main@sha1:{SHA}")).unwrap(), SHA);
		assert_eq!(parse_revision(&format!("v1.0@sha256:{SHA}")).unwrap(), SHA);
		assert_eq!(parse_revision(&format!("sha1:{SHA}")).unwrap(), SHA);
		assert_eq!(parse_revision(&format!("feature/x/{SHA}")).unwrap(), SHA);
		assert_eq!(parse_revision(SHA).unwrap(), SHA);
	}

	#[test]
	fn rejects_unrecognized_revisions() {
		for rev in ["", "main", "main@md5:abc", "main@sha1:", "main/", "main/zzz"] {
			assert!(
				matches!(parse_revision(rev), Err(ParseError::InvalidRevision { .. })),
				"{rev} should be rejected"
			);
		}
	}

	#[test]
	fn split_repo_id_checks_arity() {
		assert_eq!(split_repo_id("org/repo", 2).unwrap(), vec!["org", "repo"]);
		assert!(matches!(
			split_repo_id("org/sub/repo", 2),
			Err(ParseError::RepoIdArity {
				expected: 2,
				found: 3,
				..
			})
		));
	}

	proptest! {
		#[test]
		fn revision_roundtrip(
			branch in "[a-z][a-z0-9./_-]{0,20}",
			sha in "[0-9a-f]{7,64}",
			form in 0usize..4,
		) {
			let encoded = match form {
				0 => format!("{branch}@sha1:{sha}"),
				1 => format!("{branch}@sha256:{sha}"),
				2 => format!("{branch}/{sha}"),
				_ => sha.clone(),
			};
			prop_assert_eq!(parse_revision(&encoded).unwrap(), sha);
		}

		#[test]
		fn address_reassembly_is_idempotent(
			host in "[a-z]{1,10}\\.(com|io|org)",
			owner in "[A-Za-z0-9][A-Za-z0-9_-]{0,10}",
			repo in "[A-Za-z0-9][A-Za-z0-9_-]{0,10}",
			suffix in proptest::bool::ANY,
		) {
			let address = format!(
				"https://{host}/{owner}/{repo}{}",
				if suffix { ".git" } else { "" }
			);
			let (h1, id1) = parse_git_address(&address).unwrap();
			let (h2, id2) = parse_git_address(&format!("{h1}/{id1}")).unwrap();
			prop_assert_eq!(h1, h2);
			prop_assert_eq!(id1, id2);
		}
	}
}
