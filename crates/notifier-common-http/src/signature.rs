// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HMAC-SHA256 request body signing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::HttpError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Compute the hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn compute_hmac_sha256(secret: &[u8], payload: &[u8]) -> Result<String, HttpError> {
	let mut mac = HmacSha256::new_from_slice(secret)
		.map_err(|e| HttpError::Config(format!("invalid HMAC key: {e}")))?;
	mac.update(payload);
	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex-encoded signature (no prefix) in constant time.
pub fn verify_hmac_sha256(secret: &[u8], payload: &[u8], signature: &str) -> bool {
	let Ok(expected) = hex::decode(signature) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};
	mac.update(payload);
	mac.verify_slice(&expected).is_ok()
}

/// The `X-Signature` header value: `sha256=<hex>`.
pub fn signature_header_value(secret: &[u8], payload: &[u8]) -> Result<String, HttpError> {
	Ok(format!("sha256={}", compute_hmac_sha256(secret, payload)?))
}
