// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signing and validation of identity tokens.
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256 under a single
//! shared secret. The claims set is fixed:
//!
//! | claim       | meaning                                  |
//! |-------------|------------------------------------------|
//! | `iss`       | always [`KEY_ISSUER`]                    |
//! | `sub`       | subject (user ID or email)               |
//! | `iat`       | issued-at, seconds since epoch           |
//! | `exp`       | expiry; absent or `0` never expires      |
//! | `jti`       | key ID, if any                           |
//! | `issuer_id` | principal that requested the key         |
//! | `email`     | optional email of the subject            |
//! | `type`      | [`KeyType`] discriminant                 |

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use warden_common_secret::SecretString;

use crate::error::{AuthError, Result};
use crate::key::{Key, KeyRequest, KeyType};
use crate::types::KeyId;

/// Issuer stamped into and required on every token.
pub const KEY_ISSUER: &str = "warden.auth";

/// Latest expiry a key may carry: 9999-12-31T23:59:59Z.
pub const MAX_EXPIRY_TIMESTAMP: i64 = 253_402_300_799;

#[derive(Debug, Serialize, Deserialize)]
struct KeyClaims {
	#[serde(default)]
	iss: String,
	#[serde(default)]
	sub: String,
	#[serde(default)]
	iat: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	exp: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	jti: Option<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	issuer_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	email: Option<String>,
	#[serde(default, rename = "type")]
	key_type: Option<u32>,
}

/// Turns key requests into signed tokens and tokens back into keys.
pub trait Tokenizer: Send + Sync {
	/// Sign `request`, returning the resulting key alongside its token.
	fn issue_key(&self, request: &KeyRequest) -> Result<(Key, String)>;

	/// Sign `request`.
	fn issue(&self, request: &KeyRequest) -> Result<String> {
		self.issue_key(request).map(|(_, token)| token)
	}

	/// Validate `token` and return the key it carries.
	fn parse(&self, token: &str) -> Result<Key>;
}

/// HS256 tokenizer over a shared secret.
#[derive(Clone)]
pub struct HmacTokenizer {
	secret: SecretString,
}

impl std::fmt::Debug for HmacTokenizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HmacTokenizer")
			.field("secret", &self.secret)
			.finish()
	}
}

impl HmacTokenizer {
	pub fn new(secret: impl Into<SecretString>) -> Self {
		Self {
			secret: secret.into(),
		}
	}

	fn require_secret(&self) -> Result<&[u8]> {
		if self.secret.is_blank() {
			return Err(AuthError::SigningError("signing secret is empty".into()));
		}
		Ok(self.secret.as_bytes())
	}

	fn validation() -> Validation {
		let mut validation = Validation::new(Algorithm::HS256);
		// iss, type and exp are checked against our own rules below.
		validation.required_spec_claims.clear();
		validation.validate_exp = false;
		validation.validate_nbf = false;
		validation.validate_aud = false;
		validation
	}

	/// Validate `token` as of `now`.
	#[instrument(skip(self, token))]
	pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<Key> {
		let secret = self.require_secret()?;
		let data = decode::<KeyClaims>(token, &DecodingKey::from_secret(secret), &Self::validation())
			.map_err(|e| match e.kind() {
				ErrorKind::ExpiredSignature => AuthError::Expired,
				_ => AuthError::MalformedToken(e.to_string()),
			})?;
		let claims = data.claims;

		if claims.iss != KEY_ISSUER {
			return Err(AuthError::MalformedToken(format!(
				"unexpected issuer '{}'",
				claims.iss
			)));
		}
		let key_type = match claims.key_type {
			Some(raw) => KeyType::try_from(raw)?,
			None => return Err(AuthError::MalformedToken("missing key type".into())),
		};
		if claims.sub.is_empty() {
			return Err(AuthError::MalformedToken("missing subject".into()));
		}

		let issued_at = from_timestamp(claims.iat)?;
		let expires_at = match claims.exp {
			None | Some(0) => None,
			Some(exp) => Some(from_timestamp(exp)?),
		};

		let key = Key::from_parts(
			claims.jti.map(KeyId::new),
			claims.issuer_id,
			claims.sub,
			claims.email,
			key_type,
			issued_at,
			expires_at,
		);
		if key.is_expired_at(now) {
			debug!(subject = %key.subject(), key_type = %key_type, "rejected expired key");
			return Err(AuthError::Expired);
		}
		Ok(key)
	}
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
	Utc.timestamp_opt(secs, 0)
		.single()
		.ok_or_else(|| AuthError::MalformedToken(format!("timestamp {secs} out of range")))
}

impl Tokenizer for HmacTokenizer {
	#[instrument(skip(self, request), fields(subject = %request.subject))]
	fn issue_key(&self, request: &KeyRequest) -> Result<(Key, String)> {
		let secret = self.require_secret()?;
		let key_type = request
			.key_type
			.ok_or_else(|| AuthError::SigningError("key type is required".into()))?;
		if request.subject.is_empty() {
			return Err(AuthError::SigningError("subject is required".into()));
		}

		let key = Key::from_parts(
			request.id.clone(),
			request.issuer_id.clone(),
			request.subject.clone(),
			request.email.clone(),
			key_type,
			request.issued_at,
			request.expires_at,
		);
		// `exp` of 0 means "never expires", so a real expiry must be after it.
		if let Some(expires_at) = key.expires_at() {
			let exp = expires_at.timestamp();
			if exp <= 0 {
				return Err(AuthError::SigningError(format!(
					"expiry {expires_at} is not after the Unix epoch"
				)));
			}
			if exp > MAX_EXPIRY_TIMESTAMP {
				return Err(AuthError::SigningError(format!(
					"expiry {expires_at} is out of range"
				)));
			}
		}

		let claims = KeyClaims {
			iss: KEY_ISSUER.to_string(),
			sub: key.subject().to_string(),
			iat: key.issued_at().timestamp(),
			exp: key.expires_at().map(|t| t.timestamp()),
			jti: key.id().map(|id| id.to_string()),
			issuer_id: key.issuer_id().to_string(),
			email: key.email().map(str::to_string),
			key_type: Some(key_type.as_u32()),
		};

		let token = encode(
			&Header::new(Algorithm::HS256),
			&claims,
			&EncodingKey::from_secret(secret),
		)
		.map_err(|e| AuthError::SigningError(format!("failed to encode token: {e}")))?;

		debug!(key_type = %key_type, exp = ?claims.exp, "issued key");
		Ok((key, token))
	}

	fn parse(&self, token: &str) -> Result<Key> {
		self.parse_at(token, Utc::now())
	}
}
