// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keys: the claims carried by a signed identity token.
//!
//! Callers describe the key they want with a [`KeyRequest`]; only the
//! [`crate::Tokenizer`] turns that into a [`Key`], either at issue time or
//! from verified claims at parse time. A `Key` is immutable after that.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::KeyId;

/// Privilege class of a key. The wire value is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum KeyType {
	/// Short-lived key issued at login.
	UserKey = 0,
	/// Long-lived key issued by a user for programmatic access.
	ApiKey = 1,
	/// Short-lived key used only for account recovery.
	RecoveryKey = 2,
}

impl KeyType {
	/// Largest valid wire value.
	pub const MAX: u32 = KeyType::RecoveryKey as u32;

	pub fn all() -> &'static [KeyType] {
		&[KeyType::UserKey, KeyType::ApiKey, KeyType::RecoveryKey]
	}

	pub fn as_u32(self) -> u32 {
		self as u32
	}
}

impl TryFrom<u32> for KeyType {
	type Error = AuthError;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(KeyType::UserKey),
			1 => Ok(KeyType::ApiKey),
			2 => Ok(KeyType::RecoveryKey),
			other => Err(AuthError::MalformedToken(format!(
				"key type {other} exceeds maximum {}",
				KeyType::MAX
			))),
		}
	}
}

impl fmt::Display for KeyType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			KeyType::UserKey => write!(f, "user"),
			KeyType::ApiKey => write!(f, "api"),
			KeyType::RecoveryKey => write!(f, "recovery"),
		}
	}
}

/// Claims a caller asks to have signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
	pub id: Option<KeyId>,
	pub issuer_id: String,
	pub subject: String,
	pub email: Option<String>,
	/// Required; issuing without a type fails with `SigningError`.
	pub key_type: Option<KeyType>,
	pub issued_at: DateTime<Utc>,
	/// `None` means the key never expires.
	pub expires_at: Option<DateTime<Utc>>,
}

impl KeyRequest {
	/// A request for `subject` issued now, with no type and no expiry.
	pub fn new(subject: impl Into<String>) -> Self {
		Self {
			id: None,
			issuer_id: String::new(),
			subject: subject.into(),
			email: None,
			key_type: None,
			issued_at: Utc::now(),
			expires_at: None,
		}
	}

	pub fn with_type(mut self, key_type: KeyType) -> Self {
		self.key_type = Some(key_type);
		self
	}

	pub fn with_id(mut self, id: KeyId) -> Self {
		self.id = Some(id);
		self
	}

	pub fn with_issuer(mut self, issuer_id: impl Into<String>) -> Self {
		self.issuer_id = issuer_id.into();
		self
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
		self.issued_at = at;
		self
	}

	pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
		self.expires_at = Some(at);
		self
	}

	/// Expire `ttl` after `issued_at`. A lifetime past the end of the
	/// calendar saturates to `DateTime::<Utc>::MAX_UTC`, which the tokenizer
	/// refuses to sign.
	pub fn expires_in(mut self, ttl: Duration) -> Self {
		let expires_at = chrono::Duration::from_std(ttl)
			.ok()
			.and_then(|ttl| self.issued_at.checked_add_signed(ttl))
			.unwrap_or(DateTime::<Utc>::MAX_UTC);
		self.expires_at = Some(expires_at);
		self
	}
}

/// A validated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Key {
	id: Option<KeyId>,
	issuer_id: String,
	subject: String,
	email: Option<String>,
	key_type: KeyType,
	issued_at: DateTime<Utc>,
	expires_at: Option<DateTime<Utc>>,
}

impl Key {
	/// Build a key from validated parts. Timestamps are truncated to whole
	/// seconds, the resolution of the wire format.
	pub(crate) fn from_parts(
		id: Option<KeyId>,
		issuer_id: String,
		subject: String,
		email: Option<String>,
		key_type: KeyType,
		issued_at: DateTime<Utc>,
		expires_at: Option<DateTime<Utc>>,
	) -> Self {
		Self {
			id,
			issuer_id,
			subject,
			email,
			key_type,
			issued_at: issued_at.trunc_subsecs(0),
			expires_at: expires_at.map(|t| t.trunc_subsecs(0)),
		}
	}

	pub fn id(&self) -> Option<&KeyId> {
		self.id.as_ref()
	}

	pub fn issuer_id(&self) -> &str {
		&self.issuer_id
	}

	pub fn subject(&self) -> &str {
		&self.subject
	}

	pub fn email(&self) -> Option<&str> {
		self.email.as_deref()
	}

	pub fn key_type(&self) -> KeyType {
		self.key_type
	}

	pub fn issued_at(&self) -> DateTime<Utc> {
		self.issued_at
	}

	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expires_at
	}

	/// A key expires at `expires_at`; keys without expiry never do.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|exp| now >= exp)
	}
}
