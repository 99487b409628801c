// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key issuance configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_common_secret::SecretString;

const DEFAULT_USER_KEY_TTL_SECS: u64 = 10 * 60 * 60;
const DEFAULT_RECOVERY_KEY_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenConfigLayer {
	pub secret: Option<SecretString>,
	pub user_key_ttl_secs: Option<u64>,
	pub recovery_key_ttl_secs: Option<u64>,
	pub api_key_ttl_secs: Option<u64>,
}

impl TokenConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.secret.is_some() {
			self.secret = other.secret;
		}
		if other.user_key_ttl_secs.is_some() {
			self.user_key_ttl_secs = other.user_key_ttl_secs;
		}
		if other.recovery_key_ttl_secs.is_some() {
			self.recovery_key_ttl_secs = other.recovery_key_ttl_secs;
		}
		if other.api_key_ttl_secs.is_some() {
			self.api_key_ttl_secs = other.api_key_ttl_secs;
		}
	}

	pub fn finalize(self) -> TokenConfig {
		TokenConfig {
			secret: self.secret,
			user_key_ttl_secs: self.user_key_ttl_secs.unwrap_or(DEFAULT_USER_KEY_TTL_SECS),
			recovery_key_ttl_secs: self
				.recovery_key_ttl_secs
				.unwrap_or(DEFAULT_RECOVERY_KEY_TTL_SECS),
			api_key_ttl_secs: self.api_key_ttl_secs,
		}
	}
}

/// Resolved key issuance settings.
///
/// `secret` stays optional here; commands that neither issue nor parse keys
/// can run without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenConfig {
	pub secret: Option<SecretString>,
	pub user_key_ttl_secs: u64,
	pub recovery_key_ttl_secs: u64,
	/// `None` issues API keys without expiry unless the caller asks for one.
	pub api_key_ttl_secs: Option<u64>,
}

impl TokenConfig {
	pub fn user_key_ttl(&self) -> Duration {
		Duration::from_secs(self.user_key_ttl_secs)
	}

	pub fn recovery_key_ttl(&self) -> Duration {
		Duration::from_secs(self.recovery_key_ttl_secs)
	}

	pub fn api_key_ttl(&self) -> Option<Duration> {
		self.api_key_ttl_secs.map(Duration::from_secs)
	}
}

impl Default for TokenConfig {
	fn default() -> Self {
		TokenConfigLayer::default().finalize()
	}
}
