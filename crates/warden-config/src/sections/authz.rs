// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decision configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_DECISION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthzConfigLayer {
	pub decision_timeout_ms: Option<u64>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.decision_timeout_ms.is_some() {
			self.decision_timeout_ms = other.decision_timeout_ms;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			decision_timeout_ms: self
				.decision_timeout_ms
				.unwrap_or(DEFAULT_DECISION_TIMEOUT_MS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthzConfig {
	/// Upper bound for one decision when the caller supplies no deadline.
	pub decision_timeout_ms: u64,
}

impl AuthzConfig {
	pub fn decision_timeout(&self) -> Duration {
		Duration::from_millis(self.decision_timeout_ms)
	}
}

impl Default for AuthzConfig {
	fn default() -> Self {
		AuthzConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_timeout() {
		assert_eq!(
			AuthzConfig::default().decision_timeout(),
			Duration::from_secs(5)
		);
	}

	#[test]
	fn merge_and_finalize() {
		let mut layer = AuthzConfigLayer::default();
		layer.merge(AuthzConfigLayer {
			decision_timeout_ms: Some(250),
		});
		assert_eq!(layer.finalize().decision_timeout_ms, 250);
	}
}
