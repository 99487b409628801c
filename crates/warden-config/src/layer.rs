// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{AuthzConfigLayer, LoggingConfigLayer, TokenConfigLayer};

/// One source's view of the configuration; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WardenConfigLayer {
	#[serde(default)]
	pub tokens: Option<TokenConfigLayer>,
	#[serde(default)]
	pub authz: Option<AuthzConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl WardenConfigLayer {
	/// Merge another layer into this one. `other` takes precedence.
	pub fn merge(&mut self, other: WardenConfigLayer) {
		merge_option(&mut self.tokens, other.tokens, TokenConfigLayer::merge);
		merge_option(&mut self.authz, other.authz, AuthzConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		_ => {}
	}
}
