// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes and the subject/object vocabulary shared by the stores.
//!
//! - **ID newtypes** ([`GroupId`], [`PolicyId`], [`KeyId`]) wrap opaque strings
//!   so a group ID can never be passed where a key ID is expected. Freshly
//!   generated IDs are UUID v4 strings, but any non-empty string supplied by a
//!   caller is accepted.
//! - [`SubjectType`] is the closed set of principals a policy can name.
//! - [`ObjectRef`] addresses the thing being accessed as `type:id`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Wrap an existing identifier.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Generate a new random identifier.
			pub fn generate() -> Self {
				Self(Uuid::new_v4().to_string())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn is_empty(&self) -> bool {
				self.0.is_empty()
			}

			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(GroupId, "Unique identifier for a group.");
define_id_type!(PolicyId, "Unique identifier for a policy record.");
define_id_type!(KeyId, "Unique identifier for an issued key (`jti`).");

// =============================================================================
// Subjects
// =============================================================================

/// Kind of principal a policy grants to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
	/// A human user, identified by ID or email.
	User,
	/// A group; the grant applies to every transitive member.
	Group,
	/// A device or other machine identity.
	Thing,
}

impl SubjectType {
	pub fn all() -> &'static [SubjectType] {
		&[SubjectType::User, SubjectType::Group, SubjectType::Thing]
	}
}

impl fmt::Display for SubjectType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SubjectType::User => write!(f, "user"),
			SubjectType::Group => write!(f, "group"),
			SubjectType::Thing => write!(f, "thing"),
		}
	}
}

impl FromStr for SubjectType {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(SubjectType::User),
			"group" => Ok(SubjectType::Group),
			"thing" => Ok(SubjectType::Thing),
			other => Err(AuthError::MalformedEntity(format!(
				"unknown subject type '{other}'"
			))),
		}
	}
}

// =============================================================================
// Objects
// =============================================================================

/// The object of an access request, e.g. `channel:1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
	pub object_type: String,
	pub object_id: String,
}

impl ObjectRef {
	pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
		Self {
			object_type: object_type.into(),
			object_id: object_id.into(),
		}
	}
}

impl fmt::Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.object_type, self.object_id)
	}
}

impl FromStr for ObjectRef {
	type Err = AuthError;

	/// Parses `type:id`. The ID may itself contain `:`; only the first one
	/// separates the type.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.split_once(':') {
			Some((object_type, object_id)) if !object_type.is_empty() && !object_id.is_empty() => {
				Ok(Self::new(object_type, object_id))
			}
			_ => Err(AuthError::MalformedEntity(format!(
				"object '{s}' is not of the form type:id"
			))),
		}
	}
}
