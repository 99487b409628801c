// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy for key handling, group and policy stores, and decisions.
//!
//! A denied request is not an error: [`crate::Decision::Deny`] is returned as
//! a value. [`AuthError::Unauthorized`] only appears at the identity façade,
//! where a deny has to be reported to a caller that asked for "verify or fail".

use thiserror::Error;

/// Errors raised by the identity and access-control core.
#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Input Errors
	// =========================================================================
	/// The supplied entity has an invalid shape.
	#[error("malformed entity: {0}")]
	MalformedEntity(String),

	/// An entity with the same ID, name or policy tuple already exists.
	#[error("conflict: {0}")]
	Conflict(String),

	/// The referenced group, policy, key or principal does not exist.
	#[error("not found: {0}")]
	NotFound(String),

	/// The group still has children or members and cannot be removed.
	#[error("group {group_id} has dependents: {children} children, {members} members")]
	HasDependents {
		group_id: String,
		children: usize,
		members: usize,
	},

	// =========================================================================
	// Key Errors
	// =========================================================================
	/// The token failed signature, issuer or type validation.
	#[error("malformed token: {0}")]
	MalformedToken(String),

	/// The token's `exp` claim is in the past.
	#[error("token expired")]
	Expired,

	/// The key could not be signed.
	#[error("signing error: {0}")]
	SigningError(String),

	// =========================================================================
	// Decision Errors
	// =========================================================================
	/// The caller could not be identified from the presented token.
	#[error("unauthenticated: {0}")]
	Unauthenticated(String),

	/// The caller is identified but policy denies the request.
	#[error("unauthorized")]
	Unauthorized,

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	/// A cycle or an over-long chain was found in stored group data.
	#[error("corrupt group hierarchy at {group_id}: {reason}")]
	CorruptHierarchy { group_id: String, reason: String },

	/// The caller's deadline passed or the request was cancelled.
	#[error("deadline exceeded")]
	DeadlineExceeded,

	/// The backing store could not be reached.
	#[error("store unavailable: {0}")]
	StoreUnavailable(String),
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AuthError::StoreUnavailable(_)
				| AuthError::CorruptHierarchy { .. }
				| AuthError::SigningError(_)
		)
	}

	/// Returns true if a transport layer may retry the call unchanged.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			AuthError::StoreUnavailable(_) | AuthError::DeadlineExceeded
		)
	}

	/// Returns the HTTP status code a transport layer should use.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::MalformedEntity(_) => 400,

			AuthError::MalformedToken(_) | AuthError::Expired | AuthError::Unauthenticated(_) => 401,

			AuthError::Unauthorized => 403,

			AuthError::NotFound(_) => 404,

			AuthError::Conflict(_) => 409,

			AuthError::HasDependents { .. } => 422,

			AuthError::SigningError(_) | AuthError::CorruptHierarchy { .. } => 500,

			AuthError::StoreUnavailable(_) => 503,

			AuthError::DeadlineExceeded => 504,
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decision_level_errors_are_not_internal() {
		assert!(!AuthError::Unauthorized.is_internal());
		assert!(!AuthError::Unauthenticated("bad".into()).is_internal());
		assert!(!AuthError::Expired.is_internal());
	}

	#[test]
	fn faults_are_internal() {
		assert!(AuthError::StoreUnavailable("down".into()).is_internal());
		assert!(AuthError::CorruptHierarchy {
			group_id: "g".into(),
			reason: "cycle".into()
		}
		.is_internal());
	}

	#[test]
	fn only_transient_errors_are_retryable() {
		assert!(AuthError::DeadlineExceeded.is_retryable());
		assert!(AuthError::StoreUnavailable("down".into()).is_retryable());
		assert!(!AuthError::Conflict("dup".into()).is_retryable());
		assert!(!AuthError::Unauthorized.is_retryable());
	}

	#[test]
	fn status_codes() {
		assert_eq!(AuthError::MalformedEntity("x".into()).status_code(), 400);
		assert_eq!(AuthError::Expired.status_code(), 401);
		assert_eq!(AuthError::Unauthorized.status_code(), 403);
		assert_eq!(AuthError::NotFound("g".into()).status_code(), 404);
		assert_eq!(AuthError::Conflict("g".into()).status_code(), 409);
		assert_eq!(
			AuthError::HasDependents {
				group_id: "g".into(),
				children: 1,
				members: 0
			}
			.status_code(),
			422
		);
		assert_eq!(AuthError::DeadlineExceeded.status_code(), 504);
	}

	#[test]
	fn has_dependents_message_names_counts() {
		let err = AuthError::HasDependents {
			group_id: "ops".into(),
			children: 2,
			members: 3,
		};
		assert_eq!(
			err.to_string(),
			"group ops has dependents: 2 children, 3 members"
		);
	}
}
