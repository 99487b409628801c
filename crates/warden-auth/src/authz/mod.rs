// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decisions.
//!
//! A request is allowed when the subject holds a direct grant, or when any
//! group the subject belongs to, or any ancestor of such a group, holds one.
//! Anything else is a [`Decision::Deny`], which is a normal return value.

mod engine;

pub use engine::AuthorizationEngine;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{GroupId, ObjectRef, PolicyId, SubjectType};

/// "May `subject` perform `action` on `object`?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeRequest {
	pub subject: String,
	pub subject_type: SubjectType,
	pub object: ObjectRef,
	pub action: String,
}

impl AuthorizeRequest {
	/// A request on behalf of a user.
	pub fn new(subject: impl Into<String>, object: ObjectRef, action: impl Into<String>) -> Self {
		Self {
			subject: subject.into(),
			subject_type: SubjectType::User,
			object,
			action: action.into(),
		}
	}

	pub fn with_subject_type(mut self, subject_type: SubjectType) -> Self {
		self.subject_type = subject_type;
		self
	}
}

/// Why a request was allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Grant {
	/// The subject holds the policy itself.
	Direct { policy_id: PolicyId },
	/// The policy is held by `group_id`, which the subject belongs to either
	/// directly or through a descendant group.
	Group {
		group_id: GroupId,
		policy_id: PolicyId,
	},
}

impl Grant {
	pub fn policy_id(&self) -> &PolicyId {
		match self {
			Grant::Direct { policy_id } | Grant::Group { policy_id, .. } => policy_id,
		}
	}
}

impl fmt::Display for Grant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Grant::Direct { policy_id } => write!(f, "direct policy {policy_id}"),
			Grant::Group {
				group_id,
				policy_id,
			} => write!(f, "policy {policy_id} via group {group_id}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
	Allow(Grant),
	Deny,
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow(_))
	}

	pub fn grant(&self) -> Option<&Grant> {
		match self {
			Decision::Allow(grant) => Some(grant),
			Decision::Deny => None,
		}
	}
}

impl fmt::Display for Decision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Decision::Allow(grant) => write!(f, "allow ({grant})"),
			Decision::Deny => write!(f, "deny"),
		}
	}
}

/// Anything that can answer an [`AuthorizeRequest`].
#[async_trait]
pub trait Authorizer: Send + Sync {
	async fn authorize(&self, ctx: &RequestContext, request: &AuthorizeRequest)
		-> Result<Decision>;
}
