// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group hierarchy and membership.
//!
//! Groups form a forest: a group without a parent is a root. Names are unique
//! within a store. A principal may be a member of any number of groups, and
//! because grants flow upward a member of a group also counts as a principal
//! of every ancestor of that group (see [`crate::AuthorizationEngine`]).

mod memory;

pub use memory::InMemoryGroupStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::types::GroupId;

/// Free-form group metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A node in the group forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub owner_id: String,
	/// `None` marks a root.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<GroupId>,
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub metadata: Metadata,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Group {
	/// A new root group with a generated ID.
	pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: GroupId::generate(),
			owner_id: owner_id.into(),
			parent_id: None,
			name: name.into(),
			description: String::new(),
			metadata: Metadata::new(),
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_id(mut self, id: impl Into<GroupId>) -> Self {
		self.id = id.into();
		self
	}

	pub fn with_parent(mut self, parent_id: impl Into<GroupId>) -> Self {
		self.parent_id = Some(parent_id.into());
		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn with_metadata(mut self, metadata: Metadata) -> Self {
		self.metadata = metadata;
		self
	}

	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	/// Checks shape only; existence of the parent is the store's concern.
	pub fn validate(&self) -> Result<()> {
		if self.id.is_empty() {
			return Err(AuthError::MalformedEntity("group id is empty".into()));
		}
		if self.name.trim().is_empty() {
			return Err(AuthError::MalformedEntity("group name is empty".into()));
		}
		if self.parent_id.as_ref() == Some(&self.id) {
			return Err(AuthError::MalformedEntity(format!(
				"group {} cannot be its own parent",
				self.id
			)));
		}
		Ok(())
	}
}

/// Repository contract for groups and memberships.
///
/// Implementations must keep the group→members and member→groups indices
/// consistent: every mutation updates both or neither.
#[async_trait]
pub trait GroupStore: Send + Sync {
	/// Insert a new group. `Conflict` on duplicate ID or name, `NotFound` if
	/// the parent does not exist.
	async fn save(&self, group: Group) -> Result<Group>;

	/// Replace description, metadata and parent. Name, owner and ID are
	/// immutable; a parent that would create a cycle is rejected.
	async fn update(&self, group: Group) -> Result<Group>;

	/// Remove a group. Fails with `HasDependents` while it has children or
	/// members.
	///
	/// Policies held by the group live in the policy store and are left in
	/// place; a group saved later under the same ID would hold them again.
	/// Use [`crate::AuthorizationEngine::delete_group`] to remove both.
	async fn delete(&self, id: &GroupId) -> Result<()>;

	async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group>;

	async fn retrieve_by_name(&self, name: &str) -> Result<Group>;

	/// Direct children in insertion order.
	async fn retrieve_all_children(&self, id: &GroupId) -> Result<Vec<Group>>;

	/// Ancestors from the immediate parent up to the root.
	async fn retrieve_all_parents(&self, id: &GroupId) -> Result<Vec<Group>>;

	/// Every descendant in breadth-first order, excluding `id` itself.
	async fn retrieve_descendants(&self, id: &GroupId) -> Result<Vec<Group>>;

	/// Idempotently add `member_id` to the group.
	async fn assign(&self, member_id: &str, group_id: &GroupId) -> Result<()>;

	/// Remove `member_id` from the group. Removing a non-member is a no-op.
	async fn unassign(&self, member_id: &str, group_id: &GroupId) -> Result<()>;

	/// Groups `member_id` is directly assigned to.
	async fn memberships(&self, member_id: &str) -> Result<Vec<Group>>;

	/// Direct members of the group.
	async fn members(&self, group_id: &GroupId) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_group_is_root() {
		let group = Group::new("owner@example.com", "ops");
		assert!(group.is_root());
		assert!(group.validate().is_ok());
		assert_eq!(group.created_at, group.updated_at);
	}

	#[test]
	fn blank_name_is_malformed() {
		let group = Group::new("owner", "   ");
		assert!(matches!(
			group.validate(),
			Err(AuthError::MalformedEntity(_))
		));
	}

	#[test]
	fn self_parent_is_malformed() {
		let group = Group::new("owner", "loop").with_id("g1").with_parent("g1");
		assert!(matches!(
			group.validate(),
			Err(AuthError::MalformedEntity(_))
		));
	}

	#[test]
	fn serde_omits_root_parent() {
		let group = Group::new("owner", "root").with_id("g1");
		let json = serde_json::to_value(&group).unwrap();
		assert!(json.get("parent_id").is_none());
		assert_eq!(json["id"], "g1");
	}
}
