// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy definitions and the policy repository contract.
//!
//! A [`PolicyDef`] is one grant: "`subject_type:subject_id` may `action` on
//! `object_type:object_id`". The `(subject, object, action)` tuple is unique
//! within a store.

mod memory;

pub use memory::InMemoryPolicyStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::types::{ObjectRef, PolicyId, SubjectType};

/// A single grant statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDef {
	pub id: PolicyId,
	pub subject_id: String,
	pub subject_type: SubjectType,
	pub object_type: String,
	pub object_id: String,
	pub action: String,
}

impl PolicyDef {
	pub fn new(
		subject_type: SubjectType,
		subject_id: impl Into<String>,
		object: ObjectRef,
		action: impl Into<String>,
	) -> Self {
		Self {
			id: PolicyId::generate(),
			subject_id: subject_id.into(),
			subject_type,
			object_type: object.object_type,
			object_id: object.object_id,
			action: action.into(),
		}
	}

	pub fn with_id(mut self, id: impl Into<PolicyId>) -> Self {
		self.id = id.into();
		self
	}

	pub fn object(&self) -> ObjectRef {
		ObjectRef::new(self.object_type.clone(), self.object_id.clone())
	}

	pub fn validate(&self) -> Result<()> {
		let missing = [
			("id", self.id.as_str()),
			("subject_id", self.subject_id.as_str()),
			("object_type", self.object_type.as_str()),
			("object_id", self.object_id.as_str()),
			("action", self.action.as_str()),
		]
		.into_iter()
		.find(|(_, value)| value.is_empty());

		match missing {
			Some((field, _)) => Err(AuthError::MalformedEntity(format!(
				"policy {field} is empty"
			))),
			None => Ok(()),
		}
	}

	pub(crate) fn tuple(&self) -> PolicyTuple {
		PolicyTuple {
			subject_id: self.subject_id.clone(),
			subject_type: self.subject_type,
			object_type: self.object_type.clone(),
			object_id: self.object_id.clone(),
			action: self.action.clone(),
		}
	}
}

/// The uniqueness key of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PolicyTuple {
	subject_id: String,
	subject_type: SubjectType,
	object_type: String,
	object_id: String,
	action: String,
}

/// Selects the policies held by one subject, optionally narrowed to one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyQuery {
	pub subject_id: String,
	pub subject_type: SubjectType,
	pub object: Option<ObjectRef>,
}

impl PolicyQuery {
	pub fn for_subject(subject_type: SubjectType, subject_id: impl Into<String>) -> Self {
		Self {
			subject_id: subject_id.into(),
			subject_type,
			object: None,
		}
	}

	pub fn on_object(mut self, object: ObjectRef) -> Self {
		self.object = Some(object);
		self
	}

	fn matches_object(&self, policy: &PolicyDef) -> bool {
		match &self.object {
			Some(object) => {
				object.object_type == policy.object_type && object.object_id == policy.object_id
			}
			None => true,
		}
	}
}

/// Policies of one subject, grouped as object type → object id → grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySet {
	entries: HashMap<String, HashMap<String, Vec<PolicyDef>>>,
}

impl PolicySet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, policy: PolicyDef) {
		self.entries
			.entry(policy.object_type.clone())
			.or_default()
			.entry(policy.object_id.clone())
			.or_default()
			.push(policy);
	}

	/// Grants on `object`, in no particular order.
	pub fn on(&self, object: &ObjectRef) -> &[PolicyDef] {
		self.entries
			.get(&object.object_type)
			.and_then(|ids| ids.get(&object.object_id))
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	/// The grant permitting `action` on `object`, if any.
	pub fn grant_for(&self, object: &ObjectRef, action: &str) -> Option<&PolicyDef> {
		self.on(object).iter().find(|p| p.action == action)
	}

	pub fn allows(&self, object: &ObjectRef, action: &str) -> bool {
		self.grant_for(object, action).is_some()
	}

	pub fn object_types(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = &PolicyDef> {
		self.entries.values().flat_map(|ids| ids.values().flatten())
	}

	pub fn len(&self) -> usize {
		self.iter().count()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl FromIterator<PolicyDef> for PolicySet {
	fn from_iter<I: IntoIterator<Item = PolicyDef>>(iter: I) -> Self {
		let mut set = PolicySet::new();
		for policy in iter {
			set.insert(policy);
		}
		set
	}
}

/// Repository contract for policies.
///
/// The subject index must change in the same critical section as the
/// primary records.
#[async_trait]
pub trait PolicyStore: Send + Sync {
	/// Insert a policy. `Conflict` if the ID or the tuple already exists.
	async fn save_policy(&self, policy: PolicyDef) -> Result<PolicyDef>;

	/// Every policy held by the queried subject.
	async fn retrieve_policy(&self, query: &PolicyQuery) -> Result<PolicySet>;

	/// Remove the policy with the same tuple as `policy`.
	async fn remove_policy(&self, policy: &PolicyDef) -> Result<()>;

	/// Remove every policy held by one subject, returning how many were
	/// removed. A subject without policies is not an error.
	async fn remove_subject_policies(
		&self,
		subject_type: SubjectType,
		subject_id: &str,
	) -> Result<usize>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grant(subject: &str, object: &str, action: &str) -> PolicyDef {
		PolicyDef::new(SubjectType::User, subject, object.parse().unwrap(), action)
	}

	#[test]
	fn empty_fields_are_malformed() {
		let mut policy = grant("u1", "channel:1", "publish");
		assert!(policy.validate().is_ok());
		policy.action.clear();
		assert!(matches!(
			policy.validate(),
			Err(AuthError::MalformedEntity(msg)) if msg.contains("action")
		));
	}

	#[test]
	fn tuple_ignores_id() {
		let a = grant("u1", "channel:1", "publish").with_id("p1");
		let b = grant("u1", "channel:1", "publish").with_id("p2");
		assert_eq!(a.tuple(), b.tuple());
		assert_ne!(a.tuple(), grant("u1", "channel:1", "subscribe").tuple());
	}

	#[test]
	fn set_lookup_by_object_and_action() {
		let set: PolicySet = [
			grant("u1", "channel:1", "publish"),
			grant("u1", "channel:1", "subscribe"),
			grant("u1", "thing:7", "read"),
		]
		.into_iter()
		.collect();

		let channel = ObjectRef::new("channel", "1");
		assert!(set.allows(&channel, "publish"));
		assert!(set.allows(&channel, "subscribe"));
		assert!(!set.allows(&channel, "delete"));
		assert!(!set.allows(&ObjectRef::new("channel", "2"), "publish"));
		assert_eq!(set.on(&channel).len(), 2);
		assert_eq!(set.len(), 3);

		let mut types: Vec<_> = set.object_types().collect();
		types.sort_unstable();
		assert_eq!(types, vec!["channel", "thing"]);
	}

	#[test]
	fn query_object_filter() {
		let query = PolicyQuery::for_subject(SubjectType::User, "u1")
			.on_object(ObjectRef::new("channel", "1"));
		assert!(query.matches_object(&grant("u1", "channel:1", "publish")));
		assert!(!query.matches_object(&grant("u1", "channel:2", "publish")));
		assert!(PolicyQuery::for_subject(SubjectType::User, "u1")
			.matches_object(&grant("u1", "channel:2", "publish")));
	}
}
