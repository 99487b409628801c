// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`PolicyStore`].

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{PolicyDef, PolicyQuery, PolicySet, PolicyStore, PolicyTuple};
use crate::error::{AuthError, Result};
use crate::types::{PolicyId, SubjectType};

type SubjectKey = (SubjectType, String);

#[derive(Debug, Default)]
struct PolicyTable {
	policies: HashMap<PolicyId, PolicyDef>,
	by_tuple: HashMap<PolicyTuple, PolicyId>,
	by_subject: HashMap<SubjectKey, BTreeSet<PolicyId>>,
}

/// [`PolicyStore`] backed by process memory. The primary map and both
/// indices share one lock.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
	table: RwLock<PolicyTable>,
}

impl InMemoryPolicyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.table.read().await.policies.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
	#[instrument(
		skip(self, policy),
		fields(
			subject = %policy.subject_id,
			object = %policy.object(),
			action = %policy.action
		)
	)]
	async fn save_policy(&self, policy: PolicyDef) -> Result<PolicyDef> {
		policy.validate()?;
		let tuple = policy.tuple();
		let mut table = self.table.write().await;

		if table.policies.contains_key(&policy.id) {
			return Err(AuthError::Conflict(format!("policy id {}", policy.id)));
		}
		if table.by_tuple.contains_key(&tuple) {
			return Err(AuthError::Conflict(format!(
				"{}:{} already may {} on {}",
				policy.subject_type,
				policy.subject_id,
				policy.action,
				policy.object()
			)));
		}

		table.by_tuple.insert(tuple, policy.id.clone());
		table
			.by_subject
			.entry((policy.subject_type, policy.subject_id.clone()))
			.or_default()
			.insert(policy.id.clone());
		table.policies.insert(policy.id.clone(), policy.clone());

		debug!(policy_id = %policy.id, "saved policy");
		Ok(policy)
	}

	async fn retrieve_policy(&self, query: &PolicyQuery) -> Result<PolicySet> {
		let table = self.table.read().await;
		let key = (query.subject_type, query.subject_id.clone());
		let Some(ids) = table.by_subject.get(&key) else {
			return Ok(PolicySet::new());
		};

		Ok(ids
			.iter()
			.filter_map(|id| table.policies.get(id))
			.filter(|policy| query.matches_object(policy))
			.cloned()
			.collect())
	}

	#[instrument(
		skip(self, policy),
		fields(
			subject = %policy.subject_id,
			object = %policy.object(),
			action = %policy.action
		)
	)]
	async fn remove_policy(&self, policy: &PolicyDef) -> Result<()> {
		let tuple = policy.tuple();
		let mut table = self.table.write().await;

		let id = table.by_tuple.remove(&tuple).ok_or_else(|| {
			AuthError::NotFound(format!(
				"policy {}:{} {} on {}",
				policy.subject_type,
				policy.subject_id,
				policy.action,
				policy.object()
			))
		})?;
		let key = (policy.subject_type, policy.subject_id.clone());
		if let Some(ids) = table.by_subject.get_mut(&key) {
			ids.remove(&id);
			if ids.is_empty() {
				table.by_subject.remove(&key);
			}
		}
		table.policies.remove(&id);

		debug!(policy_id = %id, "removed policy");
		Ok(())
	}

	#[instrument(skip_all, fields(subject = %subject_id, subject_type = %subject_type))]
	async fn remove_subject_policies(
		&self,
		subject_type: SubjectType,
		subject_id: &str,
	) -> Result<usize> {
		let mut table = self.table.write().await;
		let Some(ids) = table.by_subject.remove(&(subject_type, subject_id.to_string())) else {
			return Ok(0);
		};

		for id in &ids {
			if let Some(policy) = table.policies.remove(id) {
				table.by_tuple.remove(&policy.tuple());
			}
		}

		debug!(removed = ids.len(), "removed subject policies");
		Ok(ids.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::ObjectRef;
	use std::sync::Arc;

	fn grant(subject_type: SubjectType, subject: &str, object: &str, action: &str) -> PolicyDef {
		PolicyDef::new(subject_type, subject, object.parse().unwrap(), action)
	}

	#[tokio::test]
	async fn duplicate_tuple_conflicts() {
		let store = InMemoryPolicyStore::new();
		store
			.save_policy(grant(SubjectType::User, "u1", "channel:1", "publish"))
			.await
			.unwrap();
		let err = store
			.save_policy(grant(SubjectType::User, "u1", "channel:1", "publish"))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::Conflict(_)));
		assert_eq!(store.len().await, 1);
	}

	#[tokio::test]
	async fn same_tuple_for_other_subject_type_is_distinct() {
		let store = InMemoryPolicyStore::new();
		store
			.save_policy(grant(SubjectType::User, "x", "channel:1", "publish"))
			.await
			.unwrap();
		store
			.save_policy(grant(SubjectType::Group, "x", "channel:1", "publish"))
			.await
			.unwrap();
		assert_eq!(store.len().await, 2);
	}

	#[tokio::test]
	async fn retrieve_groups_by_object() {
		let store = InMemoryPolicyStore::new();
		for (object, action) in [
			("channel:1", "publish"),
			("channel:1", "subscribe"),
			("channel:2", "publish"),
		] {
			store
				.save_policy(grant(SubjectType::User, "u1", object, action))
				.await
				.unwrap();
		}
		store
			.save_policy(grant(SubjectType::User, "u2", "channel:1", "publish"))
			.await
			.unwrap();

		let all = store
			.retrieve_policy(&PolicyQuery::for_subject(SubjectType::User, "u1"))
			.await
			.unwrap();
		assert_eq!(all.len(), 3);
		assert!(all.allows(&ObjectRef::new("channel", "2"), "publish"));

		let narrowed = store
			.retrieve_policy(
				&PolicyQuery::for_subject(SubjectType::User, "u1")
					.on_object(ObjectRef::new("channel", "1")),
			)
			.await
			.unwrap();
		assert_eq!(narrowed.len(), 2);
		assert!(!narrowed.allows(&ObjectRef::new("channel", "2"), "publish"));
	}

	#[tokio::test]
	async fn unknown_subject_is_empty_not_error() {
		let store = InMemoryPolicyStore::new();
		let set = store
			.retrieve_policy(&PolicyQuery::for_subject(SubjectType::Thing, "t1"))
			.await
			.unwrap();
		assert!(set.is_empty());
	}

	#[tokio::test]
	async fn remove_clears_both_indices() {
		let store = InMemoryPolicyStore::new();
		let saved = store
			.save_policy(grant(SubjectType::User, "u1", "channel:1", "publish"))
			.await
			.unwrap();

		// removal matches on the tuple, not the id
		let same_tuple = grant(SubjectType::User, "u1", "channel:1", "publish");
		store.remove_policy(&same_tuple).await.unwrap();

		assert!(store.is_empty().await);
		let set = store
			.retrieve_policy(&PolicyQuery::for_subject(SubjectType::User, "u1"))
			.await
			.unwrap();
		assert!(set.is_empty());
		assert!(matches!(
			store.remove_policy(&saved).await,
			Err(AuthError::NotFound(_))
		));

		// and the tuple can be granted again
		store.save_policy(saved).await.unwrap();
	}

	#[tokio::test]
	async fn remove_subject_policies_leaves_others() {
		let store = InMemoryPolicyStore::new();
		for action in ["publish", "subscribe"] {
			store
				.save_policy(grant(SubjectType::Group, "g1", "channel:1", action))
				.await
				.unwrap();
		}
		store
			.save_policy(grant(SubjectType::User, "g1", "channel:1", "publish"))
			.await
			.unwrap();

		let removed = store
			.remove_subject_policies(SubjectType::Group, "g1")
			.await
			.unwrap();
		assert_eq!(removed, 2);
		assert_eq!(store.len().await, 1);
		assert_eq!(
			store
				.remove_subject_policies(SubjectType::Group, "g1")
				.await
				.unwrap(),
			0
		);

		// the tuple index was cleared too
		store
			.save_policy(grant(SubjectType::Group, "g1", "channel:1", "publish"))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn concurrent_duplicate_saves_admit_one() {
		let store = Arc::new(InMemoryPolicyStore::new());
		let mut handles = Vec::new();
		for _ in 0..16 {
			let store = Arc::clone(&store);
			handles.push(tokio::spawn(async move {
				store
					.save_policy(grant(SubjectType::Group, "g1", "channel:9", "publish"))
					.await
			}));
		}

		let mut saved = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => saved += 1,
				Err(AuthError::Conflict(_)) => {}
				Err(other) => panic!("unexpected error: {other}"),
			}
		}
		assert_eq!(saved, 1);
		assert_eq!(store.len().await, 1);
	}
}
