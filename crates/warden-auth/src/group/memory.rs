// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`GroupStore`].
//!
//! All state lives in one [`GroupGraph`] behind a `tokio::sync::RwLock`, so
//! every mutation is a single critical section over both membership indices
//! and the children index. Reads share the lock.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{Group, GroupStore};
use crate::error::{AuthError, Result};
use crate::types::GroupId;

#[derive(Debug, Default)]
struct GroupGraph {
	groups: HashMap<GroupId, Group>,
	by_name: HashMap<String, GroupId>,
	/// Direct children per group, in the order they were attached.
	children: HashMap<GroupId, Vec<GroupId>>,
	members: HashMap<GroupId, BTreeSet<String>>,
	memberships: HashMap<String, BTreeSet<GroupId>>,
}

impl GroupGraph {
	fn get(&self, id: &GroupId) -> Result<&Group> {
		self.groups
			.get(id)
			.ok_or_else(|| AuthError::NotFound(format!("group {id}")))
	}

	fn require_parent(&self, parent_id: Option<&GroupId>) -> Result<()> {
		match parent_id {
			Some(parent) if !self.groups.contains_key(parent) => {
				Err(AuthError::NotFound(format!("parent group {parent}")))
			}
			_ => Ok(()),
		}
	}

	/// Parent-pointer walk, bounded by the number of stored groups.
	fn ancestor_ids(&self, id: &GroupId) -> Result<Vec<GroupId>> {
		let mut chain = Vec::new();
		let mut seen = HashSet::new();
		seen.insert(id.clone());
		let mut cursor = self.get(id)?.parent_id.clone();

		while let Some(parent_id) = cursor {
			if chain.len() >= self.groups.len() || !seen.insert(parent_id.clone()) {
				return Err(AuthError::CorruptHierarchy {
					group_id: id.to_string(),
					reason: format!("ancestor chain revisits {parent_id}"),
				});
			}
			let parent = self.groups.get(&parent_id).ok_or_else(|| AuthError::CorruptHierarchy {
				group_id: id.to_string(),
				reason: format!("dangling parent reference {parent_id}"),
			})?;
			cursor = parent.parent_id.clone();
			chain.push(parent_id);
		}
		Ok(chain)
	}

	/// Breadth-first expansion over the children index.
	fn descendant_ids(&self, id: &GroupId) -> Result<Vec<GroupId>> {
		self.get(id)?;
		let mut order = Vec::new();
		let mut seen = HashSet::new();
		seen.insert(id.clone());
		let mut queue = VecDeque::from([id.clone()]);

		while let Some(current) = queue.pop_front() {
			for child in self.children.get(&current).into_iter().flatten() {
				if !seen.insert(child.clone()) || order.len() >= self.groups.len() {
					return Err(AuthError::CorruptHierarchy {
						group_id: id.to_string(),
						reason: format!("descendant walk revisits {child}"),
					});
				}
				order.push(child.clone());
				queue.push_back(child.clone());
			}
		}
		Ok(order)
	}

	fn resolve(&self, ids: impl IntoIterator<Item = GroupId>) -> Result<Vec<Group>> {
		ids.into_iter()
			.map(|id| {
				self.groups.get(&id).cloned().ok_or_else(|| AuthError::CorruptHierarchy {
					group_id: id.to_string(),
					reason: "indexed group is missing".into(),
				})
			})
			.collect()
	}

	fn attach(&mut self, parent_id: Option<&GroupId>, child: &GroupId) {
		if let Some(parent) = parent_id {
			self.children.entry(parent.clone()).or_default().push(child.clone());
		}
	}

	fn detach(&mut self, parent_id: Option<&GroupId>, child: &GroupId) {
		if let Some(parent) = parent_id {
			if let Some(siblings) = self.children.get_mut(parent) {
				siblings.retain(|id| id != child);
				if siblings.is_empty() {
					self.children.remove(parent);
				}
			}
		}
	}
}

/// [`GroupStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryGroupStore {
	graph: RwLock<GroupGraph>,
}

impl InMemoryGroupStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Rewrites a parent pointer without the cycle check, to simulate
	/// corrupted backing data.
	#[cfg(test)]
	pub(crate) async fn force_parent(&self, id: &GroupId, parent_id: &GroupId) {
		let mut graph = self.graph.write().await;
		let old = graph.groups.get(id).and_then(|g| g.parent_id.clone());
		graph.detach(old.as_ref(), id);
		graph.attach(Some(parent_id), id);
		if let Some(group) = graph.groups.get_mut(id) {
			group.parent_id = Some(parent_id.clone());
		}
	}
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
	#[instrument(skip(self, group), fields(group_id = %group.id, name = %group.name))]
	async fn save(&self, group: Group) -> Result<Group> {
		group.validate()?;
		let mut graph = self.graph.write().await;

		if graph.groups.contains_key(&group.id) {
			return Err(AuthError::Conflict(format!("group id {}", group.id)));
		}
		if graph.by_name.contains_key(&group.name) {
			return Err(AuthError::Conflict(format!("group name '{}'", group.name)));
		}
		graph.require_parent(group.parent_id.as_ref())?;

		graph.attach(group.parent_id.as_ref(), &group.id);
		graph.by_name.insert(group.name.clone(), group.id.clone());
		graph.groups.insert(group.id.clone(), group.clone());

		debug!(parent_id = ?group.parent_id, "saved group");
		Ok(group)
	}

	#[instrument(skip(self, group), fields(group_id = %group.id))]
	async fn update(&self, group: Group) -> Result<Group> {
		group.validate()?;
		let mut graph = self.graph.write().await;
		let existing = graph.get(&group.id)?.clone();

		if existing.name != group.name {
			return Err(AuthError::MalformedEntity(format!(
				"group {} name is immutable",
				group.id
			)));
		}
		if existing.owner_id != group.owner_id {
			return Err(AuthError::MalformedEntity(format!(
				"group {} owner is immutable",
				group.id
			)));
		}

		if existing.parent_id != group.parent_id {
			if let Some(new_parent) = &group.parent_id {
				graph.require_parent(Some(new_parent))?;
				let mut lineage = graph.ancestor_ids(new_parent)?;
				lineage.push(new_parent.clone());
				if lineage.contains(&group.id) {
					return Err(AuthError::MalformedEntity(format!(
						"moving group {} under {new_parent} would create a cycle",
						group.id
					)));
				}
			}
			graph.detach(existing.parent_id.as_ref(), &group.id);
			graph.attach(group.parent_id.as_ref(), &group.id);
		}

		let updated = Group {
			description: group.description,
			metadata: group.metadata,
			parent_id: group.parent_id,
			updated_at: Utc::now(),
			..existing
		};
		graph.groups.insert(updated.id.clone(), updated.clone());

		debug!(parent_id = ?updated.parent_id, "updated group");
		Ok(updated)
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn delete(&self, id: &GroupId) -> Result<()> {
		let mut graph = self.graph.write().await;
		let group = graph.get(id)?.clone();

		let children = graph.children.get(id).map_or(0, Vec::len);
		let members = graph.members.get(id).map_or(0, BTreeSet::len);
		if children > 0 || members > 0 {
			return Err(AuthError::HasDependents {
				group_id: id.to_string(),
				children,
				members,
			});
		}

		graph.detach(group.parent_id.as_ref(), id);
		graph.by_name.remove(&group.name);
		graph.groups.remove(id);

		debug!("deleted group");
		Ok(())
	}

	async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group> {
		self.graph.read().await.get(id).cloned()
	}

	async fn retrieve_by_name(&self, name: &str) -> Result<Group> {
		let graph = self.graph.read().await;
		let id = graph
			.by_name
			.get(name)
			.ok_or_else(|| AuthError::NotFound(format!("group named '{name}'")))?;
		graph.get(id).cloned()
	}

	async fn retrieve_all_children(&self, id: &GroupId) -> Result<Vec<Group>> {
		let graph = self.graph.read().await;
		graph.get(id)?;
		let ids = graph.children.get(id).cloned().unwrap_or_default();
		graph.resolve(ids)
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn retrieve_all_parents(&self, id: &GroupId) -> Result<Vec<Group>> {
		let graph = self.graph.read().await;
		let ids = graph.ancestor_ids(id)?;
		graph.resolve(ids)
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn retrieve_descendants(&self, id: &GroupId) -> Result<Vec<Group>> {
		let graph = self.graph.read().await;
		let ids = graph.descendant_ids(id)?;
		graph.resolve(ids)
	}

	#[instrument(skip(self), fields(member_id = %member_id, group_id = %group_id))]
	async fn assign(&self, member_id: &str, group_id: &GroupId) -> Result<()> {
		if member_id.is_empty() {
			return Err(AuthError::MalformedEntity("member id is empty".into()));
		}
		let mut graph = self.graph.write().await;
		graph.get(group_id)?;

		let added = graph
			.members
			.entry(group_id.clone())
			.or_default()
			.insert(member_id.to_string());
		graph
			.memberships
			.entry(member_id.to_string())
			.or_default()
			.insert(group_id.clone());

		if added {
			debug!("assigned member");
		}
		Ok(())
	}

	#[instrument(skip(self), fields(member_id = %member_id, group_id = %group_id))]
	async fn unassign(&self, member_id: &str, group_id: &GroupId) -> Result<()> {
		let mut graph = self.graph.write().await;
		graph.get(group_id)?;

		let mut removed = false;
		if let Some(members) = graph.members.get_mut(group_id) {
			removed = members.remove(member_id);
			if members.is_empty() {
				graph.members.remove(group_id);
			}
		}
		if let Some(groups) = graph.memberships.get_mut(member_id) {
			groups.remove(group_id);
			if groups.is_empty() {
				graph.memberships.remove(member_id);
			}
		}

		if removed {
			debug!("unassigned member");
		}
		Ok(())
	}

	async fn memberships(&self, member_id: &str) -> Result<Vec<Group>> {
		let graph = self.graph.read().await;
		let ids = graph.memberships.get(member_id).cloned().unwrap_or_default();
		graph.resolve(ids)
	}

	async fn members(&self, group_id: &GroupId) -> Result<Vec<String>> {
		let graph = self.graph.read().await;
		graph.get(group_id)?;
		Ok(graph
			.members
			.get(group_id)
			.map(|m| m.iter().cloned().collect())
			.unwrap_or_default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::Arc;

	async fn store_with_chain() -> InMemoryGroupStore {
		// a <- b <- c, plus a <- d
		let store = InMemoryGroupStore::new();
		store.save(Group::new("o", "a").with_id("a")).await.unwrap();
		store.save(Group::new("o", "b").with_id("b").with_parent("a")).await.unwrap();
		store.save(Group::new("o", "c").with_id("c").with_parent("b")).await.unwrap();
		store.save(Group::new("o", "d").with_id("d").with_parent("a")).await.unwrap();
		store
	}

	fn ids(groups: &[Group]) -> Vec<&str> {
		groups.iter().map(|g| g.id.as_str()).collect()
	}

	mod save {
		use super::*;

		#[tokio::test]
		async fn duplicate_id_conflicts() {
			let store = InMemoryGroupStore::new();
			store.save(Group::new("o", "one").with_id("g")).await.unwrap();
			let err = store.save(Group::new("o", "two").with_id("g")).await.unwrap_err();
			assert!(matches!(err, AuthError::Conflict(_)));
		}

		#[tokio::test]
		async fn duplicate_name_conflicts() {
			let store = InMemoryGroupStore::new();
			store.save(Group::new("o", "same")).await.unwrap();
			let err = store.save(Group::new("o", "same")).await.unwrap_err();
			assert!(matches!(err, AuthError::Conflict(_)));
		}

		#[tokio::test]
		async fn unknown_parent_is_not_found() {
			let store = InMemoryGroupStore::new();
			let err = store
				.save(Group::new("o", "orphan").with_parent("missing"))
				.await
				.unwrap_err();
			assert!(matches!(err, AuthError::NotFound(_)));
			assert!(store.retrieve_by_name("orphan").await.is_err());
		}

		#[tokio::test]
		async fn lookup_by_id_and_name() {
			let store = store_with_chain().await;
			assert_eq!(store.retrieve_by_name("c").await.unwrap().id.as_str(), "c");
			assert_eq!(
				store.retrieve_by_id(&GroupId::new("b")).await.unwrap().name,
				"b"
			);
			assert!(matches!(
				store.retrieve_by_id(&GroupId::new("zz")).await,
				Err(AuthError::NotFound(_))
			));
		}
	}

	mod update {
		use super::*;

		#[tokio::test]
		async fn changes_description_and_metadata() {
			let store = store_with_chain().await;
			let mut group = store.retrieve_by_id(&GroupId::new("b")).await.unwrap();
			group.description = "second level".into();
			group.metadata.insert("region".into(), serde_json::json!("eu"));

			let updated = store.update(group).await.unwrap();
			assert_eq!(updated.description, "second level");
			assert_eq!(updated.metadata["region"], "eu");
			assert!(updated.updated_at >= updated.created_at);
		}

		#[tokio::test]
		async fn rename_is_rejected() {
			let store = store_with_chain().await;
			let mut group = store.retrieve_by_id(&GroupId::new("b")).await.unwrap();
			group.name = "renamed".into();
			assert!(matches!(
				store.update(group).await,
				Err(AuthError::MalformedEntity(_))
			));
		}

		#[tokio::test]
		async fn reparent_under_descendant_is_rejected() {
			let store = store_with_chain().await;
			let mut a = store.retrieve_by_id(&GroupId::new("a")).await.unwrap();
			a.parent_id = Some(GroupId::new("c"));

			assert!(matches!(
				store.update(a).await,
				Err(AuthError::MalformedEntity(_))
			));
			assert!(store.retrieve_by_id(&GroupId::new("a")).await.unwrap().is_root());
		}

		#[tokio::test]
		async fn reparent_moves_children_index() {
			let store = store_with_chain().await;
			let mut c = store.retrieve_by_id(&GroupId::new("c")).await.unwrap();
			c.parent_id = Some(GroupId::new("d"));
			store.update(c).await.unwrap();

			assert!(store
				.retrieve_all_children(&GroupId::new("b"))
				.await
				.unwrap()
				.is_empty());
			let under_d = store.retrieve_all_children(&GroupId::new("d")).await.unwrap();
			assert_eq!(ids(&under_d), vec!["c"]);
		}

		#[tokio::test]
		async fn detach_to_root() {
			let store = store_with_chain().await;
			let mut b = store.retrieve_by_id(&GroupId::new("b")).await.unwrap();
			b.parent_id = None;
			store.update(b).await.unwrap();

			let parents = store.retrieve_all_parents(&GroupId::new("c")).await.unwrap();
			assert_eq!(ids(&parents), vec!["b"]);
		}
	}

	mod delete {
		use super::*;

		#[tokio::test]
		async fn group_with_children_is_kept() {
			let store = store_with_chain().await;
			let err = store.delete(&GroupId::new("b")).await.unwrap_err();
			assert!(matches!(
				err,
				AuthError::HasDependents {
					children: 1,
					members: 0,
					..
				}
			));
			assert!(store.retrieve_by_id(&GroupId::new("b")).await.is_ok());
		}

		#[tokio::test]
		async fn group_with_members_is_kept() {
			let store = store_with_chain().await;
			store.assign("u1", &GroupId::new("c")).await.unwrap();
			let err = store.delete(&GroupId::new("c")).await.unwrap_err();
			assert!(matches!(err, AuthError::HasDependents { members: 1, .. }));
			assert!(store.retrieve_by_id(&GroupId::new("c")).await.is_ok());
		}

		#[tokio::test]
		async fn leaf_is_removed_everywhere() {
			let store = store_with_chain().await;
			store.delete(&GroupId::new("c")).await.unwrap();

			assert!(store.retrieve_by_name("c").await.is_err());
			assert!(store
				.retrieve_all_children(&GroupId::new("b"))
				.await
				.unwrap()
				.is_empty());
			// name is free again
			store.save(Group::new("o", "c").with_parent("a")).await.unwrap();
		}

		#[tokio::test]
		async fn missing_is_not_found() {
			let store = InMemoryGroupStore::new();
			assert!(matches!(
				store.delete(&GroupId::new("nope")).await,
				Err(AuthError::NotFound(_))
			));
		}
	}

	mod traversal {
		use super::*;

		#[tokio::test]
		async fn children_in_insertion_order() {
			let store = store_with_chain().await;
			store.save(Group::new("o", "e").with_id("e").with_parent("a")).await.unwrap();
			let children = store.retrieve_all_children(&GroupId::new("a")).await.unwrap();
			assert_eq!(ids(&children), vec!["b", "d", "e"]);
		}

		#[tokio::test]
		async fn parents_run_parent_to_root() {
			let store = store_with_chain().await;
			let parents = store.retrieve_all_parents(&GroupId::new("c")).await.unwrap();
			assert_eq!(ids(&parents), vec!["b", "a"]);
			assert!(store
				.retrieve_all_parents(&GroupId::new("a"))
				.await
				.unwrap()
				.is_empty());
		}

		#[tokio::test]
		async fn descendants_are_breadth_first() {
			let store = store_with_chain().await;
			let all = store.retrieve_descendants(&GroupId::new("a")).await.unwrap();
			assert_eq!(ids(&all), vec!["b", "d", "c"]);
		}

		#[tokio::test]
		async fn cyclic_storage_is_corrupt_hierarchy() {
			let store = store_with_chain().await;
			store.force_parent(&GroupId::new("a"), &GroupId::new("c")).await;

			assert!(matches!(
				store.retrieve_all_parents(&GroupId::new("c")).await,
				Err(AuthError::CorruptHierarchy { .. })
			));
			assert!(matches!(
				store.retrieve_descendants(&GroupId::new("a")).await,
				Err(AuthError::CorruptHierarchy { .. })
			));
		}
	}

	mod membership {
		use super::*;

		#[tokio::test]
		async fn assign_to_missing_group_is_not_found() {
			let store = InMemoryGroupStore::new();
			assert!(matches!(
				store.assign("u1", &GroupId::new("nope")).await,
				Err(AuthError::NotFound(_))
			));
			assert!(store.memberships("u1").await.unwrap().is_empty());
		}

		#[tokio::test]
		async fn both_indices_agree() {
			let store = store_with_chain().await;
			store.assign("u1", &GroupId::new("b")).await.unwrap();
			store.assign("u1", &GroupId::new("d")).await.unwrap();
			store.assign("u2", &GroupId::new("b")).await.unwrap();

			assert_eq!(ids(&store.memberships("u1").await.unwrap()), vec!["b", "d"]);
			assert_eq!(
				store.members(&GroupId::new("b")).await.unwrap(),
				vec!["u1".to_string(), "u2".to_string()]
			);

			store.unassign("u1", &GroupId::new("b")).await.unwrap();
			assert_eq!(ids(&store.memberships("u1").await.unwrap()), vec!["d"]);
			assert_eq!(
				store.members(&GroupId::new("b")).await.unwrap(),
				vec!["u2".to_string()]
			);
		}

		#[tokio::test]
		async fn unassign_non_member_is_noop() {
			let store = store_with_chain().await;
			store.unassign("ghost", &GroupId::new("a")).await.unwrap();
			assert!(matches!(
				store.unassign("ghost", &GroupId::new("nope")).await,
				Err(AuthError::NotFound(_))
			));
		}

		#[tokio::test]
		async fn concurrent_assignments_all_land() {
			let store = Arc::new(store_with_chain().await);
			let mut handles = Vec::new();
			for i in 0..32 {
				let store = Arc::clone(&store);
				handles.push(tokio::spawn(async move {
					store.assign(&format!("u{i}"), &GroupId::new("c")).await
				}));
			}
			for handle in handles {
				handle.await.unwrap().unwrap();
			}
			assert_eq!(store.members(&GroupId::new("c")).await.unwrap().len(), 32);
		}
	}

	proptest! {
		#[test]
		fn assign_is_idempotent(repeats in 1usize..6, member in "[a-z]{1,12}") {
			let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
			rt.block_on(async {
				let store = store_with_chain().await;
				let group = GroupId::new("b");
				for _ in 0..repeats {
					store.assign(&member, &group).await.unwrap();
				}
				let members = store.members(&group).await.unwrap();
				let groups = store.memberships(&member).await.unwrap();
				assert_eq!(members, vec![member.clone()]);
				assert_eq!(ids(&groups), vec!["b"]);
			});
		}
	}
}
