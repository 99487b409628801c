// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! TOML seed of groups, memberships and policies for `warden check`.
//!
//! ```toml
//! [[groups]]
//! id = "fleet"
//! name = "Fleet"
//! owner_id = "ops@example.com"
//!
//! [[groups]]
//! id = "sensors"
//! name = "Sensors"
//! owner_id = "ops@example.com"
//! parent_id = "fleet"
//!
//! [[memberships]]
//! member = "device-1"
//! group = "sensors"
//!
//! [[policies]]
//! subject_type = "group"
//! subject_id = "fleet"
//! object = "channel:1"
//! action = "publish"
//! ```
//!
//! Groups are saved in file order, so parents must come first.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;
use warden_auth::{Group, GroupId, GroupStore, Metadata, ObjectRef, PolicyDef, PolicyStore, SubjectType};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
	#[serde(default)]
	pub groups: Vec<SeedGroup>,
	#[serde(default)]
	pub memberships: Vec<SeedMembership>,
	#[serde(default)]
	pub policies: Vec<SeedPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedGroup {
	pub id: Option<String>,
	pub name: String,
	#[serde(default)]
	pub owner_id: String,
	pub parent_id: Option<String>,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedMembership {
	pub member: String,
	pub group: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPolicy {
	pub subject_type: SubjectType,
	pub subject_id: String,
	pub object: String,
	pub action: String,
}

impl Seed {
	pub fn parse(content: &str) -> anyhow::Result<Self> {
		toml::from_str(content).context("invalid seed file")
	}

	pub fn from_path(path: &Path) -> anyhow::Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read seed file {}", path.display()))?;
		Self::parse(&content)
	}

	/// Save every record into the given stores.
	pub async fn apply(
		&self,
		groups: &dyn GroupStore,
		policies: &dyn PolicyStore,
	) -> anyhow::Result<()> {
		for seed in &self.groups {
			let mut group = Group::new(seed.owner_id.clone(), seed.name.clone())
				.with_description(seed.description.clone())
				.with_metadata(seed.metadata.clone());
			if let Some(id) = &seed.id {
				group = group.with_id(id.as_str());
			}
			if let Some(parent) = &seed.parent_id {
				group = group.with_parent(parent.as_str());
			}
			groups
				.save(group)
				.await
				.with_context(|| format!("failed to seed group '{}'", seed.name))?;
		}

		for membership in &self.memberships {
			groups
				.assign(&membership.member, &GroupId::new(membership.group.as_str()))
				.await
				.with_context(|| {
					format!(
						"failed to assign '{}' to '{}'",
						membership.member, membership.group
					)
				})?;
		}

		for seed in &self.policies {
			let object: ObjectRef = seed.object.parse()?;
			policies
				.save_policy(PolicyDef::new(
					seed.subject_type,
					seed.subject_id.clone(),
					object,
					seed.action.clone(),
				))
				.await
				.with_context(|| format!("failed to seed policy on '{}'", seed.object))?;
		}

		debug!(
			groups = self.groups.len(),
			memberships = self.memberships.len(),
			policies = self.policies.len(),
			"seed applied"
		);
		Ok(())
	}
}
