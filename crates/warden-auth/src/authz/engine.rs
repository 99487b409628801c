// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{AuthorizeRequest, Authorizer, Decision, Grant};
use crate::context::RequestContext;
use crate::error::{AuthError, Result};
use crate::group::GroupStore;
use crate::policy::{PolicyQuery, PolicyStore};
use crate::types::{GroupId, SubjectType};

/// Composes a [`PolicyStore`] and a [`GroupStore`] into decisions.
///
/// Nothing is cached between calls: every decision re-reads memberships and
/// policies. Each store call runs under the request context, and when the
/// caller supplies no deadline the engine's own decision timeout applies.
#[derive(Clone)]
pub struct AuthorizationEngine {
	groups: Arc<dyn GroupStore>,
	policies: Arc<dyn PolicyStore>,
	decision_timeout: Option<Duration>,
}

impl AuthorizationEngine {
	pub fn new(groups: Arc<dyn GroupStore>, policies: Arc<dyn PolicyStore>) -> Self {
		Self {
			groups,
			policies,
			decision_timeout: None,
		}
	}

	pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
		self.decision_timeout = Some(timeout);
		self
	}

	pub fn groups(&self) -> &Arc<dyn GroupStore> {
		&self.groups
	}

	pub fn policies(&self) -> &Arc<dyn PolicyStore> {
		&self.policies
	}

	/// Delete a group and then the policies it held, so a group saved later
	/// under the same ID starts without grants. Returns the number of
	/// policies removed.
	#[instrument(skip(self, ctx), fields(group_id = %id))]
	pub async fn delete_group(&self, ctx: &RequestContext, id: &GroupId) -> Result<usize> {
		ctx.run(self.groups.delete(id)).await?;
		let removed = ctx
			.run(self.policies.remove_subject_policies(SubjectType::Group, id.as_str()))
			.await?;
		debug!(removed, "deleted group and its policies");
		Ok(removed)
	}

	fn effective_context(&self, ctx: &RequestContext) -> RequestContext {
		match (ctx.deadline(), self.decision_timeout) {
			(None, Some(timeout)) => ctx.bounded_by(timeout),
			_ => ctx.clone(),
		}
	}

	/// Groups whose grants apply to the subject: its direct memberships
	/// followed by their ancestors, each listed once. A group subject starts
	/// from its own ancestors.
	async fn inherited_groups(
		&self,
		ctx: &RequestContext,
		request: &AuthorizeRequest,
	) -> Result<Vec<GroupId>> {
		let seeds: Vec<GroupId> = match request.subject_type {
			SubjectType::Group => vec![GroupId::new(request.subject.clone())],
			SubjectType::User | SubjectType::Thing => ctx
				.run(self.groups.memberships(&request.subject))
				.await?
				.into_iter()
				.map(|group| group.id)
				.collect(),
		};

		let mut seen: HashSet<GroupId> = HashSet::new();
		let mut expanded = Vec::new();
		if request.subject_type == SubjectType::Group {
			// already covered by the direct check
			seen.extend(seeds.iter().cloned());
		} else {
			for id in &seeds {
				if seen.insert(id.clone()) {
					expanded.push(id.clone());
				}
			}
		}

		for id in &seeds {
			// A group that no longer exists has no ancestors to inherit from.
			let ancestors = match ctx.run(self.groups.retrieve_all_parents(id)).await {
				Ok(ancestors) => ancestors,
				Err(AuthError::NotFound(_)) => {
					debug!(group_id = %id, "skipping ancestors of unknown group");
					continue;
				}
				Err(e) => return Err(e),
			};
			for ancestor in ancestors {
				if seen.insert(ancestor.id.clone()) {
					expanded.push(ancestor.id);
				}
			}
		}
		Ok(expanded)
	}
}

impl std::fmt::Debug for AuthorizationEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuthorizationEngine")
			.field("decision_timeout", &self.decision_timeout)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Authorizer for AuthorizationEngine {
	#[instrument(
		skip(self, ctx, request),
		fields(
			subject = %request.subject,
			object = %request.object,
			action = %request.action
		)
	)]
	async fn authorize(&self, ctx: &RequestContext, request: &AuthorizeRequest) -> Result<Decision> {
		let ctx = self.effective_context(ctx);

		let direct = ctx
			.run(self.policies.retrieve_policy(
				&PolicyQuery::for_subject(request.subject_type, request.subject.clone())
					.on_object(request.object.clone()),
			))
			.await?;
		if let Some(policy) = direct.grant_for(&request.object, &request.action) {
			let grant = Grant::Direct {
				policy_id: policy.id.clone(),
			};
			debug!(%grant, "allowed");
			return Ok(Decision::Allow(grant));
		}

		for group_id in self.inherited_groups(&ctx, request).await? {
			let held = ctx
				.run(self.policies.retrieve_policy(
					&PolicyQuery::for_subject(SubjectType::Group, group_id.as_str())
						.on_object(request.object.clone()),
				))
				.await?;
			if let Some(policy) = held.grant_for(&request.object, &request.action) {
				let grant = Grant::Group {
					group_id,
					policy_id: policy.id.clone(),
				};
				debug!(%grant, "allowed");
				return Ok(Decision::Allow(grant));
			}
		}

		debug!("denied");
		Ok(Decision::Deny)
	}
}
