// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The identity façade: token in, identity or refusal out.
//!
//! [`IdentityService::verify`] is the single entry point other services call.
//! It emits one audit record per call on the `warden::audit` target whose
//! `outcome` separates a policy refusal (`deny`) from a call that could not
//! be evaluated (`error`).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::authz::{AuthorizeRequest, Authorizer, Decision};
use crate::context::RequestContext;
use crate::error::{AuthError, Result};
use crate::key::{Key, KeyRequest, KeyType};
use crate::key_store::KeyStore;
use crate::tokenizer::Tokenizer;
use crate::types::{KeyId, ObjectRef};

/// Default lifetime of a login key.
pub const DEFAULT_USER_KEY_TTL: Duration = Duration::from_secs(10 * 60 * 60);
/// Default lifetime of a recovery key.
pub const DEFAULT_RECOVERY_KEY_TTL: Duration = Duration::from_secs(5 * 60);

const AUDIT_TARGET: &str = "warden::audit";

/// Lifetimes applied to keys the service issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTtls {
	pub user: Duration,
	pub recovery: Duration,
	/// `None` issues API keys that never expire unless the caller asks.
	pub api: Option<Duration>,
}

impl Default for KeyTtls {
	fn default() -> Self {
		Self {
			user: DEFAULT_USER_KEY_TTL,
			recovery: DEFAULT_RECOVERY_KEY_TTL,
			api: None,
		}
	}
}

/// Who presented a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
	pub subject: String,
	pub email: Option<String>,
	pub key_type: KeyType,
	pub key_id: Option<KeyId>,
}

impl From<&Key> for Identity {
	fn from(key: &Key) -> Self {
		Self {
			subject: key.subject().to_string(),
			email: key.email().map(str::to_string),
			key_type: key.key_type(),
			key_id: key.id().cloned(),
		}
	}
}

/// Key issuance and request verification on top of a [`Tokenizer`], an
/// [`Authorizer`] and a [`KeyStore`].
#[derive(Clone)]
pub struct IdentityService {
	tokenizer: Arc<dyn Tokenizer>,
	authorizer: Arc<dyn Authorizer>,
	keys: Arc<dyn KeyStore>,
	ttls: KeyTtls,
}

impl std::fmt::Debug for IdentityService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdentityService")
			.field("ttls", &self.ttls)
			.finish_non_exhaustive()
	}
}

impl IdentityService {
	pub fn new(
		tokenizer: Arc<dyn Tokenizer>,
		authorizer: Arc<dyn Authorizer>,
		keys: Arc<dyn KeyStore>,
	) -> Self {
		Self {
			tokenizer,
			authorizer,
			keys,
			ttls: KeyTtls::default(),
		}
	}

	pub fn with_ttls(mut self, ttls: KeyTtls) -> Self {
		self.ttls = ttls;
		self
	}

	pub fn ttls(&self) -> KeyTtls {
		self.ttls
	}

	/// Issue a login key for `subject`.
	#[instrument(skip(self, email))]
	pub fn login(&self, subject: &str, email: Option<&str>) -> Result<(Key, String)> {
		self.issue_session_key(subject, email, KeyType::UserKey, self.ttls.user)
	}

	/// Issue a short-lived key for the account recovery flow.
	#[instrument(skip(self, email))]
	pub fn issue_recovery_key(&self, subject: &str, email: Option<&str>) -> Result<(Key, String)> {
		self.issue_session_key(subject, email, KeyType::RecoveryKey, self.ttls.recovery)
	}

	fn issue_session_key(
		&self,
		subject: &str,
		email: Option<&str>,
		key_type: KeyType,
		ttl: Duration,
	) -> Result<(Key, String)> {
		if subject.is_empty() {
			return Err(AuthError::MalformedEntity("subject is empty".into()));
		}
		let mut request = KeyRequest::new(subject)
			.with_type(key_type)
			.with_issuer(subject)
			.issued_at(Utc::now())
			.expires_in(ttl);
		request.email = email.map(str::to_string);
		self.tokenizer.issue_key(&request)
	}

	/// Issue an API key on behalf of the holder of `issuer_token`, which must
	/// be a login key. The key is recorded and stays valid until revoked or
	/// expired.
	#[instrument(skip(self, ctx, issuer_token))]
	pub async fn issue_api_key(
		&self,
		ctx: &RequestContext,
		issuer_token: &str,
		ttl: Option<Duration>,
	) -> Result<(Key, String)> {
		let issuer = self.authenticate_issuer(issuer_token)?;

		let mut request = KeyRequest::new(issuer.subject())
			.with_type(KeyType::ApiKey)
			.with_id(KeyId::generate())
			.with_issuer(issuer.subject())
			.issued_at(Utc::now());
		request.email = issuer.email().map(str::to_string);
		if let Some(ttl) = ttl.or(self.ttls.api) {
			request = request.expires_in(ttl);
		}

		let (key, token) = self.tokenizer.issue_key(&request)?;
		ctx.run(self.keys.save(key.clone())).await?;
		Ok((key, token))
	}

	/// Look up an API key issued by the holder of `issuer_token`.
	#[instrument(skip(self, ctx, issuer_token), fields(key_id = %key_id))]
	pub async fn retrieve_key(
		&self,
		ctx: &RequestContext,
		issuer_token: &str,
		key_id: &KeyId,
	) -> Result<Key> {
		let issuer = self.authenticate_issuer(issuer_token)?;
		ctx.run(self.keys.retrieve(issuer.subject(), key_id)).await
	}

	/// Revoke an API key issued by the holder of `issuer_token`.
	#[instrument(skip(self, ctx, issuer_token), fields(key_id = %key_id))]
	pub async fn revoke_key(
		&self,
		ctx: &RequestContext,
		issuer_token: &str,
		key_id: &KeyId,
	) -> Result<()> {
		let issuer = self.authenticate_issuer(issuer_token)?;
		ctx.run(self.keys.remove(issuer.subject(), key_id)).await
	}

	/// Resolve the identity behind `token`. API keys must still be on
	/// record.
	pub async fn identify(&self, ctx: &RequestContext, token: &str) -> Result<Identity> {
		let key = self.parse(token)?;

		if key.key_type() == KeyType::ApiKey {
			let id = key
				.id()
				.ok_or_else(|| AuthError::Unauthenticated("api key has no id".into()))?;
			match ctx.run(self.keys.retrieve(key.issuer_id(), id)).await {
				Ok(_) => {}
				Err(AuthError::NotFound(_)) => {
					return Err(AuthError::Unauthenticated(format!("api key {id} is revoked")))
				}
				Err(e) => return Err(e),
			}
		}
		Ok(Identity::from(&key))
	}

	/// Authenticate `token` and authorize `action` on `object` for its
	/// subject.
	///
	/// Token problems surface as `Unauthenticated` and a deny as
	/// `Unauthorized`; store faults and deadlines propagate unchanged.
	#[instrument(skip(self, ctx, token), fields(object = %object, action = %action))]
	pub async fn verify(
		&self,
		ctx: &RequestContext,
		token: &str,
		object: &ObjectRef,
		action: &str,
	) -> Result<Identity> {
		let result = self.verify_inner(ctx, token, object, action).await;

		let outcome = match &result {
			Ok(_) => "allow",
			Err(AuthError::Unauthorized) => "deny",
			Err(AuthError::Unauthenticated(_)) => "unauthenticated",
			Err(_) => "error",
		};
		match &result {
			Ok(identity) => info!(
				target: AUDIT_TARGET,
				outcome,
				subject = %identity.subject,
				object = %object,
				action,
				"verify"
			),
			Err(e) if e.is_internal() => warn!(
				target: AUDIT_TARGET,
				outcome,
				object = %object,
				action,
				error = %e,
				"verify"
			),
			Err(e) => info!(
				target: AUDIT_TARGET,
				outcome,
				object = %object,
				action,
				error = %e,
				"verify"
			),
		}
		result
	}

	async fn verify_inner(
		&self,
		ctx: &RequestContext,
		token: &str,
		object: &ObjectRef,
		action: &str,
	) -> Result<Identity> {
		let identity = self.identify(ctx, token).await?;
		if identity.key_type == KeyType::RecoveryKey {
			return Err(AuthError::Unauthenticated(
				"recovery keys cannot authorize requests".into(),
			));
		}

		let request = AuthorizeRequest::new(identity.subject.clone(), object.clone(), action);
		match self.authorizer.authorize(ctx, &request).await? {
			Decision::Allow(_) => Ok(identity),
			Decision::Deny => Err(AuthError::Unauthorized),
		}
	}

	fn parse(&self, token: &str) -> Result<Key> {
		self.tokenizer.parse(token).map_err(|e| match e {
			AuthError::Expired | AuthError::MalformedToken(_) => {
				AuthError::Unauthenticated(e.to_string())
			}
			other => other,
		})
	}

	fn authenticate_issuer(&self, token: &str) -> Result<Key> {
		let key = self.parse(token)?;
		if key.key_type() != KeyType::UserKey {
			return Err(AuthError::Unauthorized);
		}
		Ok(key)
	}
}
