// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted API keys.
//!
//! API keys are long-lived, so they are recorded when issued and must still
//! be on record when presented. Removing the record revokes the key.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{AuthError, Result};
use crate::key::Key;
use crate::types::KeyId;

#[async_trait]
pub trait KeyStore: Send + Sync {
	/// Record a key. The key must carry an ID; `Conflict` if it is taken.
	async fn save(&self, key: Key) -> Result<KeyId>;

	async fn retrieve(&self, issuer_id: &str, key_id: &KeyId) -> Result<Key>;

	async fn remove(&self, issuer_id: &str, key_id: &KeyId) -> Result<()>;
}

/// [`KeyStore`] backed by process memory, keyed by issuer and key ID.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
	keys: RwLock<HashMap<(String, KeyId), Key>>,
}

impl InMemoryKeyStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn not_found(issuer_id: &str, key_id: &KeyId) -> AuthError {
	AuthError::NotFound(format!("key {key_id} issued by {issuer_id}"))
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
	#[instrument(skip(self, key), fields(issuer_id = %key.issuer_id()))]
	async fn save(&self, key: Key) -> Result<KeyId> {
		let id = key
			.id()
			.cloned()
			.ok_or_else(|| AuthError::MalformedEntity("key has no id".into()))?;
		let mut keys = self.keys.write().await;
		let slot = (key.issuer_id().to_string(), id.clone());
		if keys.contains_key(&slot) {
			return Err(AuthError::Conflict(format!("key {id}")));
		}
		keys.insert(slot, key);

		debug!(key_id = %id, "saved key");
		Ok(id)
	}

	async fn retrieve(&self, issuer_id: &str, key_id: &KeyId) -> Result<Key> {
		self.keys
			.read()
			.await
			.get(&(issuer_id.to_string(), key_id.clone()))
			.cloned()
			.ok_or_else(|| not_found(issuer_id, key_id))
	}

	#[instrument(skip(self), fields(issuer_id = %issuer_id, key_id = %key_id))]
	async fn remove(&self, issuer_id: &str, key_id: &KeyId) -> Result<()> {
		self.keys
			.write()
			.await
			.remove(&(issuer_id.to_string(), key_id.clone()))
			.map(|_| debug!("removed key"))
			.ok_or_else(|| not_found(issuer_id, key_id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::{KeyRequest, KeyType};
	use crate::tokenizer::{HmacTokenizer, Tokenizer};

	fn api_key(issuer: &str, id: &str) -> Key {
		let request = KeyRequest::new("svc")
			.with_type(KeyType::ApiKey)
			.with_issuer(issuer)
			.with_id(KeyId::new(id));
		HmacTokenizer::new("secret").issue_key(&request).unwrap().0
	}

	#[tokio::test]
	async fn save_retrieve_remove() {
		let store = InMemoryKeyStore::new();
		let id = store.save(api_key("admin", "k1")).await.unwrap();
		assert_eq!(id.as_str(), "k1");

		let key = store.retrieve("admin", &id).await.unwrap();
		assert_eq!(key.key_type(), KeyType::ApiKey);

		store.remove("admin", &id).await.unwrap();
		assert!(matches!(
			store.retrieve("admin", &id).await,
			Err(AuthError::NotFound(_))
		));
		assert!(matches!(
			store.remove("admin", &id).await,
			Err(AuthError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn keys_are_scoped_by_issuer() {
		let store = InMemoryKeyStore::new();
		store.save(api_key("admin", "k1")).await.unwrap();
		store.save(api_key("other", "k1")).await.unwrap();

		assert!(matches!(
			store.save(api_key("admin", "k1")).await,
			Err(AuthError::Conflict(_))
		));
		assert!(store.retrieve("nobody", &KeyId::new("k1")).await.is_err());
	}

	#[tokio::test]
	async fn key_without_id_is_malformed() {
		let request = KeyRequest::new("svc").with_type(KeyType::ApiKey);
		let key = HmacTokenizer::new("secret").issue_key(&request).unwrap().0;
		assert!(matches!(
			InMemoryKeyStore::new().save(key).await,
			Err(AuthError::MalformedEntity(_))
		));
	}
}
