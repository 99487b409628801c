// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity and access control for Warden.
//!
//! This crate provides:
//! - **Keys**: HMAC-SHA256 signed tokens for users, API clients and account
//!   recovery ([`Tokenizer`], [`HmacTokenizer`], [`Key`])
//! - **Groups**: a forest of groups with a bidirectional membership index
//!   ([`GroupStore`])
//! - **Policies**: `(subject, object, action)` grants indexed by subject
//!   ([`PolicyStore`])
//! - **Decisions**: direct and group-inherited grants ([`AuthorizationEngine`])
//! - **Verification**: the façade other services call ([`IdentityService`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_auth::{
//!     AuthorizationEngine, HmacTokenizer, IdentityService, InMemoryGroupStore,
//!     InMemoryKeyStore, InMemoryPolicyStore, ObjectRef, RequestContext,
//! };
//!
//! # async fn run() -> warden_auth::Result<()> {
//! let engine = AuthorizationEngine::new(
//!     Arc::new(InMemoryGroupStore::new()),
//!     Arc::new(InMemoryPolicyStore::new()),
//! );
//! let service = IdentityService::new(
//!     Arc::new(HmacTokenizer::new("secret")),
//!     Arc::new(engine),
//!     Arc::new(InMemoryKeyStore::new()),
//! );
//! let (_, token) = service.login("u1@example.com", None)?;
//! let object = ObjectRef::new("channel", "1");
//! service
//!     .verify(&RequestContext::background(), &token, &object, "publish")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod authz;
pub mod context;
pub mod error;
pub mod group;
pub mod identity;
pub mod key;
pub mod key_store;
pub mod policy;
pub mod tokenizer;
pub mod types;

pub use authz::{AuthorizationEngine, AuthorizeRequest, Authorizer, Decision, Grant};
pub use context::RequestContext;
pub use error::{AuthError, Result};
pub use group::{Group, GroupStore, InMemoryGroupStore, Metadata};
pub use identity::{Identity, IdentityService, KeyTtls};
pub use key::{Key, KeyRequest, KeyType};
pub use key_store::{InMemoryKeyStore, KeyStore};
pub use policy::{InMemoryPolicyStore, PolicyDef, PolicyQuery, PolicySet, PolicyStore};
pub use tokenizer::{HmacTokenizer, Tokenizer, KEY_ISSUER, MAX_EXPIRY_TIMESTAMP};
pub use types::{GroupId, KeyId, ObjectRef, PolicyId, SubjectType};
