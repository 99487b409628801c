// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use chrono::{TimeZone, Utc};
use warden_auth::{AuthError, HmacTokenizer, KeyRequest, KeyType, Tokenizer};

#[test]
fn user_key_expired_an_hour_ago() {
	let tokenizer = HmacTokenizer::new("integration-secret");
	let request = KeyRequest::new("u1@example.com")
		.with_type(KeyType::UserKey)
		.issued_at(Utc::now() - chrono::Duration::hours(2))
		.expires_at(Utc::now() - chrono::Duration::hours(1));

	let token = tokenizer.issue(&request).unwrap();
	assert!(matches!(tokenizer.parse(&token), Err(AuthError::Expired)));
}

#[test]
fn key_without_expiry_never_expires() {
	let tokenizer = HmacTokenizer::new("integration-secret");
	let request = KeyRequest::new("svc")
		.with_type(KeyType::ApiKey)
		.issued_at(Utc::now() - chrono::Duration::days(3650));

	let key = tokenizer.parse(&tokenizer.issue(&request).unwrap()).unwrap();
	assert_eq!(key.expires_at(), None);
}

#[test]
fn token_is_three_part_compact_string() {
	let tokenizer = HmacTokenizer::new("integration-secret");
	let request = KeyRequest::new("u1")
		.with_type(KeyType::UserKey)
		.expires_in(Duration::from_secs(60));
	let token = tokenizer.issue(&request).unwrap();
	assert_eq!(token.split('.').count(), 3);
}

#[test]
fn rotated_secret_rejects_old_tokens() {
	let request = KeyRequest::new("u1").with_type(KeyType::UserKey);
	let token = HmacTokenizer::new("old-secret").issue(&request).unwrap();
	assert!(matches!(
		HmacTokenizer::new("new-secret").parse(&token),
		Err(AuthError::MalformedToken(_))
	));
}

#[test]
fn unrepresentable_lifetime_is_refused_not_unbounded() {
	let tokenizer = HmacTokenizer::new("integration-secret");
	let request = KeyRequest::new("u1")
		.with_type(KeyType::UserKey)
		.expires_in(Duration::from_secs(10_000_000_000_000));

	assert!(request.expires_at.is_some());
	assert!(matches!(
		tokenizer.issue(&request),
		Err(AuthError::SigningError(_))
	));
}

#[test]
fn epoch_expiry_cannot_become_never_expiring() {
	let tokenizer = HmacTokenizer::new("integration-secret");
	let epoch = Utc.timestamp_opt(0, 0).unwrap();
	let request = KeyRequest::new("u1")
		.with_type(KeyType::UserKey)
		.issued_at(epoch)
		.expires_at(epoch);

	assert!(matches!(
		tokenizer.issue(&request),
		Err(AuthError::SigningError(_))
	));
}
