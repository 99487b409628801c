// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for sensitive values such as the key-signing secret.
//!
//! A [`Secret<T>`] never prints its contents: `Debug`, `Display` and
//! `Serialize` all emit [`REDACTED`]. The inner value is zeroized on drop and
//! can only be reached through [`Secret::expose`].
//!
//! ```
//! use warden_common_secret::SecretString;
//!
//! let secret = SecretString::new("hmac-signing-secret".to_string());
//! assert_eq!(format!("{secret}"), "[REDACTED]");
//! assert_eq!(secret.as_bytes(), b"hmac-signing-secret");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder printed instead of the secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must not appear in logs, config dumps or error messages.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// The common case: a secret string (signing keys, passwords).
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the inner value. Every call site is a place the secret leaves
	/// the wrapper.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl Secret<String> {
	/// Raw bytes, e.g. for use as an HMAC key.
	pub fn as_bytes(&self) -> &[u8] {
		self.inner.as_bytes()
	}

	/// True when the secret is empty or only whitespace, which is never a
	/// usable signing key.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
