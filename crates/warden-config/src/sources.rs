// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::load_secret_env;
use crate::error::ConfigError;
use crate::layer::WardenConfigLayer;
use crate::sections::{AuthzConfigLayer, LoggingConfigLayer, TokenConfigLayer};

/// Default location of the configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/warden/auth.toml";

/// Prefix of every environment variable read by [`EnvSource`].
pub const ENV_PREFIX: &str = "WARDEN";

/// Source precedence levels (higher overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WardenConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		Ok(WardenConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WardenConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::FileRead {
			path: self.path.clone(),
			source,
		})?;

		let layer = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
			path: self.path.clone(),
			source,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `<PREFIX>_<SECTION>_<FIELD>`, e.g. `WARDEN_AUTH_USER_KEY_TTL_SECS`.
pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	fn var(&self, suffix: &str) -> String {
		format!("{}_{suffix}", self.prefix)
	}

	fn load_tokens(&self) -> Result<TokenConfigLayer, ConfigError> {
		Ok(TokenConfigLayer {
			secret: load_secret_env(&self.var("AUTH_SECRET"))?,
			user_key_ttl_secs: env_u64(&self.var("AUTH_USER_KEY_TTL_SECS"))?,
			recovery_key_ttl_secs: env_u64(&self.var("AUTH_RECOVERY_KEY_TTL_SECS"))?,
			api_key_ttl_secs: env_u64(&self.var("AUTH_API_KEY_TTL_SECS"))?,
		})
	}

	fn load_authz(&self) -> Result<AuthzConfigLayer, ConfigError> {
		Ok(AuthzConfigLayer {
			decision_timeout_ms: env_u64(&self.var("AUTHZ_DECISION_TIMEOUT_MS"))?,
		})
	}

	fn load_logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: env_var(&self.var("LOG_LEVEL")),
			json: env_bool(&self.var("LOG_JSON")),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::with_prefix(ENV_PREFIX)
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		debug!(prefix = %self.prefix, "loading environment variables");
		Ok(WardenConfigLayer {
			tokens: Some(self.load_tokens()?),
			authz: Some(self.load_authz()?),
			logging: Some(self.load_logging()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}
