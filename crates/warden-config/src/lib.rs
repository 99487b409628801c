// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Warden identity core.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (`/etc/warden/auth.toml` unless another path is given)
//! 3. Environment variables (`WARDEN_*`, with `WARDEN_AUTH_SECRET_FILE`
//!    accepted in place of `WARDEN_AUTH_SECRET`)

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::WardenConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, ENV_PREFIX,
	SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct WardenConfig {
	pub tokens: TokenConfig,
	pub authz: AuthzConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<WardenConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::default()),
	])
}

/// Load configuration using `config_path` instead of the system config file.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WardenConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::default()),
	])
}

/// Merge the given sources in precedence order and validate the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<WardenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WardenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: WardenConfigLayer) -> Result<WardenConfig, ConfigError> {
	let tokens = layer.tokens.unwrap_or_default().finalize();
	let authz = layer.authz.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_tokens(&tokens)?;
	validate_authz(&authz)?;

	info!(
		secret_configured = tokens.secret.is_some(),
		user_key_ttl_secs = tokens.user_key_ttl_secs,
		recovery_key_ttl_secs = tokens.recovery_key_ttl_secs,
		api_key_ttl_secs = ?tokens.api_key_ttl_secs,
		decision_timeout_ms = authz.decision_timeout_ms,
		"configuration loaded"
	);

	Ok(WardenConfig {
		tokens,
		authz,
		logging,
	})
}

/// Upper bound for any configured key lifetime (100 years).
pub const MAX_KEY_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn validate_tokens(tokens: &TokenConfig) -> Result<(), ConfigError> {
	if tokens.secret.as_ref().is_some_and(|s| s.is_blank()) {
		return Err(ConfigError::Validation(
			"tokens.secret is set but empty; unset it or provide a signing secret".to_string(),
		));
	}

	let ttls = [
		("user_key_ttl_secs", Some(tokens.user_key_ttl_secs)),
		("recovery_key_ttl_secs", Some(tokens.recovery_key_ttl_secs)),
		("api_key_ttl_secs", tokens.api_key_ttl_secs),
	];
	for (name, ttl) in ttls {
		match ttl {
			Some(0) => {
				return Err(ConfigError::Validation(format!(
					"tokens.{name} must be greater than zero"
				)))
			}
			Some(secs) if secs > MAX_KEY_TTL_SECS => {
				return Err(ConfigError::Validation(format!(
					"tokens.{name} must not exceed {MAX_KEY_TTL_SECS}"
				)))
			}
			_ => {}
		}
	}
	Ok(())
}

fn validate_authz(authz: &AuthzConfig) -> Result<(), ConfigError> {
	if authz.decision_timeout_ms == 0 {
		return Err(ConfigError::Validation(
			"authz.decision_timeout_ms must be greater than zero".to_string(),
		));
	}
	Ok(())
}
