// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `warden`: issue and inspect keys, and evaluate access decisions offline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_auth::{
	AuthorizationEngine, AuthorizeRequest, Authorizer, HmacTokenizer, InMemoryGroupStore,
	InMemoryPolicyStore, KeyId, KeyRequest, KeyType, ObjectRef, RequestContext, SubjectType,
	Tokenizer,
};
use warden_config::WardenConfig;

mod seed;
mod version;

/// Warden - identity keys and access decisions.
#[derive(Parser, Debug)]
#[command(name = "warden", about = "Warden identity and access control", version)]
struct Args {
	/// Configuration file (defaults to /etc/warden/auth.toml)
	#[arg(long, global = true, env = "WARDEN_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Sign a new key and print the token
	Issue {
		/// Subject the key identifies
		#[arg(long)]
		subject: String,

		#[arg(long, value_enum, default_value_t = KeyKind::User)]
		kind: KeyKind,

		#[arg(long)]
		email: Option<String>,

		/// Principal requesting the key (defaults to the subject)
		#[arg(long)]
		issuer: Option<String>,

		/// Key ID; generated for API keys when omitted
		#[arg(long)]
		id: Option<String>,

		/// Lifetime in seconds; defaults to the configured TTL for the kind
		#[arg(long)]
		ttl_secs: Option<u64>,
	},
	/// Validate a token and print its claims
	Parse {
		token: String,
	},
	/// Evaluate a decision against a seed file of groups and policies
	Check {
		/// TOML seed with groups, memberships and policies
		#[arg(long)]
		seed: PathBuf,

		#[arg(long)]
		subject: String,

		#[arg(long, value_enum, default_value_t = SubjectKind::User)]
		subject_type: SubjectKind,

		/// Object as type:id, e.g. channel:1
		#[arg(long)]
		object: String,

		#[arg(long)]
		action: String,
	},
	/// Show version and build information
	Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyKind {
	User,
	Api,
	Recovery,
}

impl From<KeyKind> for KeyType {
	fn from(kind: KeyKind) -> Self {
		match kind {
			KeyKind::User => KeyType::UserKey,
			KeyKind::Api => KeyType::ApiKey,
			KeyKind::Recovery => KeyType::RecoveryKey,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SubjectKind {
	User,
	Group,
	Thing,
}

impl From<SubjectKind> for SubjectType {
	fn from(kind: SubjectKind) -> Self {
		match kind {
			SubjectKind::User => SubjectType::User,
			SubjectKind::Group => SubjectType::Group,
			SubjectKind::Thing => SubjectType::Thing,
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	match args.command {
		Command::Issue {
			subject,
			kind,
			email,
			issuer,
			id,
			ttl_secs,
		} => {
			let config = setup(args.config.as_deref())?;
			let tokenizer = tokenizer(&config)?;
			let key_type = KeyType::from(kind);
			let mut request = KeyRequest::new(subject.clone())
				.with_type(key_type)
				.with_issuer(issuer.unwrap_or(subject));
			request.email = email;
			match (id, key_type) {
				(Some(id), _) => request = request.with_id(KeyId::new(id)),
				(None, KeyType::ApiKey) => request = request.with_id(KeyId::generate()),
				(None, _) => {}
			}
			let ttl = match (ttl_secs, key_type) {
				(Some(secs), _) => Some(Duration::from_secs(secs)),
				(None, KeyType::UserKey) => Some(config.tokens.user_key_ttl()),
				(None, KeyType::RecoveryKey) => Some(config.tokens.recovery_key_ttl()),
				(None, KeyType::ApiKey) => config.tokens.api_key_ttl(),
			};
			if let Some(ttl) = ttl {
				request = request.expires_in(ttl);
			}

			let (key, token) = tokenizer.issue_key(&request)?;
			tracing::info!(subject = %key.subject(), key_type = %key.key_type(), "issued key");
			println!("{token}");
		}
		Command::Parse { token } => {
			let config = setup(args.config.as_deref())?;
			let key = tokenizer(&config)?.parse(&token)?;
			println!("{}", serde_json::to_string_pretty(&key)?);
		}
		Command::Check {
			seed,
			subject,
			subject_type,
			object,
			action,
		} => {
			let config = setup(args.config.as_deref())?;
			let seed = seed::Seed::from_path(&seed)?;
			let groups = Arc::new(InMemoryGroupStore::new());
			let policies = Arc::new(InMemoryPolicyStore::new());
			seed.apply(groups.as_ref(), policies.as_ref()).await?;

			let engine = AuthorizationEngine::new(groups, policies)
				.with_decision_timeout(config.authz.decision_timeout());
			let object: ObjectRef = object.parse()?;
			let request = AuthorizeRequest::new(subject, object, action)
				.with_subject_type(subject_type.into());
			let decision = engine
				.authorize(&RequestContext::background(), &request)
				.await
				.context("decision could not be evaluated")?;

			println!("{}", serde_json::to_string_pretty(&decision)?);
			if !decision.is_allowed() {
				std::process::exit(1);
			}
		}
		Command::Version => println!("{}", version::format_version_info()),
	}

	Ok(())
}

/// Load configuration and start logging. `version` skips both.
fn setup(path: Option<&Path>) -> anyhow::Result<WardenConfig> {
	let config = match path {
		Some(path) => warden_config::load_config_with_file(path)?,
		None => warden_config::load_config()?,
	};
	init_tracing(&config);
	Ok(config)
}

fn tokenizer(config: &WardenConfig) -> anyhow::Result<HmacTokenizer> {
	match &config.tokens.secret {
		Some(secret) => Ok(HmacTokenizer::new(secret.clone())),
		None => bail!("no signing secret configured; set WARDEN_AUTH_SECRET or WARDEN_AUTH_SECRET_FILE"),
	}
}

fn init_tracing(config: &WardenConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let json = config.logging.json;

	tracing_subscriber::registry()
		.with(filter)
		.with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
		.with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
		.init();
}
