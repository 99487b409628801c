// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

pub mod authz;
pub mod logging;
pub mod tokens;

pub use authz::{AuthzConfig, AuthzConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use tokens::{TokenConfig, TokenConfigLayer};
