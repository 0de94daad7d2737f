//! # permit-policy
//!
//! Policy evaluation for the PERMIT engine.
//!
//! ## Overview
//!
//! - [`PolicyMatcher`] implements
//!   [`PolicyEvaluator`](permit_core::traits::PolicyEvaluator): it scans the
//!   enabled policies for an action by priority, checks state constraints and
//!   subjects, runs guards and returns the first decisive result.
//! - [`FallbackAdapter`] implements
//!   [`ActionGate`](permit_core::traits::ActionGate): it wraps the matcher
//!   with the legacy permissive default and the elevated ack override.
//! - [`TomlPolicyStore`] loads policies from a TOML file; [`config`] loads
//!   engine settings.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use permit_policy::{FallbackAdapter, PolicyMatcher, TomlPolicyStore};
//!
//! let store = TomlPolicyStore::from_file(Path::new("policies/erp.toml"))?;
//! let matcher = PolicyMatcher::new(Arc::new(store), guards, clock);
//! let gate = FallbackAdapter::new(Arc::new(matcher), &settings.engine);
//! // Pass `gate` to `permit_core::flow::ApprovalFlow::new(...)`.
//! ```

pub mod config;
pub mod fallback;
pub mod matcher;
pub mod store;

pub use config::{load_config_file, load_config_str};
pub use fallback::FallbackAdapter;
pub use matcher::PolicyMatcher;
pub use store::{PolicyConfig, TomlPolicyStore};
