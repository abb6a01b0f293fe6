//! SiteBlock Core Library
//!
//! This crate provides the blocking rule engine for SiteBlock. Users keep
//! named groups of blocked domains; while a group is active, every request to
//! one of its domains (or any subdomain) is redirected to a local page.
//!
//! # Architecture
//!
//! The interactive side mutates a [`GroupStore`], which mirrors every change
//! into a persistent [`store::KeyValueStore`]. The enforcement side runs a
//! [`ChangeReactor`] that listens for store change notifications, compiles the
//! active groups into a [`PatternSet`] and keeps exactly one intercept rule
//! installed in a [`RequestInterceptor`].
//!
//! # Modules
//!
//! - `domain`: URL input validation and base-domain normalization
//! - `url`: Allocation-free host extraction for request URLs
//! - `group`: The `Group` record
//! - `store`: Keyed persistent stores and change notifications
//! - `groups`: Group collection and the mutation API
//! - `pattern`: Exact / subdomain match patterns
//! - `compiler`: Active groups to pattern set
//! - `interceptor`: Installed rule and per-request decisions
//! - `reactor`: Rule state machine driven by change events
//! - `config`: Engine configuration

pub mod compiler;
pub mod config;
pub mod domain;
pub mod group;
pub mod groups;
pub mod interceptor;
pub mod pattern;
pub mod reactor;
pub mod store;
pub mod url;

// Re-export commonly used types
pub use compiler::{compile, compile_with_stats, CompileStats};
pub use config::{BlockerConfig, ConfigError};
pub use domain::{canonicalize, normalize, validate};
pub use group::Group;
pub use groups::{GroupError, GroupStore, WebsiteAdded};
pub use interceptor::{InterceptResult, InterceptRule, RequestInterceptor};
pub use pattern::{Pattern, PatternSet};
pub use reactor::{ChangeReactor, GroupSource, ReactorEvent, RuleState, RuleStateMachine, StoreSource, Transition};
pub use store::{ChangeEvent, FileStore, KeyValueStore, MemoryStore, StoreError, StoreWatcher};

/// Default key under which the group collection is persisted.
pub const GROUPS_KEY: &str = "groups";
