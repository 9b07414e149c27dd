//! Core of evalkit: loads a promptfoo-style scaffold (root config, prompt
//! templates, test inputs, assertion sets), resolves its `file://`
//! references, composes the per-test assertion lists and checks the whole
//! thing for authoring errors before the external engine ever sees it.

pub mod compose;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod providers;
pub mod report;
pub mod resolve;
pub mod template;
pub mod validate;

pub use config::{load_config, path_resolver::PathResolver};
pub use resolve::{resolve, resolve_strict, ResolvedConfig, Resolver};
