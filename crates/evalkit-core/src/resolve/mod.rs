//! Reference resolution: turns a `RootConfig` full of `file://` strings into
//! loaded prompts, test cases and assertion lists.
//!
//! Every referenced file is read at most once per [`Resolver`], so a set shared
//! by several use cases hands every referrer the same records. Failures never
//! abort the walk; they are collected as [`LoadIssue`]s next to whatever did
//! load, and [`resolve_strict`] turns the first one into an error.

use crate::config::path_resolver::PathResolver;
use crate::config::{load_config, LoadedConfig, UnknownField};
use crate::errors::{ConfigError, LoadError};
use crate::model::{AssertionSpec, ProviderRef};
use crate::template::PromptTemplate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod resolver;
#[cfg(test)]
mod tests;

pub use resolver::Resolver;

/// A file read from disk, with its SHA-256 so reuse can be shown to be byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: String,
    pub digest: String,
    #[serde(skip)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAssertion {
    #[serde(flatten)]
    pub spec: AssertionSpec,
    /// `evals/quality.yaml#2` (1-based) or `inline`.
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTestCase {
    pub description: String,
    pub vars: BTreeMap<String, String>,
    pub assertions: Vec<ResolvedAssertion>,
    /// `test-inputs/translation.yaml#1` (1-based) or `inline#N`.
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrompt {
    pub label: String,
    /// Root-relative path of the file the prompt came from; `None` for inline prompts.
    pub source: Option<String>,
    pub template: PromptTemplate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUseCase {
    pub index: usize,
    pub description: String,
    pub prompts: Vec<ResolvedPrompt>,
    pub providers: Vec<ProviderRef>,
    pub tests: Vec<ResolvedTestCase>,
    pub default_vars: BTreeMap<String, String>,
    pub default_assertions: Vec<ResolvedAssertion>,
    /// `defaultTest.options.provider`
    pub grading_provider: Option<String>,
}

/// A load failure plus where in the configuration the failing reference sits.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadIssue {
    pub error: LoadError,
    pub site: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveWarning {
    OutsideRoot { reference: String, site: String },
    UnknownField(UnknownField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub config_path: String,
    pub base_dir: PathBuf,
    pub use_cases: Vec<ResolvedUseCase>,
    pub errors: Vec<LoadIssue>,
    pub warnings: Vec<ResolveWarning>,
    /// Every file that loaded, sorted by path.
    pub artifacts: Vec<Artifact>,
}

impl ResolvedConfig {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn use_case(&self, selector: &str) -> Option<&ResolvedUseCase> {
        if let Ok(n) = selector.parse::<usize>() {
            if n >= 1 {
                return self.use_cases.get(n - 1);
            }
        }
        self.use_cases
            .iter()
            .find(|uc| uc.description.eq_ignore_ascii_case(selector))
    }
}

/// Loads the root config at `config_path` and resolves every reference in it.
///
/// Only an unreadable or unparsable root config is an `Err`; broken references
/// end up in [`ResolvedConfig::errors`].
pub fn resolve(config_path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let loaded = load_config(config_path)?;
    Ok(resolve_loaded(
        &loaded,
        config_path,
        PathResolver::new(config_path),
    ))
}

pub fn resolve_loaded(
    loaded: &LoadedConfig,
    config_path: &Path,
    paths: PathResolver,
) -> ResolvedConfig {
    let mut resolver = Resolver::new(paths);
    resolver.resolve_config(loaded, config_path)
}

/// Like [`resolve`], but any load issue is fatal.
pub fn resolve_strict(config_path: &Path) -> anyhow::Result<ResolvedConfig> {
    let resolved = resolve(config_path)?;
    if let Some(issue) = resolved.errors.first() {
        return Err(anyhow::Error::new(issue.error.clone())
            .context(format!("while resolving {}", issue.site)));
    }
    Ok(resolved)
}
