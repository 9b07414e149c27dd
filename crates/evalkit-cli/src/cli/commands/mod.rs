pub mod dispatch;
pub mod doctor;
pub mod init;
pub mod plan;
pub mod render;
pub mod validate;

pub use crate::exit_codes;
pub use dispatch::dispatch;

use evalkit_core::resolve::{resolve, ResolvedConfig};
use std::path::Path;

/// Resolves the root config. A config that cannot be loaded propagates as a
/// `ConfigError`, which `main` reports as a diagnostic with `CONFIG_ERROR`.
pub(crate) fn load_resolved(config: &Path) -> anyhow::Result<ResolvedConfig> {
    let resolved = resolve(config)?;
    tracing::debug!(
        config = %config.display(),
        use_cases = resolved.use_cases.len(),
        artifacts = resolved.artifacts.len(),
        "resolved configuration"
    );
    Ok(resolved)
}

/// Load issues as diagnostics, for commands that continue past them.
pub(crate) fn load_issue_diagnostics(
    resolved: &ResolvedConfig,
) -> Vec<evalkit_core::errors::Diagnostic> {
    let mut diags: Vec<_> = resolved
        .errors
        .iter()
        .map(|i| i.error.to_diagnostic(&i.site))
        .collect();
    evalkit_core::errors::diagnostic::sort_diagnostics(&mut diags);
    diags
}

pub(crate) fn command_args(config: &Path, format: &str) -> Vec<String> {
    vec![
        "--config".into(),
        config.display().to_string(),
        "--format".into(),
        format.into(),
    ]
}
