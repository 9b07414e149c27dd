pub mod diagnostic;
pub mod similarity;

pub use diagnostic::Diagnostic;

use crate::model::FILE_SCHEME;
use crate::template::TemplateError;
use diagnostic::codes;
use thiserror::Error;

/// The root configuration could not be turned into a `RootConfig`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read config {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse YAML in {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("invalid config {path}: {detail}")]
    Shape { path: String, detail: String },
}

impl ConfigError {
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path }
            | Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Shape { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = if self.is_not_found() {
            codes::E_PATH_NOT_FOUND
        } else {
            codes::E_CFG_PARSE
        };
        Diagnostic::new(code, self.to_string())
            .with_source("config")
            .with_context(serde_json::json!({ "file": self.path() }))
            .with_fix_step("Run `evalkit init` to write a fresh scaffold, or fix the file by hand")
    }
}

/// A single `file://` reference (or inline entry) that could not be loaded.
///
/// Paths are repository-root relative so messages read the same on every machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("referenced file not found: {reference}")]
    NotFound { reference: String },

    #[error("glob matched no files: {reference}")]
    EmptyGlob { reference: String },

    #[error("failed to read {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse YAML in {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("unexpected shape in {path}: {detail}")]
    Shape { path: String, detail: String },

    #[error("reference cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("unsupported reference scheme `{scheme}://` in {reference} (only file:// is supported)")]
    UnsupportedScheme { reference: String, scheme: String },

    #[error("template error in {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: TemplateError,
    },
}

impl LoadError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::EmptyGlob { .. } => codes::E_PATH_NOT_FOUND,
            Self::Read { .. } | Self::Parse { .. } | Self::Shape { .. } => codes::E_CFG_PARSE,
            Self::Cycle { .. } => codes::E_REF_CYCLE,
            Self::UnsupportedScheme { .. } => codes::E_REF_SCHEME,
            Self::Template { .. } => codes::E_TEMPLATE_SYNTAX,
        }
    }

    /// The file the error is about, when there is one. `file://` is dropped so
    /// the value is a root-relative path.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::NotFound { reference } | Self::EmptyGlob { reference } => {
                Some(reference.strip_prefix(FILE_SCHEME).unwrap_or(reference))
            }
            Self::UnsupportedScheme { reference, .. } => Some(reference),
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Shape { path, .. }
            | Self::Template { path, .. } => Some(path),
            Self::Cycle { chain } => chain.first().map(String::as_str),
        }
    }

    fn fix_step(&self) -> String {
        match self {
            Self::NotFound { reference } => format!(
                "Create {} or fix the reference (paths are relative to the directory holding the root config)",
                reference
            ),
            Self::EmptyGlob { reference } => {
                format!("Add at least one file matching {} or remove the reference", reference)
            }
            Self::Read { .. } => "Check file permissions and encoding (UTF-8 expected)".into(),
            Self::Parse { .. } => "Fix the YAML syntax; `yamllint` points at the exact line".into(),
            Self::Shape { .. } => {
                "Compare the file with the scaffold written by `evalkit init`".into()
            }
            Self::Cycle { .. } => "Remove one of the file:// entries that closes the loop".into(),
            Self::UnsupportedScheme { .. } => {
                "Vendor the file into the repository and reference it with file://".into()
            }
            Self::Template { .. } => {
                "Placeholders look like {{name}} or {{name | upper}}; close every {{ with }}".into()
            }
        }
    }

    pub fn to_diagnostic(&self, site: &str) -> Diagnostic {
        let mut diag = Diagnostic::new(self.code(), self.to_string())
            .with_source("resolve")
            .with_context_entry("referenced_from", serde_json::json!(site))
            .with_fix_step(self.fix_step());
        if let Some(file) = self.file() {
            diag = diag.with_context_entry("file", serde_json::json!(file));
        }
        if let Self::Cycle { chain } = self {
            diag = diag.with_context_entry("chain", serde_json::json!(chain));
        }
        diag
    }
}

/// Maps an error that escaped to the CLI boundary onto a Diagnostic, when it is one of ours.
pub fn try_map_error(err: &anyhow::Error) -> Option<Diagnostic> {
    if let Some(diag) = err.downcast_ref::<Diagnostic>() {
        return Some(diag.clone());
    }
    if let Some(cfg) = err.downcast_ref::<ConfigError>() {
        return Some(cfg.to_diagnostic());
    }
    if let Some(load) = err.downcast_ref::<LoadError>() {
        return Some(load.to_diagnostic("config"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_map_to_stable_codes() {
        let missing = LoadError::NotFound {
            reference: "file://evals/missing.yaml".into(),
        };
        assert_eq!(missing.code(), codes::E_PATH_NOT_FOUND);
        assert_eq!(missing.file(), Some("evals/missing.yaml"));

        let cycle = LoadError::Cycle {
            chain: vec!["evals/a.yaml".into(), "evals/b.yaml".into(), "evals/a.yaml".into()],
        };
        assert_eq!(cycle.code(), codes::E_REF_CYCLE);
        assert_eq!(
            cycle.to_string(),
            "reference cycle: evals/a.yaml -> evals/b.yaml -> evals/a.yaml"
        );
    }

    #[test]
    fn diagnostic_carries_site_and_file() {
        let err = LoadError::Parse {
            path: "test-inputs/bad.yaml".into(),
            detail: "did not find expected key".into(),
        };
        let d = err.to_diagnostic("use case 1 (Translation) tests[0]");
        assert_eq!(d.code, codes::E_CFG_PARSE);
        assert_eq!(d.file(), Some("test-inputs/bad.yaml"));
        assert_eq!(
            d.context["referenced_from"],
            serde_json::json!("use case 1 (Translation) tests[0]")
        );
    }

    #[test]
    fn missing_config_maps_to_path_not_found() {
        let err = ConfigError::NotFound {
            path: "promptfooconfig.yaml".into(),
        };
        let mapped = try_map_error(&anyhow::Error::new(err)).unwrap();
        assert_eq!(mapped.code, codes::E_PATH_NOT_FOUND);
    }
}
