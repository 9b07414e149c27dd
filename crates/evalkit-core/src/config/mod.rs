use crate::errors::ConfigError;
use crate::model::{RootConfig, UseCaseConfig};
use serde::de::DeserializeOwned;
use std::path::Path;

pub mod path_resolver;

/// A key the loader did not recognise, e.g. `[0].defaultTest.asert`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UnknownField {
    pub file: String,
    pub field: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedConfig {
    pub config: RootConfig,
    pub unknown_fields: Vec<UnknownField>,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let shown = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: shown.clone(),
            }
        } else {
            ConfigError::Read {
                path: shown.clone(),
                detail: e.to_string(),
            }
        }
    })?;
    tracing::debug!(config = %shown, bytes = raw.len(), "loading root config");
    parse_config(&raw, &shown)
}

/// Parses root config text. `file` only labels errors and unknown-field reports.
pub fn parse_config(raw: &str, file: &str) -> Result<LoadedConfig, ConfigError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
        path: file.to_string(),
        detail: e.to_string(),
    })?;

    let shape = |detail: &str| ConfigError::Shape {
        path: file.to_string(),
        detail: detail.to_string(),
    };

    let (docs, single) = match doc {
        serde_yaml::Value::Sequence(items) => (items, false),
        m @ serde_yaml::Value::Mapping(_) => (vec![m], true),
        serde_yaml::Value::Null => return Err(shape("config is empty")),
        _ => {
            return Err(shape(
                "expected a use-case mapping or a sequence of use-case mappings",
            ))
        }
    };
    if docs.is_empty() {
        return Err(shape("config declares no use cases"));
    }

    let mut unknown_fields = Vec::new();
    let mut use_cases = Vec::with_capacity(docs.len());
    for (idx, item) in docs.into_iter().enumerate() {
        if !item.is_mapping() {
            return Err(shape(&format!("use case #{} is not a mapping", idx + 1)));
        }
        let prefix = if single {
            String::new()
        } else {
            format!("[{}]", idx)
        };
        let (uc, ignored) =
            from_value_tracked::<UseCaseConfig>(item).map_err(|detail| ConfigError::Shape {
                path: file.to_string(),
                detail: if single {
                    detail
                } else {
                    format!("use case #{}: {}", idx + 1, detail)
                },
            })?;
        unknown_fields.extend(ignored.into_iter().map(|field| UnknownField {
            file: file.to_string(),
            field: join_field(&prefix, &field),
        }));
        use_cases.push(uc);
    }

    for f in &unknown_fields {
        tracing::warn!(file = %f.file, field = %f.field, "unknown config field");
    }

    Ok(LoadedConfig {
        config: RootConfig { use_cases },
        unknown_fields,
    })
}

/// Deserializes `value`, collecting the paths of keys the target type ignored.
pub(crate) fn from_value_tracked<T: DeserializeOwned>(
    value: serde_yaml::Value,
) -> Result<(T, Vec<String>), String> {
    let mut ignored = Vec::new();
    let parsed = serde_ignored::deserialize(value, |path| ignored.push(path.to_string()))
        .map_err(|e: serde_yaml::Error| e.to_string())?;
    Ok((parsed, ignored))
}

/// `serde_ignored` marks `Option` layers with `?`; drop them from the dotted path.
fn join_field(prefix: &str, field: &str) -> String {
    let field = field
        .split('.')
        .filter(|seg| !seg.is_empty() && *seg != "?")
        .collect::<Vec<_>>()
        .join(".");
    if prefix.is_empty() {
        field
    } else {
        format!("{}.{}", prefix, field)
    }
}
