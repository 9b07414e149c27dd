use crate::errors::diagnostic::{severity_rank, Diagnostic};
use serde::Serialize;
use std::path::Path;

/// Version of the JSON envelope printed by `--format json`.
pub const JSON_SCHEMA_VERSION: u32 = 1;

fn normalize_severity(s: &str) -> &'static str {
    match s {
        "error" | "ERROR" => "error",
        "warn" | "warning" | "WARN" | "WARNING" => "warn",
        _ => "note",
    }
}

#[derive(Debug, Serialize)]
pub struct DiagView<'a> {
    pub code: &'a str,
    pub severity: &'static str,
    pub source: &'a str,
    pub message: &'a str,
    pub context: &'a serde_json::Value,
    pub fix_steps: &'a [String],
}

impl<'a> From<&'a Diagnostic> for DiagView<'a> {
    fn from(d: &'a Diagnostic) -> Self {
        Self {
            code: d.code.as_str(),
            severity: normalize_severity(d.severity.as_str()),
            source: d.source.as_str(),
            message: d.message.as_str(),
            context: &d.context,
            fix_steps: &d.fix_steps,
        }
    }
}

/// What a command was asked to do, echoed back in the envelope.
#[derive(Debug, Clone, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub args: Vec<String>,
    pub config_file: String,
}

/// The machine-readable result of a command: diagnostics in deterministic
/// order plus counts. `payload` carries the command-specific body (plan, env
/// checks) and is omitted when null.
pub fn build_envelope(
    command: &CommandInfo,
    diagnostics: &[Diagnostic],
    exit_code: i32,
    payload: serde_json::Value,
) -> serde_json::Value {
    let mut diags: Vec<&Diagnostic> = diagnostics.iter().collect();
    diags.sort_by(|a, b| {
        (
            severity_rank(normalize_severity(&a.severity)),
            a.code.as_str(),
            a.message.as_str(),
            a.file().unwrap_or(""),
        )
            .cmp(&(
                severity_rank(normalize_severity(&b.severity)),
                b.code.as_str(),
                b.message.as_str(),
                b.file().unwrap_or(""),
            ))
    });
    let views: Vec<DiagView<'_>> = diags.into_iter().map(DiagView::from).collect();

    let error_count = views.iter().filter(|d| d.severity == "error").count();
    let warn_count = views.iter().filter(|d| d.severity == "warn").count();
    let note_count = views.len() - error_count - warn_count;

    let mut doc = serde_json::json!({
        "schema_version": JSON_SCHEMA_VERSION,
        "ok": error_count == 0,
        "exit_code": exit_code,
        "tool": {
            "name": "evalkit",
            "version": env!("CARGO_PKG_VERSION")
        },
        "command": command,
        "diagnostics": views,
        "summary": {
            "diagnostic_count": views.len(),
            "error_count": error_count,
            "warn_count": warn_count,
            "note_count": note_count
        }
    });
    if !payload.is_null() {
        doc["result"] = payload;
    }
    doc
}

/// Pretty JSON to `out`, or stdout when no path is given.
pub fn emit_json(doc: &serde_json::Value, out: Option<&Path>) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(doc)?;
    match out {
        Some(path) => std::fs::write(path, s)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?,
        None => println!("{}", s),
    }
    Ok(())
}
