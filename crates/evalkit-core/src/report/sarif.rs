use crate::errors::diagnostic::Diagnostic;
use crate::model::FILE_SCHEME;
use std::path::Path;

/// SARIF schema version written by every evalkit SARIF producer.
pub const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

fn normalize_severity(s: &str) -> &'static str {
    match s {
        "error" | "ERROR" => "error",
        "warn" | "warning" | "WARN" | "WARNING" => "warning",
        _ => "note",
    }
}

/// Repo-relative URI: no `file://` scheme, no `#N` entry suffix.
fn artifact_uri(file: &str) -> &str {
    let file = file.strip_prefix(FILE_SCHEME).unwrap_or(file);
    file.split('#').next().unwrap_or(file)
}

/// Validation diagnostics as a SARIF 2.1.0 log, one result per diagnostic.
///
/// Diagnostics with a `file` context entry get a physical location so code
/// scanning UIs can annotate the referenced scaffold file.
pub fn build_sarif_diagnostics(
    tool_name: &str,
    diagnostics: &[Diagnostic],
    exit_code: Option<i32>,
) -> serde_json::Value {
    let sarif_results: Vec<serde_json::Value> = diagnostics
        .iter()
        .map(|d| {
            let locations = match d.file() {
                Some(file) => vec![serde_json::json!({
                    "physicalLocation": {
                        "artifactLocation": { "uri": artifact_uri(file) }
                    }
                })],
                None => vec![],
            };

            let mut text = d.message.clone();
            for step in &d.fix_steps {
                text.push_str("\nfix: ");
                text.push_str(step);
            }

            serde_json::json!({
                "ruleId": d.code,
                "level": normalize_severity(&d.severity),
                "message": { "text": text },
                "locations": locations
            })
        })
        .collect();

    let execution_successful = !diagnostics
        .iter()
        .any(|d| normalize_severity(&d.severity) == "error");

    let mut invocation = serde_json::json!({ "executionSuccessful": execution_successful });
    if let Some(code) = exit_code {
        invocation["exitCode"] = serde_json::json!(code);
    }

    serde_json::json!({
        "version": "2.1.0",
        "$schema": SARIF_SCHEMA,
        "runs": [{
            "tool": {
                "driver": {
                    "name": tool_name,
                    "version": env!("CARGO_PKG_VERSION")
                }
            },
            "results": sarif_results,
            "invocations": [invocation]
        }]
    })
}

pub fn write_sarif_diagnostics(
    tool_name: &str,
    diagnostics: &[Diagnostic],
    exit_code: Option<i32>,
    out: &Path,
) -> anyhow::Result<()> {
    let doc = build_sarif_diagnostics(tool_name, diagnostics, exit_code);
    std::fs::write(out, serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}
