use evalkit_core::errors::Diagnostic;
use evalkit_core::providers::{check_env, required_credentials, unknown_providers, CredentialRequirement};
use evalkit_core::report::json::{build_envelope, emit_json, CommandInfo};
use evalkit_core::resolve::ResolvedConfig;
use serde::Serialize;

use crate::cli::args::{DoctorArgs, OutputFormat};
use crate::cli::commands::{command_args, exit_codes, load_issue_diagnostics, load_resolved};

#[derive(Debug, Serialize)]
struct CredentialStatus {
    #[serde(flatten)]
    requirement: CredentialRequirement,
    set: bool,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    credentials: Vec<CredentialStatus>,
    unknown_providers: Vec<String>,
    /// Load problems, so a half-broken scaffold is not mistaken for a fully checked one.
    load_issues: usize,
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn collect(resolved: &ResolvedConfig) -> (DoctorReport, Vec<Diagnostic>) {
    let mut diagnostics = check_env(resolved, env_lookup);
    diagnostics.extend(load_issue_diagnostics(resolved));
    evalkit_core::errors::diagnostic::sort_diagnostics(&mut diagnostics);

    let credentials = required_credentials(resolved)
        .into_iter()
        .map(|requirement| CredentialStatus {
            set: env_lookup(&requirement.env_var).is_some_and(|v| !v.trim().is_empty()),
            requirement,
        })
        .collect();

    let report = DoctorReport {
        credentials,
        unknown_providers: unknown_providers(resolved),
        load_issues: resolved.errors.len(),
    };
    (report, diagnostics)
}

pub fn run(args: DoctorArgs) -> anyhow::Result<i32> {
    let config = &args.config.config;
    let resolved = load_resolved(config)?;

    let (report, diagnostics) = collect(&resolved);
    // Missing keys are warnings: the scaffold is fine, the machine is not ready.
    let exit_code = if report.load_issues > 0 {
        exit_codes::TEST_FAILED
    } else {
        exit_codes::OK
    };

    match args.format {
        OutputFormat::Json => {
            let command = CommandInfo {
                name: "doctor".into(),
                args: command_args(config, args.format.as_str()),
                config_file: config.display().to_string(),
            };
            let mut payload = serde_json::to_value(&report)?;
            if let Some(obj) = payload.as_object_mut() {
                obj.insert(
                    "generated_at".to_string(),
                    serde_json::json!(chrono::Utc::now().to_rfc3339()),
                );
            }
            emit_json(&build_envelope(&command, &diagnostics, exit_code, payload), None)?;
        }
        OutputFormat::Text => print!("{}", format_text(&report, config)),
    }
    Ok(exit_code)
}

fn format_text(report: &DoctorReport, config: &std::path::Path) -> String {
    let mut out = format!("Config:   {}\n", config.display());
    if report.load_issues > 0 {
        out.push_str(&format!(
            "Status:   {} load issue(s); run 'evalkit validate' for details\n",
            report.load_issues
        ));
    }

    out.push_str("\nProvider credentials:\n");
    if report.credentials.is_empty() {
        out.push_str("  (none required)\n");
    }
    for c in &report.credentials {
        let mark = if c.set { "✔" } else { "✖" };
        out.push_str(&format!(
            "  {} {:<22} {}  [{}]\n",
            mark,
            c.requirement.env_var,
            if c.set { "set" } else { "missing" },
            c.requirement.providers.join(", ")
        ));
    }

    if !report.unknown_providers.is_empty() {
        out.push_str("\nUnrecognized providers (credentials not checked):\n");
        for p in &report.unknown_providers {
            out.push_str(&format!("  - {}\n", p));
        }
    }
    out
}
