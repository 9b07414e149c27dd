use evalkit_core::report::json::{build_envelope, emit_json, CommandInfo};
use evalkit_core::report::{console, sarif};
use evalkit_core::resolve::resolve;
use evalkit_core::validate::{validate, ValidateReport};

use crate::cli::args::{ValidateArgs, ValidateOutputFormat};
use crate::cli::commands::{command_args, exit_codes};

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let config = &args.config.config;

    let report = match resolve(config) {
        Ok(resolved) => validate(&resolved),
        Err(e) => {
            let report = ValidateReport {
                diagnostics: vec![e.to_diagnostic()],
            };
            let exit_code = exit_codes::CONFIG_ERROR;
            print_report(&report, &args, exit_code)?;
            return Ok(exit_code);
        }
    };

    let exit_code = decide_validate_exit(&report, args.deny_warnings);
    tracing::debug!(
        errors = report.error_count(),
        warnings = report.warn_count(),
        exit_code,
        "validate finished"
    );
    print_report(&report, &args, exit_code)?;
    Ok(exit_code)
}

/// Any error is an authoring failure; the config itself loaded, or we would
/// not be here.
fn decide_validate_exit(report: &ValidateReport, deny_warnings: bool) -> i32 {
    if report.has_errors() || (deny_warnings && report.warn_count() > 0) {
        exit_codes::TEST_FAILED
    } else {
        exit_codes::OK
    }
}

fn print_report(report: &ValidateReport, args: &ValidateArgs, exit_code: i32) -> anyhow::Result<()> {
    match args.format {
        ValidateOutputFormat::Sarif => match &args.output {
            Some(path) => {
                sarif::write_sarif_diagnostics("evalkit", &report.diagnostics, Some(exit_code), path)?;
                eprintln!("SARIF report written to {}", path.display());
            }
            None => {
                let doc = sarif::build_sarif_diagnostics("evalkit", &report.diagnostics, Some(exit_code));
                emit_json(&doc, None)?;
            }
        },
        ValidateOutputFormat::Json => {
            let doc = build_validate_json(report, args, exit_code);
            emit_json(&doc, args.output.as_deref())?;
        }
        ValidateOutputFormat::Text => {
            // Human-readable output always goes to stderr.
            eprint!("{}", console::format_report(&report.diagnostics));
        }
    }
    Ok(())
}

fn build_validate_json(report: &ValidateReport, args: &ValidateArgs, exit_code: i32) -> serde_json::Value {
    let mut argv = command_args(&args.config.config, args.format.as_str());
    if let Some(output) = &args.output {
        argv.push("--output".into());
        argv.push(output.display().to_string());
    }
    if args.deny_warnings {
        argv.push("--deny-warnings".into());
    }
    let command = CommandInfo {
        name: "validate".into(),
        args: argv,
        config_file: args.config.config.display().to_string(),
    };
    build_envelope(&command, &report.diagnostics, exit_code, serde_json::Value::Null)
}
