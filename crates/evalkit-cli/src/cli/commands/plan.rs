use evalkit_core::compose::{plan, Plan, PlannedCase};
use evalkit_core::report::console;
use evalkit_core::report::json::{build_envelope, emit_json, CommandInfo};

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::commands::{command_args, exit_codes, load_issue_diagnostics, load_resolved};

pub fn run(args: PlanArgs) -> anyhow::Result<i32> {
    let config = &args.config.config;
    let resolved = load_resolved(config)?;

    let plan = plan(&resolved);
    let diagnostics = load_issue_diagnostics(&resolved);
    let exit_code = if plan.render_failures() > 0 || !diagnostics.is_empty() {
        exit_codes::TEST_FAILED
    } else {
        exit_codes::OK
    };

    match args.format {
        OutputFormat::Json => {
            let command = CommandInfo {
                name: "plan".into(),
                args: command_args(config, args.format.as_str()),
                config_file: config.display().to_string(),
            };
            let payload = serde_json::json!({
                "cases": plan.cases,
                "case_count": plan.cases.len(),
                "assertion_count": plan.assertion_count(),
                "render_failures": plan.render_failures(),
            });
            emit_json(&build_envelope(&command, &diagnostics, exit_code, payload), None)?;
        }
        OutputFormat::Text => {
            if !diagnostics.is_empty() {
                eprint!("{}", console::format_report(&diagnostics));
            }
            print!("{}", format_plan(&plan));
        }
    }
    Ok(exit_code)
}

fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let mut current: Option<usize> = None;
    for case in &plan.cases {
        if current != Some(case.use_case_index) {
            current = Some(case.use_case_index);
            out.push_str(&format!(
                "[{}] {}  providers: {}\n",
                case.use_case_index + 1,
                case.use_case,
                case.providers.join(", ")
            ));
        }
        out.push_str(&format_case(case));
    }
    out.push_str(&format!(
        "\n{} case(s), {} assertion(s), {} render failure(s)\n",
        plan.cases.len(),
        plan.assertion_count(),
        plan.render_failures()
    ));
    out
}

fn format_case(case: &PlannedCase) -> String {
    let status = if case.rendered_ok() { "✔" } else { "✖" };
    let mut s = format!(
        "  {} {} × {}  ({})\n",
        status,
        case.prompt,
        case.test,
        case.fingerprint
            .as_deref()
            .map(|f| &f[..12.min(f.len())])
            .unwrap_or("no fingerprint")
    );
    for a in &case.assertions {
        let spec = &a.assertion.spec;
        let mut line = format!("      - {}", spec.assert_type);
        if let Some(t) = spec.threshold {
            line.push_str(&format!(" (threshold {})", t));
        }
        if let Some(grader) = &a.grading_provider {
            line.push_str(&format!(" graded by {}", grader));
        }
        line.push_str(&format!("  [{}]\n", a.assertion.origin));
        s.push_str(&line);
    }
    for m in &case.missing_variables {
        s.push_str(&format!("      ! missing var `{}`\n", m.name));
    }
    s
}
