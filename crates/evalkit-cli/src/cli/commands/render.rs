use evalkit_core::compose::{plan_use_case, PlannedCase};
use evalkit_core::report::console;
use evalkit_core::report::json::{build_envelope, emit_json, CommandInfo};
use evalkit_core::resolve::{ResolvedConfig, ResolvedUseCase};
use serde::Serialize;

use crate::cli::args::{OutputFormat, RenderArgs};
use crate::cli::commands::{command_args, exit_codes, load_issue_diagnostics, load_resolved};

#[derive(Serialize)]
struct RenderedView<'a> {
    use_case: &'a str,
    prompt: &'a str,
    test: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rendered: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a PlannedCase> for RenderedView<'a> {
    fn from(c: &'a PlannedCase) -> Self {
        Self {
            use_case: &c.use_case,
            prompt: &c.prompt,
            test: &c.test,
            rendered: c.rendered.as_deref(),
            error: c.render_error.as_deref(),
        }
    }
}

pub fn run(args: RenderArgs) -> anyhow::Result<i32> {
    let config = &args.config.config;
    let resolved = load_resolved(config)?;

    let selected = select_use_cases(&resolved, args.use_case.as_deref())?;
    let cases: Vec<PlannedCase> = selected.into_iter().flat_map(plan_use_case).collect();
    let diagnostics = load_issue_diagnostics(&resolved);

    let failures = cases.iter().filter(|c| !c.rendered_ok()).count();
    let exit_code = if failures > 0 || !diagnostics.is_empty() {
        exit_codes::TEST_FAILED
    } else {
        exit_codes::OK
    };

    match args.format {
        OutputFormat::Json => {
            let mut argv = command_args(config, args.format.as_str());
            if let Some(sel) = &args.use_case {
                argv.push("--use-case".into());
                argv.push(sel.clone());
            }
            let command = CommandInfo {
                name: "render".into(),
                args: argv,
                config_file: config.display().to_string(),
            };
            let views: Vec<RenderedView<'_>> = cases.iter().map(RenderedView::from).collect();
            let doc = build_envelope(
                &command,
                &diagnostics,
                exit_code,
                serde_json::json!({ "cases": views, "render_failures": failures }),
            );
            emit_json(&doc, None)?;
        }
        OutputFormat::Text => {
            if !diagnostics.is_empty() {
                eprint!("{}", console::format_report(&diagnostics));
            }
            for case in &cases {
                print_case(case);
            }
            eprintln!(
                "{} prompt(s) rendered, {} failed",
                cases.len() - failures,
                failures
            );
        }
    }
    Ok(exit_code)
}

fn print_case(case: &PlannedCase) {
    println!(
        "=== [{}] {} | {} | {}",
        case.use_case_index + 1,
        case.use_case,
        case.prompt,
        case.test
    );
    match (&case.rendered, &case.render_error) {
        (Some(text), _) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
        }
        (None, Some(err)) => println!("✖ {}", err),
        (None, None) => {}
    }
    println!();
}

fn select_use_cases<'a>(
    resolved: &'a ResolvedConfig,
    selector: Option<&str>,
) -> anyhow::Result<Vec<&'a ResolvedUseCase>> {
    let Some(sel) = selector else {
        return Ok(resolved.use_cases.iter().collect());
    };
    match resolved.use_case(sel) {
        Some(uc) => Ok(vec![uc]),
        None => {
            let available: Vec<String> = resolved
                .use_cases
                .iter()
                .map(|uc| format!("{} ({})", uc.index + 1, uc.description))
                .collect();
            anyhow::bail!(
                "no use case matches '{}'; available: {}",
                sel,
                available.join(", ")
            )
        }
    }
}
