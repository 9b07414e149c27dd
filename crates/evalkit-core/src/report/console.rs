use crate::errors::diagnostic::Diagnostic;

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// One-line verdict for a list of diagnostics.
pub fn summary_line(diagnostics: &[Diagnostic]) -> String {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = diagnostics.iter().filter(|d| d.is_warning()).count();
    if errors > 0 {
        format!(
            "✖ Validation failed ({} error{}, {} warning{})",
            errors,
            plural(errors),
            warnings,
            plural(warnings)
        )
    } else if warnings > 0 {
        format!(
            "⚠️  Validation passed with warnings ({} warning{})",
            warnings,
            plural(warnings)
        )
    } else {
        "✔ Validation OK".to_string()
    }
}

/// Summary line, a blank line, then every diagnostic in terminal form.
pub fn format_report(diagnostics: &[Diagnostic]) -> String {
    let mut out = summary_line(diagnostics);
    out.push_str("\n\n");
    for d in diagnostics {
        out.push_str(&d.format_terminal());
        out.push('\n');
    }
    out
}
