//! Structural checks over a resolved scaffold: broken references, placeholder
//! coverage, unused variables and assertion specs the engine would reject.

use crate::compose::effective_vars;
use crate::config::path_resolver::{PathResolver, Reference};
use crate::errors::diagnostic::{codes, sort_diagnostics, Diagnostic};
use crate::errors::similarity::closest_match;
use crate::model::{scalar_to_string, AssertionKind, AssertionSpec};
use crate::resolve::{ResolveWarning, ResolvedAssertion, ResolvedConfig, ResolvedUseCase};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidateReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidateReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warn_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn codes(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }
}

pub fn validate(resolved: &ResolvedConfig) -> ValidateReport {
    let mut diags = Vec::new();

    for issue in &resolved.errors {
        diags.push(issue.error.to_diagnostic(&issue.site));
    }
    for warning in &resolved.warnings {
        diags.push(warning_diagnostic(warning));
    }

    let paths = PathResolver::from_root(resolved.base_dir.clone());
    let config_file = std::path::Path::new(&resolved.config_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| resolved.config_path.clone());
    let mut checked = HashSet::new();
    for uc in &resolved.use_cases {
        check_use_case_shape(uc, &mut diags);
        check_placeholder_coverage(uc, &mut diags);
        check_unused_vars(uc, &mut diags);

        let site = format!("use case {} ({}): defaultTest.assert", uc.index + 1, uc.description);
        for (i, a) in uc.default_assertions.iter().enumerate() {
            let location = AssertionLocation::new(a, &site, i, None, &config_file);
            check_assertion_once(a, location, &paths, &mut checked, &mut diags);
        }
        for tc in &uc.tests {
            let site = format!("{}: assert", tc.origin);
            // Test cases loaded from a file are shared by every use case referencing it.
            let test_file = (!tc.origin.starts_with("inline#")).then_some(file_part(&tc.origin));
            for (i, a) in tc.assertions.iter().enumerate() {
                let location = AssertionLocation::new(a, &site, i, test_file, &config_file);
                check_assertion_once(a, location, &paths, &mut checked, &mut diags);
            }
        }
    }

    sort_diagnostics(&mut diags);
    tracing::debug!(count = diags.len(), "validation finished");
    ValidateReport { diagnostics: diags }
}

fn warning_diagnostic(warning: &ResolveWarning) -> Diagnostic {
    match warning {
        ResolveWarning::OutsideRoot { reference, site } => Diagnostic::new(
            codes::W_REF_OUTSIDE_ROOT,
            format!("reference leaves the repository root: {}", reference),
        )
        .with_source("resolve")
        .with_context(serde_json::json!({ "file": reference, "referenced_from": site }))
        .with_fix_step("Move the file under the directory holding the root config"),
        ResolveWarning::UnknownField(f) => Diagnostic::new(
            codes::W_CFG_UNKNOWN_FIELD,
            format!("unknown field `{}` (ignored)", f.field),
        )
        .with_source("config")
        .with_context(serde_json::json!({ "file": f.file, "field": f.field }))
        .with_fix_step("Check the spelling; unknown keys are dropped before evaluation"),
    }
}

fn use_case_context(uc: &ResolvedUseCase) -> serde_json::Value {
    serde_json::json!({ "use_case": uc.description, "use_case_index": uc.index + 1 })
}

fn check_use_case_shape(uc: &ResolvedUseCase, diags: &mut Vec<Diagnostic>) {
    let mut missing = Vec::new();
    if uc.prompts.is_empty() {
        missing.push("prompts");
    }
    if uc.tests.is_empty() {
        missing.push("tests");
    }
    if missing.is_empty() {
        return;
    }
    diags.push(
        Diagnostic::new(
            codes::W_USECASE_EMPTY,
            format!(
                "use case '{}' has no {}; it contributes nothing to the evaluation",
                uc.description,
                missing.join(" and ")
            ),
        )
        .with_source("validate.use_case")
        .with_context(use_case_context(uc)),
    );
}

fn check_placeholder_coverage(uc: &ResolvedUseCase, diags: &mut Vec<Diagnostic>) {
    for prompt in &uc.prompts {
        for tc in &uc.tests {
            let vars = effective_vars(uc, tc);
            for missing in prompt.template.missing_variables(&vars) {
                let mut d = Diagnostic::new(
                    codes::E_VAR_MISSING,
                    format!(
                        "placeholder {{{{{}}}}} in {} has no value in test '{}'",
                        missing.name, prompt.label, tc.description
                    ),
                )
                .with_source("validate.vars")
                .with_context(use_case_context(uc))
                .with_context_entry(
                    "file",
                    serde_json::json!(prompt.source.as_deref().unwrap_or(&prompt.label)),
                )
                .with_context_entry("prompt", serde_json::json!(prompt.label))
                .with_context_entry("test", serde_json::json!(tc.origin))
                .with_context_entry("variable", serde_json::json!(missing.name));
                if let Some(s) = &missing.suggestion {
                    d = d.with_fix_step(format!("Rename var `{}` to `{}` in {}", s, missing.name, tc.origin));
                }
                d = d.with_fix_step(format!(
                    "Add `{}` to the vars of {} or to defaultTest.vars",
                    missing.name, tc.origin
                ));
                diags.push(d);
            }
        }
    }
}

fn check_unused_vars(uc: &ResolvedUseCase, diags: &mut Vec<Diagnostic>) {
    if uc.prompts.is_empty() {
        return;
    }
    let used: BTreeSet<&str> = uc
        .prompts
        .iter()
        .flat_map(|p| p.template.variables().iter().map(String::as_str))
        .collect();
    for tc in &uc.tests {
        for name in tc.vars.keys().filter(|n| !used.contains(n.as_str())) {
            let mut d = Diagnostic::new(
                codes::W_VAR_UNUSED,
                format!(
                    "var `{}` of test '{}' is not used by any prompt of '{}'",
                    name, tc.description, uc.description
                ),
            )
            .with_source("validate.vars")
            .with_context(use_case_context(uc))
            .with_context_entry("test", serde_json::json!(tc.origin))
            .with_context_entry("variable", serde_json::json!(name));
            if let Some(m) = closest_match(name, used.iter().copied()) {
                d = d.with_fix_step(format!("Did you mean `{}`?", m.candidate));
            }
            diags.push(d);
        }
    }
}

/// Where an assertion was written, and whether that place is shared between use cases.
struct AssertionLocation {
    file: String,
    origin: String,
    shared: bool,
}

impl AssertionLocation {
    fn new(
        a: &ResolvedAssertion,
        site: &str,
        index: usize,
        test_file: Option<&str>,
        config_file: &str,
    ) -> Self {
        if a.origin != "inline" {
            return Self {
                file: file_part(&a.origin).to_string(),
                origin: a.origin.clone(),
                shared: true,
            };
        }
        Self {
            file: test_file.unwrap_or(config_file).to_string(),
            origin: format!("{}[{}]", site, index),
            shared: test_file.is_some(),
        }
    }
}

/// `evals/quality.yaml#2` -> `evals/quality.yaml`
fn file_part(origin: &str) -> &str {
    origin.split('#').next().unwrap_or(origin)
}

/// Assertions written in a file are checked once per entry, however many use
/// cases share the file.
fn check_assertion_once(
    a: &ResolvedAssertion,
    location: AssertionLocation,
    paths: &PathResolver,
    seen: &mut HashSet<String>,
    diags: &mut Vec<Diagnostic>,
) {
    if location.shared && !seen.insert(location.origin.clone()) {
        return;
    }
    for d in check_assertion(&a.spec, paths) {
        diags.push(
            d.with_source("validate.assert")
                .with_context_entry("file", serde_json::json!(location.file))
                .with_context_entry("origin", serde_json::json!(location.origin))
                .with_context_entry("type", serde_json::json!(a.spec.assert_type)),
        );
    }
}

/// Shape checks for a single assertion spec.
pub fn check_assertion(spec: &AssertionSpec, paths: &PathResolver) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let Some(kind) = spec.kind() else {
        let mut d = Diagnostic::new(
            codes::E_ASSERT_TYPE,
            format!("unrecognized assertion type `{}`", spec.assert_type),
        );
        if let Some(m) = closest_match(&spec.assert_type, AssertionKind::names()) {
            d = d.with_fix_step(format!("Did you mean `{}`?", m.candidate));
        }
        d = d.with_fix_step(format!(
            "Recognized types: {}",
            AssertionKind::names().collect::<Vec<_>>().join(", ")
        ));
        out.push(d);
        return out;
    };

    let value_error = |msg: String| Diagnostic::new(codes::E_ASSERT_VALUE, msg);

    match kind {
        AssertionKind::Contains
        | AssertionKind::NotContains
        | AssertionKind::ModelGradedClosedQa
        | AssertionKind::LlmRubric => {
            if non_empty_scalar(spec.value.as_ref()).is_none() {
                out.push(value_error(format!("`{}` needs a non-empty string value", kind)));
            }
        }
        AssertionKind::ContainsAny => {
            let ok = match spec.value.as_ref() {
                Some(serde_yaml::Value::Sequence(items)) => {
                    !items.is_empty() && items.iter().all(|v| non_empty_scalar(Some(v)).is_some())
                }
                Some(v) => non_empty_scalar(Some(v))
                    .is_some_and(|s| s.split(',').all(|part| !part.trim().is_empty())),
                None => false,
            };
            if !ok {
                out.push(value_error(format!(
                    "`{}` needs a non-empty list of strings (or a comma-separated string)",
                    kind
                )));
            }
        }
        AssertionKind::Javascript => match non_empty_scalar(spec.value.as_ref()) {
            None => out.push(value_error(format!("`{}` needs a non-empty expression", kind))),
            Some(script) => {
                if let Reference::File(rel) = Reference::parse(&script) {
                    if let Err(e) = paths.expand(rel) {
                        out.push(
                            Diagnostic::new(codes::E_PATH_NOT_FOUND, e.to_string())
                                .with_fix_step(format!("Create the script file {}", rel)),
                        );
                    }
                }
            }
        },
        AssertionKind::Cost => match spec.threshold {
            None => out.push(
                Diagnostic::new(
                    codes::E_ASSERT_THRESHOLD,
                    "`cost` needs a threshold (maximum cost per call)",
                )
                .with_fix_step("Add e.g. `threshold: 0.002`"),
            ),
            Some(t) if t.is_finite() && t <= 0.0 => {
                out.push(Diagnostic::new(
                    codes::E_ASSERT_THRESHOLD,
                    format!("`cost` threshold must be greater than 0, got {}", t),
                ));
                return out;
            }
            Some(_) => {}
        },
    }

    if let Some(t) = spec.threshold {
        if !t.is_finite() || t < 0.0 {
            out.push(Diagnostic::new(
                codes::E_ASSERT_THRESHOLD,
                format!("threshold must be a finite number >= 0, got {}", t),
            ));
        } else if kind.is_scored() && t > 1.0 {
            out.push(Diagnostic::new(
                codes::W_ASSERT_THRESHOLD_RANGE,
                format!("`{}` scores fall in [0, 1]; threshold {} can never pass", kind, t),
            ));
        }
    }
    out
}

fn non_empty_scalar(value: Option<&serde_yaml::Value>) -> Option<String> {
    value
        .and_then(scalar_to_string)
        .filter(|s| !s.trim().is_empty())
}
