//! Composition of `defaultTest` with each test case, and the evaluation plan
//! (prompts × test cases per use case) the external engine would run.

use crate::fingerprint;
use crate::model::{AssertionSpec, DEFAULT_GRADING_PROVIDER};
use crate::resolve::{ResolvedAssertion, ResolvedConfig, ResolvedTestCase, ResolvedUseCase};
use crate::template::{MissingVariable, TemplateError};
use serde::Serialize;
use std::collections::BTreeMap;

/// `defaultTest.vars` overlaid by the test's own vars; the test wins on conflict.
pub fn effective_vars(uc: &ResolvedUseCase, tc: &ResolvedTestCase) -> BTreeMap<String, String> {
    let mut vars = uc.default_vars.clone();
    vars.extend(tc.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}

/// `defaultTest.assert` entries followed by the test's own `assert` entries.
/// Test-level entries append; nothing is replaced.
pub fn effective_assertions(uc: &ResolvedUseCase, tc: &ResolvedTestCase) -> Vec<PlannedAssertion> {
    let defaults = uc
        .default_assertions
        .iter()
        .map(|a| PlannedAssertion::new(uc, a, AssertionScope::Default));
    let own = tc
        .assertions
        .iter()
        .map(|a| PlannedAssertion::new(uc, a, AssertionScope::Test));
    defaults.chain(own).collect()
}

/// Provider that grades a model-graded assertion: its own override, else the
/// use case's `defaultTest.options.provider`, else the engine default.
pub fn grading_provider(uc: &ResolvedUseCase, spec: &AssertionSpec) -> Option<String> {
    if !spec.kind().is_some_and(|k| k.is_model_graded()) {
        return None;
    }
    Some(
        spec.provider
            .clone()
            .or_else(|| uc.grading_provider.clone())
            .unwrap_or_else(|| DEFAULT_GRADING_PROVIDER.to_string()),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionScope {
    Default,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAssertion {
    #[serde(flatten)]
    pub assertion: ResolvedAssertion,
    pub scope: AssertionScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading_provider: Option<String>,
}

impl PlannedAssertion {
    fn new(uc: &ResolvedUseCase, a: &ResolvedAssertion, scope: AssertionScope) -> Self {
        Self {
            grading_provider: grading_provider(uc, &a.spec),
            assertion: a.clone(),
            scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedCase {
    pub use_case_index: usize,
    pub use_case: String,
    pub prompt: String,
    pub test: String,
    pub test_origin: String,
    pub vars: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_variables: Vec<MissingVariable>,
    pub assertions: Vec<PlannedAssertion>,
    pub providers: Vec<String>,
    /// `None` when vars or assertions have no JSON form; see `fingerprint_error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_error: Option<String>,
}

impl PlannedCase {
    pub fn rendered_ok(&self) -> bool {
        self.rendered.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub cases: Vec<PlannedCase>,
}

impl Plan {
    pub fn render_failures(&self) -> usize {
        self.cases.iter().filter(|c| !c.rendered_ok()).count()
    }

    pub fn assertion_count(&self) -> usize {
        self.cases.iter().map(|c| c.assertions.len()).sum()
    }
}

/// Every (use case, prompt, test case) combination, in declaration order.
pub fn plan(resolved: &ResolvedConfig) -> Plan {
    Plan {
        cases: resolved.use_cases.iter().flat_map(plan_use_case).collect(),
    }
}

pub fn plan_use_case(uc: &ResolvedUseCase) -> Vec<PlannedCase> {
    let providers: Vec<String> = uc.providers.iter().map(|p| p.id.clone()).collect();
    let mut cases = Vec::with_capacity(uc.prompts.len() * uc.tests.len());
    for prompt in &uc.prompts {
        for tc in &uc.tests {
            let vars = effective_vars(uc, tc);
            let assertions = effective_assertions(uc, tc);
            let (rendered, render_error, missing_variables) = match prompt.template.render(&vars) {
                Ok(text) => (Some(text), None, Vec::new()),
                Err(e) => {
                    let missing = match &e {
                        TemplateError::MissingVariables { missing } => missing.clone(),
                        _ => Vec::new(),
                    };
                    (None, Some(e.to_string()), missing)
                }
            };

            let (fingerprint, fingerprint_error) = match fingerprint::compute(
                &uc.description,
                &prompt.label,
                prompt.template.content(),
                &vars,
                &assertions,
            ) {
                Ok(hex) => (Some(hex), None),
                Err(e) => {
                    tracing::warn!(prompt = %prompt.label, test = %tc.origin, error = %e, "cannot fingerprint case");
                    (None, Some(e.to_string()))
                }
            };

            cases.push(PlannedCase {
                use_case_index: uc.index,
                use_case: uc.description.clone(),
                prompt: prompt.label.clone(),
                test: tc.description.clone(),
                test_origin: tc.origin.clone(),
                vars,
                rendered,
                render_error,
                missing_variables,
                assertions,
                providers: providers.clone(),
                fingerprint,
                fingerprint_error,
            });
        }
    }
    cases
}
