use super::*;
use crate::errors::diagnostic::codes;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("promptfooconfig.yaml")
}

/// Two use cases sharing one assertion set, one prompt file and test files.
fn shared_scaffold() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        r#"
- description: Translation
  prompts: file://prompts/translation.txt
  providers: [openai:gpt-4o-mini]
  tests: file://test-inputs/translation.yaml
  defaultTest:
    assert:
      - file://evals/quality.yaml
- description: Summarization
  prompts:
    - file://prompts/summarize.txt
  providers:
    - id: anthropic:messages:claude-3-haiku-20240307
      label: haiku
  tests:
    - file://test-inputs/summarize.yaml
  defaultTest:
    vars:
      audience: engineers
    assert:
      - file://evals/quality.yaml
    options:
      provider: openai:gpt-4o-mini
"#,
    );
    write(
        &dir,
        "prompts/translation.txt",
        "Translate from {{inputLanguage}} to {{outputLanguage}}:\n{{inputText}}\n",
    );
    write(
        &dir,
        "prompts/summarize.txt",
        "Summarize for {{audience}}:\n{{document}}\n",
    );
    write(
        &dir,
        "test-inputs/translation.yaml",
        r#"
- description: greeting
  vars:
    inputLanguage: English
    outputLanguage: Klingon
    inputText: Hello
"#,
    );
    write(
        &dir,
        "test-inputs/summarize.yaml",
        r#"
- vars:
    document: file://test-inputs/docs/notes.txt
  assert:
    - type: contains
      value: release
"#,
    );
    write(&dir, "test-inputs/docs/notes.txt", "The release ships on Monday.\n");
    write(
        &dir,
        "evals/quality.yaml",
        r#"
- type: not-contains
  value: "As an AI"
- type: llm-rubric
  value: Output is fluent
  threshold: 0.7
"#,
    );
    dir
}

#[test]
fn scaffold_resolves_cleanly() {
    let dir = shared_scaffold();
    let resolved = resolve(&config_path(&dir)).unwrap();

    assert!(resolved.is_clean(), "unexpected issues: {:?}", resolved.errors);
    assert!(resolved.warnings.is_empty(), "{:?}", resolved.warnings);
    assert_eq!(resolved.use_cases.len(), 2);

    let translation = &resolved.use_cases[0];
    assert_eq!(translation.description, "Translation");
    assert_eq!(translation.prompts.len(), 1);
    assert_eq!(translation.prompts[0].label, "prompts/translation.txt");
    assert_eq!(
        translation.prompts[0].template.variables(),
        ["inputLanguage", "outputLanguage", "inputText"]
    );
    assert_eq!(translation.tests.len(), 1);
    assert_eq!(translation.tests[0].origin, "test-inputs/translation.yaml#1");

    let summarize = &resolved.use_cases[1];
    assert_eq!(summarize.providers[0].display_name(), "haiku");
    assert_eq!(summarize.grading_provider.as_deref(), Some("openai:gpt-4o-mini"));
    assert_eq!(summarize.default_vars["audience"], "engineers");
    assert_eq!(summarize.tests[0].description, "test #1");
}

#[test]
fn shared_assertion_set_is_identical_for_every_referrer() {
    let dir = shared_scaffold();
    let resolved = resolve(&config_path(&dir)).unwrap();

    let a = &resolved.use_cases[0].default_assertions;
    let b = &resolved.use_cases[1].default_assertions;
    assert_eq!(a.len(), 2);
    assert_eq!(a, b);
    assert_eq!(a[0].origin, "evals/quality.yaml#1");
    assert_eq!(a[1].spec.threshold, Some(0.7));

    // Loaded from disk once, listed once.
    let quality: Vec<_> = resolved
        .artifacts
        .iter()
        .filter(|x| x.path == "evals/quality.yaml")
        .collect();
    assert_eq!(quality.len(), 1);
}

#[test]
fn loading_an_assertion_set_twice_returns_the_same_records() {
    let dir = shared_scaffold();
    let mut resolver = Resolver::new(PathResolver::from_root(dir.path()));

    let first = resolver.load_assertion_set("evals/quality.yaml").unwrap();
    let second = resolver.load_assertion_set("evals/quality.yaml").unwrap();
    assert_eq!(first, second);
    assert!(resolver.issues().is_empty());
}

#[test]
fn file_var_values_are_loaded_as_text() {
    let dir = shared_scaffold();
    let resolved = resolve(&config_path(&dir)).unwrap();
    let tc = &resolved.use_cases[1].tests[0];
    assert_eq!(tc.vars["document"], "The release ships on Monday.\n");
}

#[test]
fn missing_file_is_collected_not_fatal() {
    let dir = shared_scaffold();
    fs::remove_file(dir.path().join("evals/quality.yaml")).unwrap();

    let resolved = resolve(&config_path(&dir)).unwrap();
    assert!(!resolved.is_clean());
    // Both use cases reference the missing set.
    assert_eq!(resolved.errors.len(), 2);
    let diag = resolved.errors[0].error.to_diagnostic(&resolved.errors[0].site);
    assert_eq!(diag.code, codes::E_PATH_NOT_FOUND);
    assert!(diag.message.contains("evals/quality.yaml"));
    assert!(resolved.errors[0].site.contains("defaultTest.assert[0]"));

    // The rest of the configuration still resolved.
    assert_eq!(resolved.use_cases[0].prompts.len(), 1);
    assert_eq!(resolved.use_cases[0].tests.len(), 1);
}

#[test]
fn nested_assertion_sets_are_spliced_in_place() {
    let dir = shared_scaffold();
    write(
        &dir,
        "evals/all.yaml",
        "- type: contains\n  value: a\n- file://evals/quality.yaml\n- type: cost\n  threshold: 0.01\n",
    );
    let mut resolver = Resolver::new(PathResolver::from_root(dir.path()));
    let set = resolver.load_assertion_set("evals/all.yaml").unwrap();
    let types: Vec<&str> = set.iter().map(|a| a.spec.assert_type.as_str()).collect();
    assert_eq!(types, ["contains", "not-contains", "llm-rubric", "cost"]);
    assert_eq!(set[1].origin, "evals/quality.yaml#1");
    assert_eq!(set[3].origin, "evals/all.yaml#3");
}

#[test]
fn reference_cycle_is_reported_with_its_chain() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - vars: {x: hi}\ndefaultTest:\n  assert:\n    - file://evals/a.yaml\n",
    );
    write(&dir, "evals/a.yaml", "- file://evals/b.yaml\n");
    write(&dir, "evals/b.yaml", "- file://evals/a.yaml\n- type: contains\n  value: hi\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    let cycle = resolved
        .errors
        .iter()
        .find(|i| matches!(i.error, LoadError::Cycle { .. }))
        .expect("cycle reported");
    let LoadError::Cycle { chain } = &cycle.error else {
        unreachable!()
    };
    assert_eq!(chain, &["evals/a.yaml", "evals/b.yaml", "evals/a.yaml"]);
    assert_eq!(cycle.error.code(), codes::E_REF_CYCLE);

    // Resolution terminated and kept the non-cyclic entry.
    let uc = &resolved.use_cases[0];
    assert_eq!(uc.default_assertions.len(), 1);
    assert_eq!(uc.default_assertions[0].spec.assert_type, "contains");
}

#[test]
fn set_truncated_by_a_cycle_is_reported_to_every_referrer() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        r#"
- description: first
  prompts: 'Say {{x}}'
  tests: [{vars: {x: hi}}]
  defaultTest: {assert: ['file://evals/a.yaml']}
- description: second
  prompts: 'Say {{x}}'
  tests: [{vars: {x: hi}}]
  defaultTest: {assert: ['file://evals/b.yaml']}
"#,
    );
    write(&dir, "evals/a.yaml", "- file://evals/b.yaml\n");
    write(&dir, "evals/b.yaml", "- file://evals/a.yaml\n- type: contains\n  value: hi\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    let cycles: Vec<&LoadIssue> = resolved
        .errors
        .iter()
        .filter(|i| i.error.code() == codes::E_REF_CYCLE)
        .collect();
    assert_eq!(cycles.len(), 2, "{:#?}", resolved.errors);
    assert_eq!(cycles[0].site, "evals/b.yaml#1");
    assert_eq!(cycles[1].site, "use case 2 (second): defaultTest.assert[0]");

    let second = &resolved.use_cases[1];
    assert_eq!(second.default_assertions.len(), 1);
    assert_eq!(second.default_assertions[0].spec.assert_type, "contains");
}

#[test]
fn unsupported_scheme_is_an_issue() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests: https://example.com/tests.yaml\n",
    );
    let resolved = resolve(&config_path(&dir)).unwrap();
    assert_eq!(resolved.errors.len(), 1);
    assert_eq!(resolved.errors[0].error.code(), codes::E_REF_SCHEME);
    assert!(resolved.errors[0].error.to_string().contains("https://"));
}

#[test]
fn glob_references_expand_in_sorted_order() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - file://cases/*.yaml\n",
    );
    write(&dir, "cases/b.yaml", "- description: second\n  vars: {x: b}\n");
    write(&dir, "cases/a.yaml", "- description: first\n  vars: {x: a}\n");
    write(&dir, "cases/notes.txt", "not yaml tests\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    assert!(resolved.is_clean(), "{:?}", resolved.errors);
    let names: Vec<&str> = resolved.use_cases[0]
        .tests
        .iter()
        .map(|t| t.description.as_str())
        .collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn glob_without_matches_is_reported() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - file://cases/*.yaml\n",
    );
    fs::create_dir_all(dir.path().join("cases")).unwrap();

    let resolved = resolve(&config_path(&dir)).unwrap();
    assert_eq!(resolved.errors.len(), 1);
    assert!(matches!(resolved.errors[0].error, LoadError::EmptyGlob { .. }));
}

#[test]
fn multi_prompt_files_yield_one_prompt_per_section() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: file://prompts/variants.txt\ntests:\n  - vars: {x: hi}\n",
    );
    write(&dir, "prompts/variants.txt", "Short: {{x}}\n---\nLong form: {{x | upper}}\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    let labels: Vec<&str> = resolved.use_cases[0]
        .prompts
        .iter()
        .map(|p| p.label.as_str())
        .collect();
    assert_eq!(labels, ["prompts/variants.txt#1", "prompts/variants.txt#2"]);
}

#[test]
fn malformed_template_is_reported() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: file://p.txt\ntests:\n  - vars: {x: hi}\n",
    );
    write(&dir, "p.txt", "Broken {{x\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    assert_eq!(resolved.errors.len(), 1);
    assert_eq!(resolved.errors[0].error.code(), codes::E_TEMPLATE_SYNTAX);
    assert!(resolved.use_cases[0].prompts.is_empty());
}

#[test]
fn references_outside_the_root_warn() {
    let outer = TempDir::new().unwrap();
    write(&outer, "shared/evals.yaml", "- type: contains\n  value: ok\n");
    write(
        &outer,
        "repo/promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - vars: {x: hi}\ndefaultTest:\n  assert:\n    - file://../shared/evals.yaml\n",
    );

    let resolved = resolve(&outer.path().join("repo/promptfooconfig.yaml")).unwrap();
    assert!(resolved.is_clean(), "{:?}", resolved.errors);
    assert_eq!(resolved.use_cases[0].default_assertions.len(), 1);
    assert!(resolved
        .warnings
        .iter()
        .any(|w| matches!(w, ResolveWarning::OutsideRoot { reference, .. } if reference == "file://../shared/evals.yaml")));
}

#[test]
fn unknown_fields_in_referenced_files_warn() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - file://t.yaml\n",
    );
    write(&dir, "t.yaml", "- vars: {x: hi}\n  asert:\n    - type: contains\n      value: hi\n");

    let resolved = resolve(&config_path(&dir)).unwrap();
    let fields: Vec<&str> = resolved
        .warnings
        .iter()
        .filter_map(|w| match w {
            ResolveWarning::UnknownField(f) => Some(f.field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fields, ["[0].asert"]);
}

#[test]
fn non_scalar_var_is_a_shape_issue() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "promptfooconfig.yaml",
        "prompts: 'Say {{x}}'\ntests:\n  - vars:\n      x: [1, 2]\n",
    );
    let resolved = resolve(&config_path(&dir)).unwrap();
    assert_eq!(resolved.errors.len(), 1);
    assert_eq!(resolved.errors[0].error.code(), codes::E_CFG_PARSE);
    assert!(resolved.use_cases[0].tests[0].vars.is_empty());
}

#[test]
fn use_case_selector_accepts_number_or_description() {
    let dir = shared_scaffold();
    let resolved = resolve(&config_path(&dir)).unwrap();
    assert_eq!(resolved.use_case("2").unwrap().description, "Summarization");
    assert_eq!(resolved.use_case("translation").unwrap().index, 0);
    assert!(resolved.use_case("0").is_none());
    assert!(resolved.use_case("missing").is_none());
}

#[test]
fn resolve_strict_fails_on_first_issue() {
    let dir = shared_scaffold();
    fs::remove_file(dir.path().join("prompts/translation.txt")).unwrap();

    let err = resolve_strict(&config_path(&dir)).unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("use case 1 (Translation)"), "{}", msg);
    assert!(msg.contains("prompts/translation.txt"), "{}", msg);
    assert!(err.downcast_ref::<LoadError>().is_some());
}

#[test]
fn missing_root_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = resolve(&config_path(&dir)).unwrap_err();
    assert!(err.is_not_found());
}
