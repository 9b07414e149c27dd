use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

#[allow(deprecated)]
fn evalkit() -> Command {
    Command::cargo_bin("evalkit").unwrap()
}

fn scaffold() -> TempDir {
    let temp = tempdir().unwrap();
    evalkit().arg("init").arg("--dir").arg(temp.path()).assert().success();
    temp
}

fn validate_json(config: &Path) -> (i32, serde_json::Value) {
    let out = evalkit()
        .arg("validate")
        .arg("--config")
        .arg(config)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let doc = serde_json::from_slice(&out.stdout).unwrap();
    (out.status.code().unwrap(), doc)
}

fn codes(doc: &serde_json::Value) -> Vec<String> {
    doc["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["code"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn broken_reference_is_an_authoring_failure() {
    let temp = scaffold();
    fs::remove_file(temp.path().join("evals/cost.yaml")).unwrap();

    let (code, doc) = validate_json(&temp.path().join("promptfooconfig.yaml"));
    assert_eq!(code, 1);
    assert_eq!(doc["ok"], false);
    assert_eq!(doc["exit_code"], 1);
    assert_eq!(doc["command"]["name"], "validate");
    // Both use cases reference the missing set.
    assert_eq!(codes(&doc), ["E_PATH_NOT_FOUND", "E_PATH_NOT_FOUND"]);
    assert!(doc["diagnostics"][0]["message"]
        .as_str()
        .unwrap()
        .contains("evals/cost.yaml"));
}

#[test]
fn missing_placeholder_value_is_reported_with_suggestion() {
    let temp = scaffold();
    let tests = temp.path().join("test-inputs/translation.yaml");
    let text = fs::read_to_string(&tests)
        .unwrap()
        .replacen("outputLanguage: Klingon", "outputLanguge: Klingon", 1);
    fs::write(&tests, text).unwrap();

    let (code, doc) = validate_json(&temp.path().join("promptfooconfig.yaml"));
    assert_eq!(code, 1);
    let all = codes(&doc);
    assert!(all.contains(&"E_VAR_MISSING".to_string()), "{:?}", all);
    assert!(all.contains(&"W_VAR_UNUSED".to_string()), "{:?}", all);

    let missing = doc["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["code"] == "E_VAR_MISSING")
        .unwrap();
    assert_eq!(missing["context"]["variable"], "outputLanguage");
    assert!(missing["fix_steps"][0]
        .as_str()
        .unwrap()
        .contains("outputLanguge"));
}

#[test]
fn unknown_assertion_type_fails() {
    let temp = scaffold();
    let quality = temp.path().join("evals/quality.yaml");
    let text = fs::read_to_string(&quality)
        .unwrap()
        .replace("type: llm-rubric", "type: llm-rubrik");
    fs::write(&quality, text).unwrap();

    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(temp.path().join("promptfooconfig.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[E_ASSERT_TYPE]"))
        .stderr(predicate::str::contains("Did you mean `llm-rubric`?"));
}

#[test]
fn unloadable_config_exits_with_config_error() {
    let temp = tempdir().unwrap();

    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(temp.path().join("promptfooconfig.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[E_PATH_NOT_FOUND]"));

    fs::write(temp.path().join("promptfooconfig.yaml"), "- prompts: [unclosed\n").unwrap();
    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(temp.path().join("promptfooconfig.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[E_CFG_PARSE]"));
}

#[test]
fn config_path_comes_from_env() {
    let temp = scaffold();
    evalkit()
        .env("EVALKIT_CONFIG", temp.path().join("promptfooconfig.yaml"))
        .arg("validate")
        .assert()
        .code(0);
}

#[test]
fn warnings_fail_only_with_deny_warnings() {
    let temp = scaffold();
    let tests = temp.path().join("test-inputs/translation.yaml");
    let text = fs::read_to_string(&tests)
        .unwrap()
        .replacen("inputText: Hello", "inputText: Hello\n    tone: formal", 1);
    fs::write(&tests, text).unwrap();
    let config = temp.path().join("promptfooconfig.yaml");

    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(&config)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("[W_VAR_UNUSED]"));

    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(&config)
        .arg("--deny-warnings")
        .assert()
        .code(1);
}

#[test]
fn sarif_report_is_written_to_output() {
    let temp = scaffold();
    fs::remove_file(temp.path().join("prompts/summarize.txt")).unwrap();
    let out = temp.path().join("validate.sarif");

    evalkit()
        .arg("validate")
        .arg("-c")
        .arg(temp.path().join("promptfooconfig.yaml"))
        .arg("--format")
        .arg("sarif")
        .arg("--output")
        .arg(&out)
        .assert()
        .code(1);

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["version"], "2.1.0");
    let results = doc["runs"][0]["results"].as_array().unwrap();
    assert!(results.iter().any(|r| r["ruleId"] == "E_PATH_NOT_FOUND"));
    assert_eq!(doc["runs"][0]["invocations"][0]["exitCode"], 1);
}
