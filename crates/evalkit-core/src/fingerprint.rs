use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Deterministic identity of one planned evaluation: the same prompt text,
/// vars and assertion list always hash the same, so two plans can be diffed
/// case by case.
///
/// Fails when vars or assertions have no JSON form (e.g. a YAML mapping key
/// that is itself a list).
pub fn compute<V: Serialize, A: Serialize>(
    use_case: &str,
    prompt_label: &str,
    prompt_text: &str,
    vars: &V,
    assertions: &A,
) -> Result<String, serde_json::Error> {
    let parts = [
        format!("use_case={use_case}"),
        format!("prompt_label={prompt_label}"),
        format!("prompt={prompt_text}"),
        format!("vars={}", serde_json::to_string(vars)?),
        format!("assertions={}", serde_json::to_string(assertions)?),
    ];
    Ok(sha256_hex(&parts.join("\n")))
}
