//! Which environment variables the external engine will want for the
//! providers a scaffold names. Credentials are never read or stored here,
//! only checked for presence.

use crate::compose::{effective_assertions, grading_provider};
use crate::errors::diagnostic::{codes, Diagnostic};
use crate::resolve::ResolvedConfig;
use serde::Serialize;

/// Provider prefix (text before the first `:`) to the credential variable it reads.
/// `None` for providers that run without credentials.
const CREDENTIALS: &[(&str, Option<&str>)] = &[
    ("openai", Some("OPENAI_API_KEY")),
    ("anthropic", Some("ANTHROPIC_API_KEY")),
    ("azureopenai", Some("AZURE_OPENAI_API_KEY")),
    ("azure", Some("AZURE_OPENAI_API_KEY")),
    ("google", Some("GOOGLE_API_KEY")),
    ("vertex", Some("GOOGLE_API_KEY")),
    ("mistral", Some("MISTRAL_API_KEY")),
    ("groq", Some("GROQ_API_KEY")),
    ("bedrock", Some("AWS_ACCESS_KEY_ID")),
    ("ollama", None),
    ("echo", None),
    ("file", None),
    ("exec", None),
];

pub fn provider_prefix(provider_id: &str) -> String {
    provider_id
        .split(':')
        .next()
        .unwrap_or(provider_id)
        .trim()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    EnvVar(&'static str),
    NotNeeded,
    UnknownProvider,
}

pub fn credential_for(provider_id: &str) -> Credential {
    let prefix = provider_prefix(provider_id);
    match CREDENTIALS.iter().find(|(p, _)| *p == prefix) {
        Some((_, Some(var))) => Credential::EnvVar(var),
        Some((_, None)) => Credential::NotNeeded,
        None => Credential::UnknownProvider,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRequirement {
    pub env_var: String,
    /// Provider ids that need this variable, first use first.
    pub providers: Vec<String>,
    /// Use cases that need it, by description.
    pub use_cases: Vec<String>,
}

fn push_unique(v: &mut Vec<String>, s: &str) {
    if !v.iter().any(|x| x == s) {
        v.push(s.to_string());
    }
}

/// Credentials needed by target providers and by the graders of model-graded assertions.
pub fn required_credentials(resolved: &ResolvedConfig) -> Vec<CredentialRequirement> {
    let mut reqs: Vec<CredentialRequirement> = Vec::new();
    let mut note = |provider: &str, use_case: &str| {
        let Credential::EnvVar(var) = credential_for(provider) else {
            return;
        };
        match reqs.iter_mut().find(|r| r.env_var == var) {
            Some(r) => {
                push_unique(&mut r.providers, provider);
                push_unique(&mut r.use_cases, use_case);
            }
            None => reqs.push(CredentialRequirement {
                env_var: var.to_string(),
                providers: vec![provider.to_string()],
                use_cases: vec![use_case.to_string()],
            }),
        }
    };

    for uc in &resolved.use_cases {
        for p in &uc.providers {
            note(&p.id, &uc.description);
        }
        for tc in &uc.tests {
            for a in effective_assertions(uc, tc) {
                if let Some(grader) = grading_provider(uc, &a.assertion.spec) {
                    note(&grader, &uc.description);
                }
            }
        }
    }
    reqs
}

/// Provider ids whose prefix is not in the credential table.
pub fn unknown_providers(resolved: &ResolvedConfig) -> Vec<String> {
    let mut out = Vec::new();
    for uc in &resolved.use_cases {
        for p in &uc.providers {
            if credential_for(&p.id) == Credential::UnknownProvider {
                push_unique(&mut out, &p.id);
            }
        }
    }
    out
}

/// `W_ENV_MISSING` for each required variable `lookup` reports unset or empty.
pub fn check_env<F>(resolved: &ResolvedConfig, lookup: F) -> Vec<Diagnostic>
where
    F: Fn(&str) -> Option<String>,
{
    required_credentials(resolved)
        .into_iter()
        .filter(|req| lookup(&req.env_var).map_or(true, |v| v.trim().is_empty()))
        .map(|req| {
            Diagnostic::new(
                codes::W_ENV_MISSING,
                format!(
                    "{} is not set (needed by {})",
                    req.env_var,
                    req.providers.join(", ")
                ),
            )
            .with_source("doctor.env")
            .with_context(serde_json::json!({
                "env_var": req.env_var,
                "providers": req.providers,
                "use_cases": req.use_cases,
            }))
            .with_fix_step(format!("export {}=<your key>", req.env_var))
        })
        .collect()
}
