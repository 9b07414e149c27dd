use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub code: String,
    pub severity: String,
    pub source: String,
    pub message: String,
    pub context: serde_json::Value,
    pub fix_steps: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        // W_* codes are warnings unless the caller says otherwise.
        let severity = if code.starts_with("W_") { "warn" } else { "error" };
        Self {
            code,
            severity: severity.into(),
            source: "unknown".into(),
            message: message.into(),
            context: serde_json::json!({}),
            fix_steps: vec![],
        }
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Adds one key to the context object, turning a non-object context into one.
    pub fn with_context_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        if !self.context.is_object() {
            self.context = serde_json::json!({});
        }
        if let serde_json::Value::Object(ref mut map) = self.context {
            map.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_fix_step(mut self, step: impl Into<String>) -> Self {
        self.fix_steps.push(step.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    pub fn is_warning(&self) -> bool {
        self.severity == "warn"
    }

    /// The file a diagnostic points at, when its context names one.
    pub fn file(&self) -> Option<&str> {
        self.context.get("file").and_then(|v| v.as_str())
    }

    pub fn format_terminal(&self) -> String {
        let icon = if self.is_warning() { "⚠️ " } else { "❌" };
        let mut s = format!("{} [{}] {}\n", icon, self.code, self.message);
        s.push_str(&format!("  source: {}\n", self.source));

        if self.context.as_object().is_some_and(|o| !o.is_empty()) {
            if let Ok(json) = serde_json::to_string_pretty(&self.context) {
                for line in json.lines() {
                    s.push_str(&format!("  {}\n", line));
                }
            }
        }

        if !self.fix_steps.is_empty() {
            s.push_str("\nFix:\n");
            for (i, step) in self.fix_steps.iter().enumerate() {
                s.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }
        s
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_terminal())
    }
}

impl std::error::Error for Diagnostic {}

pub fn severity_rank(s: &str) -> u8 {
    match s {
        "error" => 0,
        "warn" => 1,
        "note" => 2,
        _ => 3,
    }
}

/// Deterministic order: severity, code, message, file.
pub fn sort_diagnostics(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| {
        (
            severity_rank(&a.severity),
            a.code.as_str(),
            a.message.as_str(),
            a.file().unwrap_or(""),
        )
            .cmp(&(
                severity_rank(&b.severity),
                b.code.as_str(),
                b.message.as_str(),
                b.file().unwrap_or(""),
            ))
    });
}

pub mod codes {
    // Errors (validate exits 1; only an unloadable root config exits 2)
    pub const E_CFG_PARSE: &str = "E_CFG_PARSE";
    pub const E_PATH_NOT_FOUND: &str = "E_PATH_NOT_FOUND";
    pub const E_REF_CYCLE: &str = "E_REF_CYCLE";
    pub const E_REF_SCHEME: &str = "E_REF_SCHEME";
    pub const E_TEMPLATE_SYNTAX: &str = "E_TEMPLATE_SYNTAX";
    pub const E_VAR_MISSING: &str = "E_VAR_MISSING";
    pub const E_ASSERT_TYPE: &str = "E_ASSERT_TYPE";
    pub const E_ASSERT_VALUE: &str = "E_ASSERT_VALUE";
    pub const E_ASSERT_THRESHOLD: &str = "E_ASSERT_THRESHOLD";

    // Warnings (exit 0)
    pub const W_VAR_UNUSED: &str = "W_VAR_UNUSED";
    pub const W_REF_OUTSIDE_ROOT: &str = "W_REF_OUTSIDE_ROOT";
    pub const W_CFG_UNKNOWN_FIELD: &str = "W_CFG_UNKNOWN_FIELD";
    pub const W_USECASE_EMPTY: &str = "W_USECASE_EMPTY";
    pub const W_ASSERT_THRESHOLD_RANGE: &str = "W_ASSERT_THRESHOLD_RANGE";
    pub const W_ENV_MISSING: &str = "W_ENV_MISSING";
}
