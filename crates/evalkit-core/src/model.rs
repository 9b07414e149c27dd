use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CONFIG_FILE: &str = "promptfooconfig.yaml";
pub const FILE_SCHEME: &str = "file://";

/// Grading provider the external engine falls back to for model-graded checks.
pub const DEFAULT_GRADING_PROVIDER: &str = "openai";

/// Assertion types the external engine is known to honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssertionKind {
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not-contains")]
    NotContains,
    #[serde(rename = "contains-any")]
    ContainsAny,
    #[serde(rename = "javascript")]
    Javascript,
    #[serde(rename = "model-graded-closedqa")]
    ModelGradedClosedQa,
    #[serde(rename = "llm-rubric")]
    LlmRubric,
    #[serde(rename = "cost")]
    Cost,
}

impl AssertionKind {
    pub const ALL: [AssertionKind; 7] = [
        Self::Contains,
        Self::NotContains,
        Self::ContainsAny,
        Self::Javascript,
        Self::ModelGradedClosedQa,
        Self::LlmRubric,
        Self::Cost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "not-contains",
            Self::ContainsAny => "contains-any",
            Self::Javascript => "javascript",
            Self::ModelGradedClosedQa => "model-graded-closedqa",
            Self::LlmRubric => "llm-rubric",
            Self::Cost => "cost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(|k| k.as_str())
    }

    /// Graded by a judging provider rather than checked mechanically.
    pub fn is_model_graded(&self) -> bool {
        matches!(self, Self::ModelGradedClosedQa | Self::LlmRubric)
    }

    /// Produces a 0..=1 score, so a threshold above 1 can never pass.
    pub fn is_scored(&self) -> bool {
        matches!(
            self,
            Self::ModelGradedClosedQa | Self::LlmRubric | Self::Javascript
        )
    }
}

impl std::fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check. The `type` tag is kept verbatim so an unknown tag
/// survives loading and can be reported with a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionSpec {
    #[serde(rename = "type")]
    pub assert_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Grading provider override for model-graded types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl AssertionSpec {
    pub fn new(kind: AssertionKind) -> Self {
        Self {
            assert_type: kind.as_str().to_string(),
            value: None,
            threshold: None,
            description: None,
            provider: None,
        }
    }

    pub fn kind(&self) -> Option<AssertionKind> {
        AssertionKind::parse(&self.assert_type)
    }

    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.assert_type)
    }
}

/// Either a `file://` reference or an inline record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry<T> {
    Reference(String),
    Inline(T),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Entry<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(s) => Ok(Entry::Reference(s)),
            other => T::deserialize(other).map(Entry::Inline).map_err(D::Error::custom),
        }
    }
}

pub type AssertEntry = Entry<AssertionSpec>;
pub type TestEntry = Entry<RawTestCase>;

/// A test case as written, before references and `file://` var values are loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assert: Vec<AssertEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOptions {
    /// Default grading provider for model-graded assertions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultTest {
    #[serde(default)]
    pub vars: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub assert: Vec<AssertEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<TestOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_yaml::Value>,
}

impl ProviderRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            config: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProvider {
    Id(String),
    Detailed {
        id: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        config: Option<serde_yaml::Value>,
    },
}

impl<'de> Deserialize<'de> for ProviderRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawProvider::deserialize(deserializer)? {
            RawProvider::Id(id) => ProviderRef::new(id),
            RawProvider::Detailed { id, label, config } => ProviderRef { id, label, config },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub prompts: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub providers: Vec<ProviderRef>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tests: Vec<TestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_test: Option<DefaultTest>,
}

impl UseCaseConfig {
    /// Human label: the description, or `use case N` (1-based).
    pub fn label(&self, index: usize) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => d.clone(),
            _ => format!("use case {}", index + 1),
        }
    }
}

/// Ordered list of use cases. The YAML document is either a single use-case
/// mapping or a sequence of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RootConfig {
    pub use_cases: Vec<UseCaseConfig>,
}

/// Accepts a single item where a list is expected: `tests: file://x.yaml`
/// reads the same as `tests: [file://x.yaml]`.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(Vec::new()),
        items @ serde_yaml::Value::Sequence(_) => {
            Vec::<T>::deserialize(items).map_err(D::Error::custom)
        }
        one => T::deserialize(one).map(|item| vec![item]).map_err(D::Error::custom),
    }
}

/// Stringifies a YAML scalar var value. Sequences, mappings and nulls have no
/// plain-string form.
pub fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(t) => scalar_to_string(&t.value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_kinds_round_trip_their_names() {
        for kind in AssertionKind::ALL {
            assert_eq!(AssertionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AssertionKind::parse("icontains"), None);
        assert!(AssertionKind::LlmRubric.is_model_graded());
        assert!(!AssertionKind::Cost.is_model_graded());
    }

    #[test]
    fn use_case_accepts_inline_and_referenced_entries() {
        let yaml = r#"
description: Translation
prompts: file://prompts/translation.txt
providers:
  - openai:gpt-4o-mini
  - id: anthropic:messages:claude-3-5-haiku-latest
    label: haiku
tests:
  - file://test-inputs/translation.yaml
  - description: inline
    vars:
      inputText: Hello
      retries: 3
    assert:
      - type: contains
        value: Hello
defaultTest:
  options:
    provider: openai:gpt-4o
  assert:
    - file://evals/quality.yaml
    - type: cost
      threshold: 0.01
"#;
        let uc: UseCaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(uc.prompts, vec!["file://prompts/translation.txt"]);
        assert_eq!(uc.providers.len(), 2);
        assert_eq!(uc.providers[1].display_name(), "haiku");
        assert!(matches!(&uc.tests[0], Entry::Reference(r) if r == "file://test-inputs/translation.yaml"));
        let Entry::Inline(tc) = &uc.tests[1] else {
            panic!("expected inline test");
        };
        assert_eq!(scalar_to_string(&tc.vars["retries"]).as_deref(), Some("3"));
        assert_eq!(tc.assert.len(), 1);

        let dt = uc.default_test.unwrap();
        assert_eq!(dt.options.unwrap().provider.as_deref(), Some("openai:gpt-4o"));
        let Entry::Inline(cost) = &dt.assert[1] else {
            panic!("expected inline assertion");
        };
        assert_eq!(cost.kind(), Some(AssertionKind::Cost));
        assert_eq!(cost.threshold, Some(0.01));
    }

    #[test]
    fn scalar_lists_read_as_one_entry() {
        let yaml = r#"
prompts: file://prompts/translation.txt
providers: openai:gpt-4o-mini
tests: file://test-inputs/translation.yaml
defaultTest:
  assert: file://evals/quality.yaml
"#;
        let uc: UseCaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(uc.providers, vec![ProviderRef::new("openai:gpt-4o-mini")]);
        assert_eq!(
            uc.tests,
            vec![Entry::Reference("file://test-inputs/translation.yaml".to_string())]
        );
        assert_eq!(
            uc.default_test.unwrap().assert,
            vec![Entry::Reference("file://evals/quality.yaml".to_string())]
        );
    }

    #[test]
    fn single_provider_mapping_and_empty_lists() {
        let yaml = "providers:\n  id: ollama:llama3\n  label: local\ntests:\n";
        let uc: UseCaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(uc.providers.len(), 1);
        assert_eq!(uc.providers[0].display_name(), "local");
        assert!(uc.tests.is_empty());
    }

    #[test]
    fn inline_assertion_without_type_is_a_clear_error() {
        let err = serde_yaml::from_str::<AssertEntry>("value: Hello\n").unwrap_err();
        assert!(err.to_string().contains("type"), "{}", err);
    }

    #[test]
    fn label_falls_back_to_position() {
        assert_eq!(UseCaseConfig::default().label(2), "use case 3");
    }
}
