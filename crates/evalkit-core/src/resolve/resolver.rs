use super::{
    Artifact, LoadIssue, ResolveWarning, ResolvedAssertion, ResolvedConfig, ResolvedPrompt,
    ResolvedTestCase, ResolvedUseCase,
};
use crate::config::path_resolver::{PathResolver, Reference};
use crate::config::{from_value_tracked, LoadedConfig, UnknownField};
use crate::errors::LoadError;
use crate::fingerprint::sha256_hex;
use crate::model::{scalar_to_string, AssertEntry, AssertionSpec, Entry, RawTestCase};
use crate::template::PromptTemplate;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prompt files may hold several prompts separated by a line of `---`.
const PROMPT_SEPARATOR: &str = "---";

/// Memoizing loader for one resolution run.
pub struct Resolver {
    paths: PathResolver,
    texts: HashMap<PathBuf, Result<Arc<Artifact>, LoadError>>,
    assertion_sets: HashMap<PathBuf, Arc<Vec<ResolvedAssertion>>>,
    /// Sets whose expansion was cut short by a cycle, with the cycle's chain.
    truncated: HashMap<PathBuf, Vec<String>>,
    test_sets: HashMap<PathBuf, Arc<Vec<ResolvedTestCase>>>,
    /// Assertion-set files currently being expanded, outermost first: (key, display path).
    stack: Vec<(PathBuf, String)>,
    issues: Vec<LoadIssue>,
    warnings: Vec<ResolveWarning>,
}

impl Resolver {
    pub fn new(paths: PathResolver) -> Self {
        Self {
            paths,
            texts: HashMap::new(),
            assertion_sets: HashMap::new(),
            truncated: HashMap::new(),
            test_sets: HashMap::new(),
            stack: Vec::new(),
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn issues(&self) -> &[LoadIssue] {
        &self.issues
    }

    pub fn resolve_config(&mut self, loaded: &LoadedConfig, config_path: &Path) -> ResolvedConfig {
        self.warnings.extend(
            loaded
                .unknown_fields
                .iter()
                .cloned()
                .map(ResolveWarning::UnknownField),
        );

        let mut use_cases = Vec::with_capacity(loaded.config.use_cases.len());
        for (index, uc) in loaded.config.use_cases.iter().enumerate() {
            let description = uc.label(index);
            let site = format!("use case {} ({})", index + 1, description);
            tracing::debug!(use_case = %description, "resolving use case");

            let mut prompts = Vec::new();
            for (i, p) in uc.prompts.iter().enumerate() {
                prompts.extend(self.resolve_prompt(p, i, &format!("{}: prompts[{}]", site, i)));
            }

            let mut tests = Vec::new();
            let mut inline_count = 0;
            for (i, entry) in uc.tests.iter().enumerate() {
                let entry_site = format!("{}: tests[{}]", site, i);
                match entry {
                    Entry::Reference(r) => tests.extend(self.resolve_test_reference(r, &entry_site)),
                    Entry::Inline(raw) => {
                        inline_count += 1;
                        let origin = format!("inline#{}", inline_count);
                        tests.push(self.resolve_test(raw, &origin, inline_count, &entry_site));
                    }
                }
            }

            let default_test = uc.default_test.clone().unwrap_or_default();
            let default_vars = self.resolve_vars(&default_test.vars, &format!("{}: defaultTest.vars", site));
            let default_assertions =
                self.resolve_assert_entries(&default_test.assert, &format!("{}: defaultTest.assert", site));

            use_cases.push(ResolvedUseCase {
                index,
                description,
                prompts,
                providers: uc.providers.clone(),
                tests,
                default_vars,
                default_assertions,
                grading_provider: default_test.options.and_then(|o| o.provider),
            });
        }

        let mut artifacts: Vec<Artifact> = self
            .texts
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|a| a.as_ref().clone())
            .collect();
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        artifacts.dedup_by(|a, b| a.path == b.path);

        ResolvedConfig {
            config_path: config_path.display().to_string(),
            base_dir: self.paths.base_dir().to_path_buf(),
            use_cases,
            errors: std::mem::take(&mut self.issues),
            warnings: std::mem::take(&mut self.warnings),
            artifacts,
        }
    }

    /// Loads (or returns the memoized) assertion list of one assertion-set file.
    pub fn load_assertion_set(&mut self, rel: &str) -> Result<Arc<Vec<ResolvedAssertion>>, LoadError> {
        let files = self.paths.expand(rel)?;
        let mut all = Vec::new();
        for file in files {
            all.extend(self.assertion_set_file(&file, "assertion set")?.iter().cloned());
        }
        Ok(Arc::new(all))
    }

    fn issue(&mut self, error: LoadError, site: &str) {
        tracing::debug!(site, error = %error, "load issue");
        self.issues.push(LoadIssue {
            error,
            site: site.to_string(),
        });
    }

    /// Expands a reference string into files, recording scheme and root warnings.
    fn expand_reference(&mut self, raw: &str, site: &str) -> Option<Vec<PathBuf>> {
        match Reference::parse(raw) {
            Reference::File(rel) => {
                if !self.paths.is_within_root(rel) {
                    self.warnings.push(ResolveWarning::OutsideRoot {
                        reference: raw.to_string(),
                        site: site.to_string(),
                    });
                }
                match self.paths.expand(rel) {
                    Ok(files) => Some(files),
                    Err(e) => {
                        self.issue(e, site);
                        None
                    }
                }
            }
            Reference::Unsupported { scheme } => {
                let err = LoadError::UnsupportedScheme {
                    reference: raw.to_string(),
                    scheme: scheme.to_string(),
                };
                self.issue(err, site);
                None
            }
            Reference::Inline(_) => {
                let err = LoadError::Shape {
                    path: site.to_string(),
                    detail: format!("expected a file:// reference, got `{}`", raw),
                };
                self.issue(err, site);
                None
            }
        }
    }

    fn key(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn load_text(&mut self, path: &Path) -> Result<Arc<Artifact>, LoadError> {
        let key = Self::key(path);
        if let Some(cached) = self.texts.get(&key) {
            return cached.clone();
        }
        let shown = self.paths.display(path);
        let loaded = std::fs::read_to_string(path)
            .map(|text| {
                tracing::debug!(path = %shown, bytes = text.len(), "loaded artifact");
                Arc::new(Artifact {
                    digest: sha256_hex(&text),
                    path: shown.clone(),
                    text,
                })
            })
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LoadError::NotFound {
                        reference: format!("file://{}", shown),
                    }
                } else {
                    LoadError::Read {
                        path: shown.clone(),
                        detail: e.to_string(),
                    }
                }
            });
        self.texts.insert(key, loaded.clone());
        loaded
    }

    fn load_yaml_sequence(&mut self, path: &Path, what: &str) -> Result<(Arc<Artifact>, Vec<serde_yaml::Value>), LoadError> {
        let artifact = self.load_text(path)?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&artifact.text).map_err(|e| LoadError::Parse {
                path: artifact.path.clone(),
                detail: e.to_string(),
            })?;
        match doc {
            serde_yaml::Value::Sequence(items) => Ok((artifact, items)),
            serde_yaml::Value::Null => Ok((artifact, Vec::new())),
            _ => Err(LoadError::Shape {
                path: artifact.path.clone(),
                detail: format!("expected a sequence of {}", what),
            }),
        }
    }

    fn resolve_prompt(&mut self, raw: &str, index: usize, site: &str) -> Vec<ResolvedPrompt> {
        if let Reference::Inline(text) = Reference::parse(raw) {
            let label = format!("inline#{}", index + 1);
            return match PromptTemplate::parse(text) {
                Ok(template) => vec![ResolvedPrompt {
                    label,
                    source: None,
                    template,
                }],
                Err(source) => {
                    self.issue(LoadError::Template { path: label, source }, site);
                    Vec::new()
                }
            };
        }

        let Some(files) = self.expand_reference(raw, site) else {
            return Vec::new();
        };
        let mut prompts = Vec::new();
        for file in files {
            let artifact = match self.load_text(&file) {
                Ok(a) => a,
                Err(e) => {
                    self.issue(e, site);
                    continue;
                }
            };
            let chunks = split_prompts(&artifact.text);
            let multi = chunks.len() > 1;
            for (n, chunk) in chunks.into_iter().enumerate() {
                let label = if multi {
                    format!("{}#{}", artifact.path, n + 1)
                } else {
                    artifact.path.clone()
                };
                match PromptTemplate::parse(chunk) {
                    Ok(template) => prompts.push(ResolvedPrompt {
                        label,
                        source: Some(artifact.path.clone()),
                        template,
                    }),
                    Err(source) => self.issue(LoadError::Template { path: label, source }, site),
                }
            }
        }
        prompts
    }

    fn resolve_test_reference(&mut self, raw: &str, site: &str) -> Vec<ResolvedTestCase> {
        let Some(files) = self.expand_reference(raw, site) else {
            return Vec::new();
        };
        let mut tests = Vec::new();
        for file in files {
            match self.test_set_file(&file) {
                Ok(set) => tests.extend(set.iter().cloned()),
                Err(e) => self.issue(e, site),
            }
        }
        tests
    }

    fn test_set_file(&mut self, file: &Path) -> Result<Arc<Vec<ResolvedTestCase>>, LoadError> {
        let key = Self::key(file);
        if let Some(cached) = self.test_sets.get(&key) {
            tracing::debug!(path = %self.paths.display(file), "test set cache hit");
            return Ok(cached.clone());
        }

        let (artifact, items) = self.load_yaml_sequence(file, "test cases")?;
        let mut tests = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let origin = format!("{}#{}", artifact.path, i + 1);
            if !item.is_mapping() {
                self.issue(
                    LoadError::Shape {
                        path: artifact.path.clone(),
                        detail: format!("test case #{} is not a mapping", i + 1),
                    },
                    &origin,
                );
                continue;
            }
            match from_value_tracked::<RawTestCase>(item) {
                Ok((raw, ignored)) => {
                    self.note_unknown(&artifact.path, &format!("[{}]", i), ignored);
                    tests.push(self.resolve_test(&raw, &origin, i + 1, &origin));
                }
                Err(detail) => self.issue(
                    LoadError::Shape {
                        path: artifact.path.clone(),
                        detail: format!("test case #{}: {}", i + 1, detail),
                    },
                    &origin,
                ),
            }
        }

        let tests = Arc::new(tests);
        self.test_sets.insert(key, tests.clone());
        Ok(tests)
    }

    fn resolve_test(&mut self, raw: &RawTestCase, origin: &str, position: usize, site: &str) -> ResolvedTestCase {
        ResolvedTestCase {
            description: raw
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| format!("test #{}", position)),
            vars: self.resolve_vars(&raw.vars, &format!("{}: vars", site)),
            assertions: self.resolve_assert_entries(&raw.assert, &format!("{}: assert", site)),
            origin: origin.to_string(),
        }
    }

    fn resolve_vars(&mut self, vars: &BTreeMap<String, serde_yaml::Value>, site: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, value) in vars {
            let Some(text) = scalar_to_string(value) else {
                self.issue(
                    LoadError::Shape {
                        path: site.to_string(),
                        detail: format!("variable `{}` must be a plain string, number or boolean", name),
                    },
                    site,
                );
                continue;
            };
            // Only file:// triggers a load; other URLs are ordinary values.
            if let Reference::File(rel) = Reference::parse(&text) {
                let var_site = format!("{}.{}", site, name);
                let Some(files) = self.expand_reference(&text, &var_site) else {
                    continue;
                };
                if files.len() != 1 {
                    self.issue(
                        LoadError::Shape {
                            path: rel.to_string(),
                            detail: format!("variable `{}` must reference exactly one file, matched {}", name, files.len()),
                        },
                        &var_site,
                    );
                    continue;
                }
                match self.load_text(&files[0]) {
                    Ok(a) => {
                        out.insert(name.clone(), a.text.clone());
                    }
                    Err(e) => self.issue(e, &var_site),
                }
            } else {
                out.insert(name.clone(), text);
            }
        }
        out
    }

    fn resolve_assert_entries(&mut self, entries: &[AssertEntry], site: &str) -> Vec<ResolvedAssertion> {
        let mut out = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let entry_site = format!("{}[{}]", site, i);
            match entry {
                Entry::Inline(spec) => out.push(ResolvedAssertion {
                    spec: spec.clone(),
                    origin: "inline".to_string(),
                }),
                Entry::Reference(r) => {
                    let Some(files) = self.expand_reference(r, &entry_site) else {
                        continue;
                    };
                    for file in files {
                        match self.assertion_set_file(&file, &entry_site) {
                            Ok(set) => out.extend(set.iter().cloned()),
                            Err(e) => self.issue(e, &entry_site),
                        }
                    }
                }
            }
        }
        out
    }

    fn assertion_set_file(&mut self, file: &Path, site: &str) -> Result<Arc<Vec<ResolvedAssertion>>, LoadError> {
        let key = Self::key(file);
        if let Some(cached) = self.assertion_sets.get(&key).cloned() {
            tracing::debug!(path = %self.paths.display(file), "assertion set cache hit");
            // A set cut short by a cycle is reported again at each later referrer.
            if let Some(chain) = self.truncated.get(&key).cloned() {
                self.issue(LoadError::Cycle { chain }, site);
            }
            return Ok(cached);
        }
        if let Some(pos) = self.stack.iter().position(|(k, _)| *k == key) {
            let mut chain: Vec<String> = self.stack[pos..].iter().map(|(_, d)| d.clone()).collect();
            chain.push(self.paths.display(file));
            // Everything still being expanded splices in the truncated list.
            for (k, _) in &self.stack {
                self.truncated.entry(k.clone()).or_insert_with(|| chain.clone());
            }
            return Err(LoadError::Cycle { chain });
        }

        let (artifact, items) = self.load_yaml_sequence(file, "assertions")?;
        self.stack.push((key.clone(), artifact.path.clone()));
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let origin = format!("{}#{}", artifact.path, i + 1);
            match item {
                serde_yaml::Value::String(nested) => {
                    // Nested set: spliced in place.
                    let Some(files) = self.expand_reference(&nested, &origin) else {
                        continue;
                    };
                    for nested_file in files {
                        match self.assertion_set_file(&nested_file, &origin) {
                            Ok(set) => out.extend(set.iter().cloned()),
                            Err(e) => self.issue(e, &origin),
                        }
                    }
                }
                serde_yaml::Value::Mapping(_) => match from_value_tracked::<AssertionSpec>(item) {
                    Ok((spec, ignored)) => {
                        self.note_unknown(&artifact.path, &format!("[{}]", i), ignored);
                        out.push(ResolvedAssertion { spec, origin });
                    }
                    Err(detail) => self.issue(
                        LoadError::Shape {
                            path: artifact.path.clone(),
                            detail: format!("assertion #{}: {}", i + 1, detail),
                        },
                        &origin,
                    ),
                },
                _ => self.issue(
                    LoadError::Shape {
                        path: artifact.path.clone(),
                        detail: format!("assertion #{} must be a mapping or a file:// reference", i + 1),
                    },
                    &origin,
                ),
            }
        }
        self.stack.pop();
        tracing::debug!(path = %artifact.path, site, count = out.len(), "loaded assertion set");

        let out = Arc::new(out);
        self.assertion_sets.insert(key, out.clone());
        Ok(out)
    }

    fn note_unknown(&mut self, file: &str, prefix: &str, ignored: Vec<String>) {
        for field in ignored {
            let field = field
                .split('.')
                .filter(|seg| !seg.is_empty() && *seg != "?")
                .collect::<Vec<_>>()
                .join(".");
            self.warnings.push(ResolveWarning::UnknownField(UnknownField {
                file: file.to_string(),
                field: format!("{}.{}", prefix, field),
            }));
        }
    }
}

/// Splits prompt file text on `---` lines. A file without separators is one prompt, verbatim.
fn split_prompts(text: &str) -> Vec<&str> {
    let has_separator = text.lines().any(|l| l.trim() == PROMPT_SEPARATOR);
    if !has_separator {
        return vec![text];
    }
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim() == PROMPT_SEPARATOR {
            chunks.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    chunks.push(&text[start..]);
    chunks
        .into_iter()
        .map(|c| c.trim_matches(|ch| ch == '\n' || ch == '\r'))
        .filter(|c| !c.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod split_tests {
    use super::split_prompts;

    #[test]
    fn single_prompt_is_verbatim() {
        assert_eq!(split_prompts("Hello {{x}}\n"), vec!["Hello {{x}}\n"]);
    }

    #[test]
    fn separator_lines_split_and_trim() {
        let chunks = split_prompts("first {{a}}\n---\nsecond {{b}}\n---\n\n");
        assert_eq!(chunks, vec!["first {{a}}", "second {{b}}"]);
    }
}
