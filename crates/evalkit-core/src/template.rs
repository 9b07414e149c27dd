//! Prompt templates with `{{name}}` placeholders.
//!
//! A placeholder is `{{ name }}` (surrounding whitespace allowed), optionally
//! followed by filters: `{{ name | trim | upper }}`. Supported filters are
//! `upper`, `lower` and `trim`. Substitution is a single pass: values are
//! inserted verbatim and never scanned for further placeholders.

use crate::errors::similarity::closest_match;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use thiserror::Error;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\{\{(.*?)\}\}").unwrap();
    static ref NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("unterminated placeholder at line {line}, column {column}")]
    Unterminated { line: usize, column: usize },

    #[error("empty placeholder at line {line}, column {column}")]
    Empty { line: usize, column: usize },

    #[error("invalid placeholder name `{name}` at line {line}, column {column}")]
    InvalidName {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("unknown filter `{filter}` on `{name}` at line {line}, column {column}")]
    UnknownFilter {
        name: String,
        filter: String,
        line: usize,
        column: usize,
    },

    #[error("missing variables: {}", describe_missing(missing))]
    MissingVariables { missing: Vec<MissingVariable> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingVariable {
    pub name: String,
    /// Closest supplied variable name, when one looks like a typo of this one.
    pub suggestion: Option<String>,
}

fn describe_missing(missing: &[MissingVariable]) -> String {
    missing
        .iter()
        .map(|m| match &m.suggestion {
            Some(s) => format!("{} (did you mean `{}`?)", m.name, s),
            None => m.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Upper,
    Lower,
    Trim,
}

impl Filter {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "upper" => Some(Self::Upper),
            "lower" => Some(Self::Lower),
            "trim" => Some(Self::Trim),
            _ => None,
        }
    }

    fn apply(self, value: String) -> String {
        match self {
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Trim => value.trim().to_string(),
        }
    }
}

/// One `{{...}}` occurrence in the template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub filters: Vec<Filter>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    content: String,
    placeholders: Vec<Placeholder>,
    names: Vec<String>,
}

impl PromptTemplate {
    pub fn parse(content: impl Into<String>) -> Result<Self, TemplateError> {
        let content = content.into();
        let mut placeholders = Vec::new();
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut last_end = 0;

        for cap in TOKEN.captures_iter(&content) {
            let Some(whole) = cap.get(0) else { continue };
            check_no_stray_open(&content, last_end..whole.start())?;
            last_end = whole.end();

            let (line, column) = line_col(&content, whole.start());
            let inner = cap.get(1).map_or("", |m| m.as_str());
            let mut parts = inner.split('|').map(str::trim);
            let name = parts.next().unwrap_or("");
            if name.is_empty() {
                return Err(TemplateError::Empty { line, column });
            }
            if !NAME.is_match(name) {
                return Err(TemplateError::InvalidName {
                    name: name.to_string(),
                    line,
                    column,
                });
            }
            let filters = parts
                .map(|f| {
                    Filter::parse(f).ok_or_else(|| TemplateError::UnknownFilter {
                        name: name.to_string(),
                        filter: f.to_string(),
                        line,
                        column,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
            placeholders.push(Placeholder {
                name: name.to_string(),
                filters,
                span: whole.range(),
            });
        }
        check_no_stray_open(&content, last_end..content.len())?;

        Ok(Self {
            content,
            placeholders,
            names,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Placeholder names in order of first appearance, without duplicates.
    pub fn variables(&self) -> &[String] {
        &self.names
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn has_variables(&self) -> bool {
        !self.names.is_empty()
    }

    /// Placeholders with no entry in `vars`, each with a typo suggestion when one fits.
    pub fn missing_variables(&self, vars: &BTreeMap<String, String>) -> Vec<MissingVariable> {
        self.names
            .iter()
            .filter(|name| !vars.contains_key(name.as_str()))
            .map(|name| MissingVariable {
                name: name.clone(),
                suggestion: closest_match(name, vars.keys()).map(|m| m.candidate),
            })
            .collect()
    }

    pub fn render(&self, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let missing = self.missing_variables(vars);
        if !missing.is_empty() {
            return Err(TemplateError::MissingVariables { missing });
        }

        let mut out = String::with_capacity(self.content.len());
        let mut cursor = 0;
        for ph in &self.placeholders {
            out.push_str(&self.content[cursor..ph.span.start]);
            let value = vars.get(&ph.name).cloned().unwrap_or_default();
            let value = ph.filters.iter().fold(value, |v, f| f.apply(v));
            out.push_str(&value);
            cursor = ph.span.end;
        }
        out.push_str(&self.content[cursor..]);
        Ok(out)
    }
}

/// Whether `text` still holds anything that looks like a placeholder.
pub fn contains_placeholder(text: &str) -> bool {
    TOKEN.is_match(text)
}

pub fn render_template(
    template: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    PromptTemplate::parse(template)?.render(vars)
}

fn check_no_stray_open(content: &str, gap: Range<usize>) -> Result<(), TemplateError> {
    if let Some(pos) = content[gap.clone()].find("{{") {
        let (line, column) = line_col(content, gap.start + pos);
        return Err(TemplateError::Unterminated { line, column });
    }
    Ok(())
}

/// 1-based line and column (in chars) of a byte offset.
fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
