#![warn(missing_docs)]
//! `vdoc-lang` - data-driven language configuration for `vdoc-core`.
//!
//! This crate intentionally stays lightweight: it does **not** compile regular expressions or
//! know anything about virtual documents. It provides small serde-friendly structs that hosts
//! use to describe, per host language:
//!
//! - which magic syntax gets masked before text reaches a language server ([`OverrideSpec`])
//! - which embedded-language excerpts get extracted into foreign documents ([`ExtractorSpec`])
//!
//! `vdoc-core` turns these descriptions into compiled substitution maps and extractors.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while loading language configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    /// The configuration text was not valid JSON for the expected shape.
    Json(#[from] serde_json::Error),
}

/// Where an override rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideScope {
    /// The rule must match the whole (kept) code of a cell.
    Cell,
    /// The rule is tried independently against every line.
    Line,
}

/// A textual substitution rule, optionally paired with the rule that undoes it.
///
/// `pattern` is a regular expression unless `literal` is set; `replacement` may reference
/// capture groups with `$1` / `${name}` (ignored for literal rules).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverrideSpec {
    /// Pattern to look for.
    pub pattern: String,
    /// Replacement template.
    pub replacement: String,
    /// Application scope.
    pub scope: OverrideScope,
    /// Treat `pattern` and `replacement` as plain text that must match the whole input.
    #[serde(default)]
    pub literal: bool,
    /// Rule that reconstructs the original text from the replacement.
    #[serde(default)]
    pub reverse: Option<Box<OverrideSpec>>,
}

impl OverrideSpec {
    /// Create a forward-only regex rule.
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        scope: OverrideScope,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            scope,
            literal: false,
            reverse: None,
        }
    }

    /// Create a rule replacing exactly `from` with `to`, reversible by construction.
    pub fn literal(from: impl Into<String>, to: impl Into<String>, scope: OverrideScope) -> Self {
        let from = from.into();
        let to = to.into();
        let reverse = OverrideSpec {
            pattern: to.clone(),
            replacement: from.clone(),
            scope,
            literal: true,
            reverse: None,
        };
        Self {
            pattern: from,
            replacement: to,
            scope,
            literal: true,
            reverse: Some(Box::new(reverse)),
        }
    }

    /// Attach a reverse rule.
    pub fn with_reverse(
        mut self,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.reverse = Some(Box::new(OverrideSpec::new(pattern, replacement, self.scope)));
        self
    }
}

/// The cell-scoped and line-scoped rules of one host language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LanguageOverrides {
    /// Rules matched against the whole kept code of a cell.
    #[serde(default)]
    pub cell: Vec<OverrideSpec>,
    /// Rules matched against each line.
    #[serde(default)]
    pub line: Vec<OverrideSpec>,
}

impl LanguageOverrides {
    /// Add a rule to the list matching its scope.
    pub fn push(&mut self, spec: OverrideSpec) {
        match spec.scope {
            OverrideScope::Cell => self.cell.push(spec),
            OverrideScope::Line => self.line.push(spec),
        }
    }
}

/// Override registry: host language id -> rule lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct OverridesConfig {
    languages: HashMap<String, LanguageOverrides>,
}

impl OverridesConfig {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from JSON of the shape `{ "python": { "cell": [...], "line": [...] } }`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register a rule for `language`.
    pub fn register(&mut self, language: impl Into<String>, spec: OverrideSpec) {
        self.languages
            .entry(language.into())
            .or_default()
            .push(spec);
    }

    /// Iterate `(language, rules)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LanguageOverrides)> {
        self.languages
            .iter()
            .map(|(language, overrides)| (language.as_str(), overrides))
    }

    /// Rules for `language`, if any were registered.
    pub fn get(&self, language: &str) -> Option<&LanguageOverrides> {
        self.languages.get(language)
    }

    /// Returns `true` if no language has rules.
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

fn default_keep_in_host() -> bool {
    true
}

fn default_capture_group() -> usize {
    1
}

/// Description of a regex-driven foreign code extractor.
///
/// Every match of `pattern` in a host cell becomes one foreign excerpt whose text is the
/// `foreign_capture_group` capture. The matched text stays in the host code when
/// `keep_in_host` is set, otherwise it is replaced by the expansion of `host_template`
/// (or removed when no template is given).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractorSpec {
    /// Embedded language id of the extracted code.
    pub language: String,
    /// Regular expression locating embedded code.
    pub pattern: String,
    /// Capture group holding the foreign code.
    #[serde(default = "default_capture_group")]
    pub foreign_capture_group: usize,
    /// Keep the matched text in the host document.
    #[serde(default = "default_keep_in_host")]
    pub keep_in_host: bool,
    /// Host-side replacement for the match when `keep_in_host` is false.
    #[serde(default)]
    pub host_template: Option<String>,
    /// Allocate a dedicated foreign document per occurrence.
    #[serde(default)]
    pub standalone: bool,
    /// File extension hint for the foreign document.
    pub file_extension: String,
}

impl ExtractorSpec {
    /// Create an extractor definition that keeps the match in the host and shares one foreign document.
    pub fn new(
        language: impl Into<String>,
        pattern: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            pattern: pattern.into(),
            foreign_capture_group: 1,
            keep_in_host: true,
            host_template: None,
            standalone: false,
            file_extension: file_extension.into(),
        }
    }
}

/// Extractor registry: host language id -> extractor specs, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ExtractorsConfig {
    languages: HashMap<String, Vec<ExtractorSpec>>,
}

impl ExtractorsConfig {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from JSON of the shape `{ "python": [ { ... }, ... ] }`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register an extractor for cells written in `host_language`.
    pub fn register(&mut self, host_language: impl Into<String>, spec: ExtractorSpec) {
        self.languages
            .entry(host_language.into())
            .or_default()
            .push(spec);
    }

    /// Iterate `(host_language, specs)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ExtractorSpec])> {
        self.languages
            .iter()
            .map(|(language, specs)| (language.as_str(), specs.as_slice()))
    }

    /// Extractor specs registered for `host_language`.
    pub fn get(&self, host_language: &str) -> &[ExtractorSpec] {
        self.languages
            .get(host_language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
