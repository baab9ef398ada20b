//! Reversible text substitution ("magic" masking).
//!
//! Host languages often carry directive syntax a language server does not understand (IPython
//! `%magics`, `!shell` escapes, `%%cell` magics). Before a cell reaches the virtual document
//! such syntax is replaced by valid code, and text coming back from the server (for example
//! an "insert text" action) is turned back into the original syntax.
//!
//! - [`SubstitutionRule`]: one regex + replacement.
//! - [`SubstitutionMap`]: ordered rules, first match wins.
//! - [`ReversibleSubstitutionMap`]: a forward map plus the map built from the reverse rules.
//!
//! Replacement text used for masking must not occur naturally in the host language, otherwise
//! the reverse direction is ambiguous. That is the caller's responsibility.

use regex::{Captures, NoExpand, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use vdoc_lang::{LanguageOverrides, OverrideScope, OverrideSpec, OverridesConfig};

/// Errors produced while compiling override rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("invalid override pattern '{pattern}': {message}")]
    /// A rule pattern failed to compile.
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler message.
        message: String,
    },
}

fn compile(pattern: &str) -> Result<Regex, OverrideError> {
    Regex::new(pattern).map_err(|err| OverrideError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// Host-supplied replacement computed from the match captures.
pub type ReplacerFn = Arc<dyn Fn(&Captures<'_>) -> String + Send + Sync>;

/// How a matched rule produces its output.
#[derive(Clone)]
pub enum Replacement {
    /// `$1` / `${name}` template expanded against the captures.
    Template(String),
    /// Plain text inserted as-is.
    Literal(String),
    /// Arbitrary function of the captures.
    Function(ReplacerFn),
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// A single substitution: the first match of `pattern` is replaced.
#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    pattern: Regex,
    replacement: Replacement,
}

impl SubstitutionRule {
    /// Regex rule with a `$n` template replacement.
    pub fn regex(pattern: &str, template: impl Into<String>) -> Result<Self, OverrideError> {
        Ok(Self {
            pattern: compile(pattern)?,
            replacement: Replacement::Template(template.into()),
        })
    }

    /// Rule matching exactly `text` (the whole input) and producing `replacement` verbatim.
    pub fn literal(text: &str, replacement: impl Into<String>) -> Result<Self, OverrideError> {
        Ok(Self {
            pattern: compile(&format!(r"\A{}\z", regex::escape(text)))?,
            replacement: Replacement::Literal(replacement.into()),
        })
    }

    /// Regex rule whose replacement is computed by `replacer`.
    pub fn function<F>(pattern: &str, replacer: F) -> Result<Self, OverrideError>
    where
        F: Fn(&Captures<'_>) -> String + Send + Sync + 'static,
    {
        Ok(Self {
            pattern: compile(pattern)?,
            replacement: Replacement::Function(Arc::new(replacer)),
        })
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Returns `true` if the rule fires on `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Apply the rule, or `None` if it does not match.
    pub fn apply(&self, text: &str) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }
        let replaced = match &self.replacement {
            Replacement::Template(template) => self.pattern.replace(text, template.as_str()),
            Replacement::Literal(literal) => self.pattern.replace(text, NoExpand(literal)),
            Replacement::Function(replacer) => {
                self.pattern.replace(text, |caps: &Captures<'_>| replacer(caps))
            }
        };
        Some(replaced.into_owned())
    }
}

/// A forward rule and, optionally, the rule reconstructing its input.
#[derive(Debug, Clone)]
pub struct ReversibleRule {
    /// Masking direction.
    pub forward: SubstitutionRule,
    /// Unmasking direction; forward-only rules leave this empty.
    pub reverse: Option<SubstitutionRule>,
}

impl ReversibleRule {
    /// Pair a forward rule with its inverse.
    pub fn new(forward: SubstitutionRule, reverse: SubstitutionRule) -> Self {
        Self {
            forward,
            reverse: Some(reverse),
        }
    }

    /// A rule that cannot be undone.
    pub fn forward_only(forward: SubstitutionRule) -> Self {
        Self {
            forward,
            reverse: None,
        }
    }

    /// Literal `from` <-> `to` rule.
    pub fn literal(from: &str, to: &str) -> Result<Self, OverrideError> {
        Ok(Self::new(
            SubstitutionRule::literal(from, to)?,
            SubstitutionRule::literal(to, from)?,
        ))
    }

    /// Compile a rule from its configuration form.
    pub fn from_spec(spec: &OverrideSpec) -> Result<Self, OverrideError> {
        let forward = compile_spec(spec)?;
        let reverse = spec.reverse.as_deref().map(compile_spec).transpose()?;
        Ok(Self { forward, reverse })
    }
}

fn compile_spec(spec: &OverrideSpec) -> Result<SubstitutionRule, OverrideError> {
    if spec.literal {
        SubstitutionRule::literal(&spec.pattern, spec.replacement.clone())
    } else {
        SubstitutionRule::regex(&spec.pattern, spec.replacement.clone())
    }
}

/// Outcome of applying line rules to a sequence of lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplaceAllResult {
    /// Transformed lines, one per input line.
    pub lines: Vec<String>,
    /// For each line, whether a rule fired.
    pub applied: Vec<bool>,
}

/// Ordered list of rules; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    rules: Vec<SubstitutionRule>,
}

impl SubstitutionMap {
    /// Create a map from rules in priority order.
    pub fn new(rules: Vec<SubstitutionRule>) -> Self {
        Self { rules }
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replacement produced by the first rule matching `text`.
    pub fn override_for(&self, text: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| rule.apply(text))
    }

    /// Apply the rules to each line independently.
    pub fn replace_all<S: AsRef<str>>(&self, lines: &[S]) -> ReplaceAllResult {
        let mut result = ReplaceAllResult {
            lines: Vec::with_capacity(lines.len()),
            applied: Vec::with_capacity(lines.len()),
        };
        for line in lines {
            let line = line.as_ref();
            match self.override_for(line) {
                Some(replaced) => {
                    result.lines.push(replaced);
                    result.applied.push(true);
                }
                None => {
                    result.lines.push(line.to_string());
                    result.applied.push(false);
                }
            }
        }
        result
    }
}

/// Forward substitution map plus its reverse.
#[derive(Debug, Clone, Default)]
pub struct ReversibleSubstitutionMap {
    forward: SubstitutionMap,
    reverse: SubstitutionMap,
}

impl ReversibleSubstitutionMap {
    /// Build both directions from `rules`, keeping declaration order.
    pub fn new(rules: Vec<ReversibleRule>) -> Self {
        let mut forward = Vec::with_capacity(rules.len());
        let mut reverse = Vec::new();
        for rule in rules {
            forward.push(rule.forward);
            if let Some(inverse) = rule.reverse {
                reverse.push(inverse);
            }
        }
        Self {
            forward: SubstitutionMap::new(forward),
            reverse: SubstitutionMap::new(reverse),
        }
    }

    /// Compile a map from configuration specs.
    pub fn from_specs(specs: &[OverrideSpec]) -> Result<Self, OverrideError> {
        let rules = specs
            .iter()
            .map(ReversibleRule::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// The reverse direction as a map of its own.
    pub fn reverse(&self) -> &SubstitutionMap {
        &self.reverse
    }

    /// See [`SubstitutionMap::override_for`].
    pub fn override_for(&self, text: &str) -> Option<String> {
        self.forward.override_for(text)
    }

    /// See [`SubstitutionMap::replace_all`].
    pub fn replace_all<S: AsRef<str>>(&self, lines: &[S]) -> ReplaceAllResult {
        self.forward.replace_all(lines)
    }

    /// Undo a whole-text substitution.
    pub fn reverse_override_for(&self, text: &str) -> Option<String> {
        self.reverse.override_for(text)
    }

    /// Undo per-line substitutions.
    pub fn reverse_replace_all<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        self.reverse.replace_all(lines).lines
    }
}

/// Compiled cell-scoped and line-scoped rules of one host language.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    /// Rules matched against the whole kept code of a cell.
    pub cell: Vec<ReversibleRule>,
    /// Rules matched against each line.
    pub line: Vec<ReversibleRule>,
}

impl OverrideSet {
    /// Compile the rules of one language.
    pub fn from_config(config: &LanguageOverrides) -> Result<Self, OverrideError> {
        let compile_all = |specs: &[OverrideSpec]| {
            specs
                .iter()
                .map(ReversibleRule::from_spec)
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            cell: compile_all(&config.cell)?,
            line: compile_all(&config.line)?,
        })
    }

    /// Forward/reverse map for the cell scope.
    pub fn cell_map(&self) -> ReversibleSubstitutionMap {
        ReversibleSubstitutionMap::new(self.cell.clone())
    }

    /// Forward/reverse map for the line scope.
    pub fn line_map(&self) -> ReversibleSubstitutionMap {
        ReversibleSubstitutionMap::new(self.line.clone())
    }
}

/// Override registry: host language id -> compiled rules.
#[derive(Debug, Clone, Default)]
pub struct OverrideRegistry {
    languages: HashMap<String, OverrideSet>,
}

impl OverrideRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every language of `config`.
    pub fn from_config(config: &OverridesConfig) -> Result<Self, OverrideError> {
        let mut registry = Self::new();
        for (language, overrides) in config.iter() {
            registry
                .languages
                .insert(language.to_string(), OverrideSet::from_config(overrides)?);
        }
        Ok(registry)
    }

    /// Add a compiled rule for `language`.
    pub fn register(
        &mut self,
        language: impl Into<String>,
        scope: OverrideScope,
        rule: ReversibleRule,
    ) {
        let set = self.languages.entry(language.into()).or_default();
        match scope {
            OverrideScope::Cell => set.cell.push(rule),
            OverrideScope::Line => set.line.push(rule),
        }
    }

    /// Append every rule of `set` to those of `language`.
    pub fn extend(&mut self, language: impl Into<String>, set: OverrideSet) {
        let entry = self.languages.entry(language.into()).or_default();
        entry.cell.extend(set.cell);
        entry.line.extend(set.line);
    }

    /// Rules for `language`.
    pub fn get(&self, language: &str) -> Option<&OverrideSet> {
        self.languages.get(language)
    }
}
