//! Foreign code extraction.
//!
//! A host cell may embed code in another language (`%%javascript` cells, SQL strings, ...).
//! Extractors split a cell into the code kept in the host document and the excerpts that go
//! into foreign documents. Detection is pluggable through [`ForeignCodeExtractor`];
//! [`RegexForeignCodeExtractor`] covers the common pattern-driven case.

use crate::position::{EditorPosition, EditorRange};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use vdoc_lang::{ExtractorSpec, ExtractorsConfig};

/// Errors produced while building extractors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractorError {
    #[error("invalid extractor pattern '{pattern}': {message}")]
    /// The extractor pattern failed to compile.
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler message.
        message: String,
    },

    #[error("extractor pattern '{pattern}' has no capture group {group}")]
    /// The configured foreign capture group does not exist.
    MissingCaptureGroup {
        /// The pattern.
        pattern: String,
        /// The requested group index.
        group: usize,
    },
}

/// One segment of an extracted cell.
///
/// Host-only segments carry `host_code` and nothing else. Foreign segments carry the excerpt,
/// its range in the cell editor, and `virtual_shift`: the offset from `range.start` to the
/// first character of `foreign_code`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedCode {
    /// Text kept in the host document for this segment.
    pub host_code: Option<String>,
    /// Embedded-language text.
    pub foreign_code: Option<String>,
    /// Range of the whole match inside the cell.
    pub range: Option<EditorRange>,
    /// Offset of the foreign text relative to `range.start`.
    pub virtual_shift: Option<EditorPosition>,
}

impl ExtractedCode {
    /// A host-only segment.
    pub fn host(code: impl Into<String>) -> Self {
        Self {
            host_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Editor position where the foreign text starts.
    pub fn foreign_origin(&self) -> Option<EditorPosition> {
        let range = self.range?;
        Some(match self.virtual_shift {
            Some(shift) => range.start.offset_by(shift),
            None => range.start,
        })
    }
}

/// Detects and extracts embedded code of one language.
pub trait ForeignCodeExtractor: fmt::Debug {
    /// Embedded language id.
    fn language(&self) -> &str;

    /// Whether every occurrence gets its own foreign document.
    fn standalone(&self) -> bool;

    /// File extension hint for foreign documents.
    fn file_extension(&self) -> &str;

    /// Quick check before [`ForeignCodeExtractor::extract_foreign_code`].
    fn has_foreign_code(&self, code: &str) -> bool;

    /// Split `code` into host and foreign segments, in text order.
    ///
    /// Concatenating every `host_code` yields the code kept in the host document.
    fn extract_foreign_code(&self, code: &str) -> Vec<ExtractedCode>;
}

/// Pattern-driven extractor built from an [`ExtractorSpec`].
#[derive(Debug, Clone)]
pub struct RegexForeignCodeExtractor {
    spec: ExtractorSpec,
    pattern: Regex,
}

impl RegexForeignCodeExtractor {
    /// Compile `spec`.
    pub fn new(spec: ExtractorSpec) -> Result<Self, ExtractorError> {
        let pattern = Regex::new(&spec.pattern).map_err(|err| ExtractorError::InvalidPattern {
            pattern: spec.pattern.clone(),
            message: err.to_string(),
        })?;
        if spec.foreign_capture_group >= pattern.captures_len() {
            return Err(ExtractorError::MissingCaptureGroup {
                pattern: spec.pattern.clone(),
                group: spec.foreign_capture_group,
            });
        }
        Ok(Self { spec, pattern })
    }

    /// The spec this extractor was built from.
    pub fn spec(&self) -> &ExtractorSpec {
        &self.spec
    }
}

impl ForeignCodeExtractor for RegexForeignCodeExtractor {
    fn language(&self) -> &str {
        &self.spec.language
    }

    fn standalone(&self) -> bool {
        self.spec.standalone
    }

    fn file_extension(&self) -> &str {
        &self.spec.file_extension
    }

    fn has_foreign_code(&self, code: &str) -> bool {
        self.pattern.is_match(code)
    }

    fn extract_foreign_code(&self, code: &str) -> Vec<ExtractedCode> {
        let mut extracts = Vec::new();
        let mut started_from = 0;

        for caps in self.pattern.captures_iter(code) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > started_from {
                extracts.push(ExtractedCode::host(&code[started_from..whole.start()]));
            }

            // An optional group that did not participate still has a known start: the match.
            let foreign_start = caps
                .get(self.spec.foreign_capture_group)
                .map_or(whole.start(), |m| m.start());
            let foreign_code = caps
                .get(self.spec.foreign_capture_group)
                .map_or("", |m| m.as_str());

            let host_code = if self.spec.keep_in_host {
                whole.as_str().to_string()
            } else {
                let mut expanded = String::new();
                if let Some(template) = &self.spec.host_template {
                    caps.expand(template, &mut expanded);
                }
                expanded
            };

            let range = EditorRange::new(
                EditorPosition::end_of(&code[..whole.start()]),
                EditorPosition::end_of(&code[..whole.end()]),
            );
            extracts.push(ExtractedCode {
                host_code: Some(host_code),
                foreign_code: Some(foreign_code.to_string()),
                range: Some(range),
                virtual_shift: Some(EditorPosition::end_of(
                    &code[whole.start()..foreign_start],
                )),
            });
            started_from = whole.end();
        }

        if started_from < code.len() {
            extracts.push(ExtractedCode::host(&code[started_from..]));
        }
        extracts
    }
}

/// Extractors per host language, in application order.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    languages: HashMap<String, Vec<Arc<dyn ForeignCodeExtractor + Send + Sync>>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every spec of `config`.
    pub fn from_config(config: &ExtractorsConfig) -> Result<Self, ExtractorError> {
        let mut registry = Self::new();
        for (host_language, specs) in config.iter() {
            for spec in specs {
                registry.register(
                    host_language,
                    Arc::new(RegexForeignCodeExtractor::new(spec.clone())?),
                );
            }
        }
        Ok(registry)
    }

    /// Register `extractor` for cells written in `host_language`.
    pub fn register(
        &mut self,
        host_language: impl Into<String>,
        extractor: Arc<dyn ForeignCodeExtractor + Send + Sync>,
    ) {
        self.languages
            .entry(host_language.into())
            .or_default()
            .push(extractor);
    }

    /// Extractors for `host_language`.
    pub fn for_language(
        &self,
        host_language: &str,
    ) -> &[Arc<dyn ForeignCodeExtractor + Send + Sync>] {
        self.languages
            .get(host_language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Run of kept host text and where it came from in the fragment.
#[derive(Debug, Clone, Copy)]
struct KeptSegment {
    kept: usize,
    original: usize,
    len: usize,
    /// Copied from the fragment byte for byte; otherwise template text anchored at `original`.
    verbatim: bool,
}

/// Host code left after some extractors ran, with byte offsets back into the fragment text.
///
/// Extractors chain: each one sees the code kept by the previous ones, so every position it
/// reports has to be carried back through this map before it can be stored.
#[derive(Debug, Clone)]
pub(crate) struct HostCode<'a> {
    original: &'a str,
    newlines: Vec<usize>,
    text: String,
    segments: Vec<KeptSegment>,
}

impl<'a> HostCode<'a> {
    pub(crate) fn new(original: &'a str) -> Self {
        Self {
            original,
            newlines: original.match_indices('\n').map(|(i, _)| i).collect(),
            text: original.to_string(),
            segments: vec![KeptSegment {
                kept: 0,
                original: 0,
                len: original.len(),
                verbatim: true,
            }],
        }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }

    /// Fragment position of `position`, given in the current host text.
    pub(crate) fn to_fragment(&self, position: EditorPosition) -> EditorPosition {
        self.fragment_position(self.to_original(byte_offset(&self.text, position)))
    }

    /// Fragment range of `range`, given in the current host text.
    pub(crate) fn range_to_fragment(&self, range: EditorRange) -> EditorRange {
        EditorRange::new(self.to_fragment(range.start), self.to_fragment(range.end))
    }

    /// Fragment position of the first character of every kept line.
    pub(crate) fn line_origins(&self) -> Vec<EditorPosition> {
        std::iter::once(0)
            .chain(self.text.match_indices('\n').map(|(i, _)| i + 1))
            .map(|offset| self.fragment_position(self.to_original(offset)))
            .collect()
    }

    /// Host code after applying one extractor's `extracts` to the current text.
    pub(crate) fn keep(&self, extracts: &[ExtractedCode]) -> HostCode<'a> {
        let mut text = String::new();
        let mut segments = Vec::new();
        let mut cursor = 0;

        for extracted in extracts {
            let host_code = extracted.host_code.as_deref().unwrap_or("");
            match extracted.range {
                None => {
                    self.copy_segments(cursor, host_code.len(), text.len(), &mut segments);
                    cursor += host_code.len();
                }
                Some(range) => {
                    let start = byte_offset(&self.text, range.start);
                    let end = byte_offset(&self.text, range.end);
                    if self.text.get(start..end) == Some(host_code) {
                        self.copy_segments(start, end - start, text.len(), &mut segments);
                    } else {
                        segments.push(KeptSegment {
                            kept: text.len(),
                            original: self.to_original(start),
                            len: host_code.len(),
                            verbatim: false,
                        });
                    }
                    cursor = end;
                }
            }
            text.push_str(host_code);
        }

        HostCode {
            original: self.original,
            newlines: self.newlines.clone(),
            text,
            segments,
        }
    }

    fn copy_segments(&self, start: usize, len: usize, kept_at: usize, out: &mut Vec<KeptSegment>) {
        let end = start.saturating_add(len);
        for segment in &self.segments {
            let lo = start.max(segment.kept);
            let hi = end.min(segment.kept + segment.len);
            if lo >= hi {
                continue;
            }
            out.push(KeptSegment {
                kept: kept_at + (lo - start),
                original: if segment.verbatim {
                    segment.original + (lo - segment.kept)
                } else {
                    segment.original
                },
                len: hi - lo,
                verbatim: segment.verbatim,
            });
        }
    }

    fn to_original(&self, offset: usize) -> usize {
        let segment = self
            .segments
            .iter()
            .find(|s| s.kept <= offset && offset < s.kept + s.len)
            .or_else(|| {
                self.segments
                    .iter()
                    .rev()
                    .find(|s| s.kept <= offset && offset <= s.kept + s.len)
            });
        match segment {
            Some(s) if s.verbatim => s.original + (offset - s.kept),
            Some(s) => s.original,
            None => self.original.len(),
        }
    }

    fn fragment_position(&self, offset: usize) -> EditorPosition {
        let line = self.newlines.partition_point(|&newline| newline < offset);
        let line_start = match line {
            0 => 0,
            _ => self.newlines[line - 1] + 1,
        };
        let column = self
            .original
            .get(line_start..offset)
            .map_or(0, |text| text.chars().count());
        EditorPosition::new(line, column)
    }
}

/// Byte offset of `position` in `text`, clamped to the end of its line.
fn byte_offset(text: &str, position: EditorPosition) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }
    let line = &text[line_start..];
    let line_end = line.find('\n').unwrap_or(line.len());
    line[..line_end]
        .char_indices()
        .nth(position.column)
        .map_or(line_start + line_end, |(i, _)| line_start + i)
}
