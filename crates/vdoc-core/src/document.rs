//! The virtual document: composition root of the mapping engine.
//!
//! A [`VirtualDocument`] receives the fragments of a cell-structured document one at a time
//! ([`VirtualDocument::append`]) and accumulates a single flat text with contiguous line
//! numbers. For each fragment it:
//!
//! 1. extracts embedded foreign code into nested documents,
//! 2. masks magic syntax (cell-scoped rules first, then line-scoped rules),
//! 3. indexes virtual and source lines in its [`LineMapping`],
//! 4. appends the transformed text followed by blank separator lines.
//!
//! Composition is phase-separated: call [`VirtualDocument::clear`], append every fragment,
//! then [`VirtualDocument::close_expired_documents`] ([`VirtualDocument::rebuild`] does all
//! three). Translation queries are only meaningful once a pass is complete.

use crate::extractor::{ExtractorRegistry, ForeignCodeExtractor, HostCode};
use crate::foreign::{
    DEFAULT_FOREIGN_DOCUMENT_LIFETIME, ForeignDocumentHandle, ForeignDocumentId,
    ForeignDocumentRegistry, ForeignDocumentRequest, ForeignDocumentSelector, ForeignSelection,
    SharedOrPooledSelector,
};
use crate::line_mapping::{
    ForeignFragment, ForeignFragmentMap, LineMapping, SourceLineRecord, TransformedBlock,
    VirtualLineRecord,
};
use crate::overrides::{OverrideRegistry, ReversibleSubstitutionMap};
use crate::position::{EditorId, EditorPosition, RootPosition, SourcePosition, VirtualPosition};
use ropey::Rope;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Contract violations detected while translating positions.
///
/// These indicate that translation ran against a mapping it was not built for (for example a
/// query interleaved with a composition pass) and are never swallowed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("virtual line {virtual_line} points at source line {source_line}, which has no record")]
    /// A virtual line names a source line that was never recorded.
    MissingSourceLine {
        /// The virtual line being translated.
        virtual_line: usize,
        /// The dangling source line.
        source_line: usize,
    },

    #[error("editor {0:?} is not part of the root mapping")]
    /// The root mapper does not know an editor referenced by a mapped line.
    EditorNotMapped(EditorId),
}

/// Maps cell editor positions to positions in the whole host document.
///
/// Implemented by the top-level composition; a root [`VirtualDocument`] implements it from
/// its own line mapping.
pub trait RootMapper {
    /// Root position of `position` inside `editor`.
    ///
    /// `Ok(None)` means the editor is known but the position lies outside what it contributed;
    /// an unknown editor is a [`MappingError::EditorNotMapped`].
    fn editor_to_root(
        &self,
        editor: EditorId,
        position: EditorPosition,
    ) -> Result<Option<RootPosition>, MappingError>;
}

fn default_blank_lines() -> usize {
    2
}

fn default_lifetime() -> u32 {
    DEFAULT_FOREIGN_DOCUMENT_LIFETIME
}

/// Per-document configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentOptions {
    /// Language id of the document text.
    pub language: String,
    /// Path of the host document.
    pub path: String,
    /// File extension hint for the language server.
    #[serde(default)]
    pub file_extension: String,
    /// Whether the host file itself is understood by the language server.
    #[serde(default)]
    pub has_lsp_supported_file: bool,
    /// Blank lines inserted after every fragment.
    #[serde(default = "default_blank_lines")]
    pub blank_lines_between_cells: usize,
    /// Unreferenced passes a foreign document survives.
    #[serde(default = "default_lifetime")]
    pub foreign_document_lifetime: u32,
}

impl DocumentOptions {
    /// Options with defaults for everything but the language and path.
    pub fn new(language: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            path: path.into(),
            file_extension: String::new(),
            has_lsp_supported_file: false,
            blank_lines_between_cells: default_blank_lines(),
            foreign_document_lifetime: default_lifetime(),
        }
    }
}

/// Collaborators shared by a document and all of its foreign documents.
#[derive(Debug, Clone)]
pub struct DocumentServices {
    /// Magic override rules per language.
    pub overrides: Arc<OverrideRegistry>,
    /// Foreign code extractors per host language.
    pub extractors: Arc<ExtractorRegistry>,
    /// Foreign document allocation policy.
    pub selector: Arc<dyn ForeignDocumentSelector>,
}

impl Default for DocumentServices {
    fn default() -> Self {
        Self {
            overrides: Arc::new(OverrideRegistry::new()),
            extractors: Arc::new(ExtractorRegistry::new()),
            selector: Arc::new(SharedOrPooledSelector),
        }
    }
}

/// One cell's text as handed over by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFragment<'a> {
    /// Editor the text lives in.
    pub editor: EditorId,
    /// Raw text.
    pub text: &'a str,
    /// Where `text` starts inside the editor.
    pub editor_shift: EditorPosition,
}

impl<'a> SourceFragment<'a> {
    /// Fragment covering the whole editor.
    pub fn new(editor: EditorId, text: &'a str) -> Self {
        Self {
            editor,
            text,
            editor_shift: EditorPosition::default(),
        }
    }

    /// Fragment starting at `editor_shift` inside the editor.
    pub fn at(editor: EditorId, text: &'a str, editor_shift: EditorPosition) -> Self {
        Self {
            editor,
            text,
            editor_shift,
        }
    }
}

struct PreparedBlock {
    lines: Vec<String>,
    skip_inspect: Vec<Vec<String>>,
    line_origins: Vec<EditorPosition>,
    foreign_fragments: ForeignFragmentMap,
}

/// Flattened view of a cell-structured document.
#[derive(Debug)]
pub struct VirtualDocument {
    options: DocumentOptions,
    id_path: String,
    uri: String,
    standalone: bool,
    services: DocumentServices,
    cell_overrides: ReversibleSubstitutionMap,
    line_overrides: ReversibleSubstitutionMap,
    mapping: LineMapping,
    text: Rope,
    foreign: ForeignDocumentRegistry,
    disposed: bool,
}

impl VirtualDocument {
    /// Root document with no overrides and no extractors.
    pub fn new(options: DocumentOptions) -> Self {
        Self::with_services(options, DocumentServices::default())
    }

    /// Root document using `services`.
    pub fn with_services(options: DocumentOptions, services: DocumentServices) -> Self {
        let id_path = options.language.clone();
        let uri = options.path.clone();
        Self::build(options, services, id_path, uri, false)
    }

    fn build(
        options: DocumentOptions,
        services: DocumentServices,
        id_path: String,
        uri: String,
        standalone: bool,
    ) -> Self {
        let overrides = services.overrides.get(&options.language);
        let cell_overrides = overrides.map(|set| set.cell_map()).unwrap_or_default();
        let line_overrides = overrides.map(|set| set.line_map()).unwrap_or_default();
        let foreign = ForeignDocumentRegistry::new(options.foreign_document_lifetime);
        Self {
            options,
            id_path,
            uri,
            standalone,
            services,
            cell_overrides,
            line_overrides,
            mapping: LineMapping::new(),
            text: Rope::new(),
            foreign,
            disposed: false,
        }
    }

    /// Configuration of this document.
    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Language id.
    pub fn language(&self) -> &str {
        &self.options.language
    }

    /// Identifier path from the root: `python`, `python-javascript`, `python-0(javascript)`.
    pub fn id_path(&self) -> &str {
        &self.id_path
    }

    /// URI presented to the language server.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether this is a standalone foreign document.
    pub fn standalone(&self) -> bool {
        self.standalone
    }

    /// Returns `true` once [`VirtualDocument::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The flattened text.
    pub fn value(&self) -> String {
        self.text.to_string()
    }

    /// Number of lines of [`VirtualDocument::value`].
    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Text of virtual line `line`, without its line break.
    pub fn virtual_line_text(&self, line: usize) -> Option<String> {
        if line >= self.text.len_lines() {
            return None;
        }
        let mut text = self.text.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        Some(text)
    }

    /// Next virtual line to be written (separators included).
    pub fn last_virtual_line(&self) -> usize {
        self.mapping.virtual_line_count()
    }

    /// Next source line to be written.
    pub fn last_source_line(&self) -> usize {
        self.mapping.source_line_count()
    }

    /// The line indexes of the current pass.
    pub fn mapping(&self) -> &LineMapping {
        &self.mapping
    }

    /// Record of virtual line `line`.
    pub fn virtual_line(&self, line: usize) -> Option<&VirtualLineRecord> {
        self.mapping.virtual_line(line)
    }

    /// Record of source line `line`.
    pub fn source_line(&self, line: usize) -> Option<&SourceLineRecord> {
        self.mapping.source_line(line)
    }

    /// Registry of the foreign documents owned by this document.
    pub fn foreign_documents(&self) -> &ForeignDocumentRegistry {
        &self.foreign
    }

    /// Foreign document `id`.
    pub fn foreign_document(&self, id: ForeignDocumentId) -> Option<&VirtualDocument> {
        self.foreign.get(id).map(ForeignDocumentHandle::document)
    }

    /// Nested foreign document reached by following `path` from this document.
    pub fn foreign_document_at_path(&self, path: &[ForeignDocumentId]) -> Option<&VirtualDocument> {
        path.iter()
            .try_fold(self, |document, id| document.foreign_document(*id))
    }

    /// Begin a composition pass.
    ///
    /// Forgets all lines (here and in every foreign document), marks every foreign document
    /// unused and returns standalone documents to the reuse pool.
    pub fn clear(&mut self) {
        for handle in self.foreign.iter_mut() {
            handle.document_mut().clear();
        }
        self.foreign.begin_pass();
        self.mapping.clear();
        self.text = Rope::new();
    }

    /// Run a full composition pass over `fragments`.
    pub fn rebuild<'a>(&mut self, fragments: impl IntoIterator<Item = SourceFragment<'a>>) {
        if self.disposed {
            warn!(uri = %self.uri, "cannot rebuild virtual document: document disposed");
            return;
        }
        self.clear();
        for fragment in fragments {
            self.append(&fragment, None);
        }
        self.close_expired_documents();
    }

    /// Append one fragment.
    ///
    /// `virtual_shift` is the part of the virtual text that precedes `fragment.editor_shift`
    /// (used when the fragment text starts before its true editor origin).
    pub fn append(&mut self, fragment: &SourceFragment<'_>, virtual_shift: Option<EditorPosition>) {
        if self.disposed {
            warn!(uri = %self.uri, "cannot append code block: document disposed");
            return;
        }

        let source_line_count = fragment.text.split('\n').count();
        let prepared = self.prepare_code_block(fragment);

        let mut block_text = prepared.lines.join("\n");
        block_text.push('\n');

        let block = TransformedBlock {
            editor: fragment.editor,
            lines: prepared.lines,
            skip_inspect: prepared.skip_inspect,
            line_origins: prepared.line_origins,
            source_line_count,
            editor_shift: fragment.editor_shift,
            virtual_shift: virtual_shift.unwrap_or_default(),
            foreign_fragments: Arc::new(prepared.foreign_fragments),
        };
        let blank_lines = self.options.blank_lines_between_cells;
        let separator_skip = [self.id_path.clone()];
        let span = self.mapping.append_block(&block, blank_lines, &separator_skip);

        if span.first_virtual_line > 0 {
            let end = self.text.len_chars();
            self.text.insert(end, &"\n".repeat(blank_lines));
        }
        let end = self.text.len_chars();
        self.text.insert(end, &block_text);

        trace!(
            uri = %self.uri,
            editor = fragment.editor.get(),
            first_virtual_line = span.first_virtual_line,
            virtual_lines = span.virtual_line_count,
            source_lines = span.source_line_count,
            "appended code block"
        );
    }

    fn prepare_code_block(&mut self, fragment: &SourceFragment<'_>) -> PreparedBlock {
        let (host, foreign_fragments) = self.extract_foreign_code(fragment);
        let line_origins = host.line_origins();
        let cell_code = host.into_text();

        if let Some(masked) = self.cell_overrides.override_for(&cell_code) {
            let lines: Vec<String> = masked.split('\n').map(str::to_string).collect();
            let skip_inspect = vec![vec![self.id_path.clone()]; lines.len()];
            return PreparedBlock {
                lines,
                skip_inspect,
                line_origins,
                foreign_fragments,
            };
        }

        let raw_lines: Vec<&str> = cell_code.split('\n').collect();
        let result = self.line_overrides.replace_all(&raw_lines);
        let skip_inspect = result
            .applied
            .iter()
            .map(|&applied| {
                if applied {
                    vec![self.id_path.clone()]
                } else {
                    Vec::new()
                }
            })
            .collect();
        PreparedBlock {
            lines: result.lines,
            skip_inspect,
            line_origins,
            foreign_fragments,
        }
    }

    /// Run every extractor of the document language in turn. Ranges and origins are stored in
    /// fragment coordinates, whatever earlier extractors removed.
    fn extract_foreign_code<'a>(
        &mut self,
        fragment: &SourceFragment<'a>,
    ) -> (HostCode<'a>, ForeignFragmentMap) {
        let mut foreign_fragments = ForeignFragmentMap::new();
        let mut host = HostCode::new(fragment.text);
        let extractors = Arc::clone(&self.services.extractors);

        for extractor in extractors.for_language(&self.options.language) {
            if !extractor.has_foreign_code(host.text()) {
                continue;
            }
            let extracts = extractor.extract_foreign_code(host.text());
            for extracted in &extracts {
                if let (Some(foreign_code), Some(range), Some(origin)) = (
                    extracted.foreign_code.as_deref(),
                    extracted.range,
                    extracted.foreign_origin(),
                ) {
                    let range = host.range_to_fragment(range);
                    let origin = host.to_fragment(origin);
                    let id = self.choose_foreign_document(extractor.as_ref());
                    if let Some(handle) = self.foreign.get_mut(id) {
                        let document = handle.document_mut();
                        let virtual_line = document.last_virtual_line();
                        let source_line = document.last_source_line();
                        let shift = fragment.editor_shift.offset_by(origin);
                        let excerpt = SourceFragment::at(fragment.editor, foreign_code, shift);
                        document.append(&excerpt, None);
                        foreign_fragments.insert(
                            range,
                            ForeignFragment {
                                document: id,
                                editor: fragment.editor,
                                virtual_line,
                                source_line,
                                origin,
                            },
                        );
                    }
                }
            }
            host = host.keep(&extracts);
        }

        (host, foreign_fragments)
    }

    fn choose_foreign_document(
        &mut self,
        extractor: &dyn ForeignCodeExtractor,
    ) -> ForeignDocumentId {
        let request = ForeignDocumentRequest {
            language: extractor.language(),
            standalone: extractor.standalone(),
            file_extension: extractor.file_extension(),
        };
        let selector = Arc::clone(&self.services.selector);
        let id = match selector.select(&mut self.foreign, &request) {
            ForeignSelection::Reuse(id) if self.foreign.contains(id) => {
                debug!(
                    uri = %self.uri,
                    language = request.language,
                    id = id.get(),
                    "reusing foreign document"
                );
                id
            }
            _ => self.open_foreign(request.language, request.standalone, request.file_extension),
        };
        self.foreign.touch(id);
        id
    }

    fn open_foreign(
        &mut self,
        language: &str,
        standalone: bool,
        file_extension: &str,
    ) -> ForeignDocumentId {
        let mut options = DocumentOptions::new(language, self.options.path.clone());
        options.file_extension = file_extension.to_string();
        options.blank_lines_between_cells = self.options.blank_lines_between_cells;
        options.foreign_document_lifetime = self.options.foreign_document_lifetime;

        let services = self.services.clone();
        let parent_id_path = self.id_path.clone();
        let path = self.options.path.clone();
        let id = self.foreign.open(language, standalone, file_extension, |virtual_id| {
            let id_path = format!("{parent_id_path}-{virtual_id}");
            let uri = format!("{path}.{id_path}.{file_extension}");
            VirtualDocument::build(options, services, id_path, uri, standalone)
        });
        debug!(uri = %self.uri, language, standalone, id = id.get(), "opened foreign document");
        id
    }

    /// Dispose foreign documents left unreferenced for their whole lifetime.
    ///
    /// Run once per composition pass, after every fragment was appended; recurses into the
    /// surviving foreign documents.
    pub fn close_expired_documents(&mut self) {
        if self.disposed {
            return;
        }
        let used: HashSet<ForeignDocumentId> = self
            .mapping
            .source_lines()
            .iter()
            .flat_map(|record| record.foreign_fragments.values().map(|fragment| fragment.document))
            .collect();

        for handle in self.foreign.expire(&used) {
            debug!(
                uri = %self.uri,
                foreign = handle.virtual_id(),
                "closing expired foreign document"
            );
            handle.into_document().dispose();
        }

        for handle in self.foreign.iter_mut() {
            handle.document_mut().close_expired_documents();
        }
    }

    /// Close one foreign document now.
    pub fn close_foreign(&mut self, id: ForeignDocumentId) {
        if let Some(handle) = self.foreign.remove(id) {
            handle.into_document().dispose();
        }
    }

    /// Close every foreign document now.
    pub fn close_all_foreign_documents(&mut self) {
        for handle in self.foreign.drain() {
            handle.into_document().dispose();
        }
    }

    /// Release the document and every foreign document it owns.
    ///
    /// Idempotent; afterwards mutations are no-ops and lookups find nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.close_all_foreign_documents();
        self.mapping.clear();
        self.text = Rope::new();
    }

    /// Recover the host text of a block produced by this document (inverse of the overrides).
    pub fn decode_code_block(&self, raw_code: &str) -> String {
        if let Some(original) = self.cell_overrides.reverse_override_for(raw_code) {
            return original;
        }
        let lines: Vec<&str> = raw_code.split('\n').collect();
        self.line_overrides.reverse_replace_all(&lines).join("\n")
    }

    /// Distinct foreign excerpt maps of the fragments contributed by `editor`.
    pub fn get_foreign_documents(&self, editor: EditorId) -> Vec<Arc<ForeignFragmentMap>> {
        let mut maps: Vec<Arc<ForeignFragmentMap>> = Vec::new();
        for record in self.mapping.source_lines() {
            if record.editor == editor
                && !maps
                    .iter()
                    .any(|known| Arc::ptr_eq(known, &record.foreign_fragments))
            {
                maps.push(Arc::clone(&record.foreign_fragments));
            }
        }
        maps
    }

    /// Editor owning virtual line `line`.
    pub fn editor_at_virtual_line(&self, line: usize) -> Option<EditorId> {
        self.mapping.virtual_line(line).map(|record| record.editor)
    }

    /// Editor owning source line `line`.
    pub fn editor_at_source_line(&self, line: usize) -> Option<EditorId> {
        self.mapping.source_line(line).map(|record| record.editor)
    }

    /// Source position shown at `position`; `None` for synthetic or unknown lines.
    pub fn transform_virtual_to_source(&self, position: VirtualPosition) -> Option<SourcePosition> {
        let record = self.mapping.virtual_line(position.line)?;
        let line = record.source_line?;
        Some(SourcePosition::new(line, position.column.saturating_add(record.source_column)))
    }

    /// Editor position of a source position.
    pub fn transform_source_to_editor(&self, position: SourcePosition) -> Option<EditorPosition> {
        self.mapping
            .source_line(position.line)
            .map(|record| record.to_editor(position.column))
    }

    /// Editor position shown at `position`.
    pub fn transform_virtual_to_editor(
        &self,
        position: VirtualPosition,
    ) -> Result<Option<EditorPosition>, MappingError> {
        let Some(source) = self.transform_virtual_to_source(position) else {
            return Ok(None);
        };
        match self.transform_source_to_editor(source) {
            Some(editor_position) => Ok(Some(editor_position)),
            None => Err(MappingError::MissingSourceLine {
                virtual_line: position.line,
                source_line: source.line,
            }),
        }
    }

    /// Virtual position showing `position` of `editor`.
    pub fn transform_editor_to_virtual(
        &self,
        editor: EditorId,
        position: EditorPosition,
    ) -> Option<VirtualPosition> {
        let source = self.mapping.editor_to_source(editor, position)?;
        self.source_to_virtual(source)
    }

    /// Virtual position showing source position `position`; `None` if the text there was
    /// removed from this document.
    fn source_to_virtual(&self, position: SourcePosition) -> Option<VirtualPosition> {
        let line = self.mapping.source_line(position.line)?.virtual_line?;
        let record = self.mapping.virtual_line(line)?;
        let column = position.column.checked_sub(record.source_column)?;
        Some(VirtualPosition::new(line, column))
    }

    /// Root position shown at `position`, translated through `root`.
    pub fn transform_virtual_to_root(
        &self,
        position: VirtualPosition,
        root: &dyn RootMapper,
    ) -> Result<Option<RootPosition>, MappingError> {
        let Some(record) = self.mapping.virtual_line(position.line) else {
            return Ok(None);
        };
        let editor = record.editor;
        match self.transform_virtual_to_editor(position)? {
            Some(editor_position) => root.editor_to_root(editor, editor_position),
            None => Ok(None),
        }
    }

    /// Root position shown at `position` of the foreign document reached through `path`,
    /// using this document as the root mapper.
    pub fn transform_foreign_virtual_to_root(
        &self,
        path: &[ForeignDocumentId],
        position: VirtualPosition,
    ) -> Result<Option<RootPosition>, MappingError> {
        match self.foreign_document_at_path(path) {
            Some(document) => document.transform_virtual_to_root(position, self),
            None => Ok(None),
        }
    }

    /// Cell editor and editor position at root position `position` (root documents only).
    pub fn transform_root_to_editor(
        &self,
        position: RootPosition,
    ) -> Option<(EditorId, EditorPosition)> {
        let record = self.mapping.source_line(position.line)?;
        Some((record.editor, record.to_editor(position.column)))
    }

    fn foreign_at(&self, position: SourcePosition) -> Option<(&VirtualDocument, SourcePosition)> {
        let record = self.mapping.source_line(position.line)?;
        let editor_position = EditorPosition::new(record.editor_line, position.column);
        // Text of the match before the foreign code (a `%%javascript` header) stays in the host.
        let (_, fragment) = record.foreign_fragments.iter().find(|(range, fragment)| {
            range.contains(editor_position) && editor_position >= fragment.origin
        })?;
        let document = self.foreign_document(fragment.document)?;
        let inner = if editor_position.line <= fragment.origin.line {
            SourcePosition::new(
                fragment.source_line,
                editor_position.column.saturating_sub(fragment.origin.column),
            )
        } else {
            SourcePosition::new(
                fragment
                    .source_line
                    .saturating_add(editor_position.line - fragment.origin.line),
                editor_position.column,
            )
        };
        Some((document, inner))
    }

    /// Innermost document holding the code at `position`.
    pub fn document_at_source_position(&self, position: SourcePosition) -> &VirtualDocument {
        match self.foreign_at(position) {
            Some((document, inner)) => document.document_at_source_position(inner),
            None => self,
        }
    }

    /// Returns `true` if `position` falls inside extracted foreign code.
    pub fn is_within_foreign(&self, position: SourcePosition) -> bool {
        self.foreign_at(position).is_some()
    }

    /// Virtual position of `position` inside the innermost document holding it.
    pub fn virtual_position_at_document(
        &self,
        position: SourcePosition,
    ) -> Option<VirtualPosition> {
        if let Some((document, inner)) = self.foreign_at(position) {
            return document.virtual_position_at_document(inner);
        }
        self.source_to_virtual(position)
    }
}

impl RootMapper for VirtualDocument {
    fn editor_to_root(
        &self,
        editor: EditorId,
        position: EditorPosition,
    ) -> Result<Option<RootPosition>, MappingError> {
        if !self.mapping.contains_editor(editor) {
            return Err(MappingError::EditorNotMapped(editor));
        }
        let root = self
            .mapping
            .editor_to_source(editor, position)
            .map(|source| RootPosition::new(source.line, source.column));
        if root.is_none() {
            warn!(
                uri = %self.uri,
                editor = editor.get(),
                %position,
                "editor position outside root mapping"
            );
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> VirtualDocument {
        VirtualDocument::new(DocumentOptions::new("python", "nb.ipynb"))
    }

    #[test]
    fn test_value_joins_blocks_with_padding() {
        let mut doc = python();
        doc.append(&SourceFragment::new(EditorId::new(1), "a = 1\nb = 2"), None);
        doc.append(&SourceFragment::new(EditorId::new(2), "c = 3"), None);
        assert_eq!(doc.value(), "a = 1\nb = 2\n\n\nc = 3\n");
        assert_eq!(doc.last_virtual_line(), 7);
        assert_eq!(doc.last_source_line(), 3);
        assert_eq!(doc.virtual_line_text(4).as_deref(), Some("c = 3"));
        assert_eq!(doc.virtual_line_text(2).as_deref(), Some(""));
    }

    #[test]
    fn test_append_after_dispose_is_noop() {
        let mut doc = python();
        doc.append(&SourceFragment::new(EditorId::new(1), "x"), None);
        doc.dispose();
        doc.dispose();
        assert!(doc.is_disposed());
        doc.append(&SourceFragment::new(EditorId::new(1), "y"), None);
        assert_eq!(doc.value(), "");
        assert_eq!(doc.last_virtual_line(), 0);
        assert_eq!(doc.transform_virtual_to_source(VirtualPosition::new(0, 0)), None);
    }

    #[test]
    fn test_virtual_shift_moves_editor_origin_back() {
        let mut doc = python();
        let fragment = SourceFragment::at(EditorId::new(1), "abc\ndef", EditorPosition::new(2, 5));
        doc.append(&fragment, Some(EditorPosition::new(1, 3)));
        assert_eq!(
            doc.transform_virtual_to_editor(VirtualPosition::new(0, 4)).unwrap(),
            Some(EditorPosition::new(1, 6))
        );
        assert_eq!(
            doc.transform_virtual_to_editor(VirtualPosition::new(1, 2)).unwrap(),
            Some(EditorPosition::new(2, 2))
        );
    }

    #[test]
    fn test_unknown_editor_is_a_contract_violation() {
        let mut doc = python();
        doc.append(&SourceFragment::new(EditorId::new(1), "x"), None);
        assert_eq!(
            doc.editor_to_root(EditorId::new(7), EditorPosition::new(0, 0)),
            Err(MappingError::EditorNotMapped(EditorId::new(7)))
        );
        assert_eq!(
            doc.editor_to_root(EditorId::new(1), EditorPosition::new(0, 1)),
            Ok(Some(RootPosition::new(0, 1)))
        );
    }
}
