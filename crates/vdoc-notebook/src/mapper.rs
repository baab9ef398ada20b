//! Root composition of a notebook.
//!
//! [`NotebookMapper`] owns the root [`VirtualDocument`] of a notebook. Every
//! [`NotebookMapper::update`] runs one full composition pass over the code cells and bumps the
//! mapping version; subscribers are notified after each pass.
//!
//! Root coordinates are the lines of the code cells laid end to end, without the blank
//! separators the virtual document inserts between them.

use crate::NotebookError;
use crate::notebook::Notebook;
use std::sync::Arc;
use tracing::debug;
use vdoc_core::{
    DocumentOptions, DocumentServices, EditorId, EditorPosition, ExtractorRegistry,
    ForeignDocumentId, MappingError, OverrideRegistry, RootMapper, RootPosition, SourceFragment,
    VirtualDocument, VirtualPosition, ipython_overrides,
};
use vdoc_lang::{ExtractorsConfig, OverridesConfig};

/// Mapping change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingChange {
    /// Version before the pass.
    pub old_version: u64,
    /// Version after the pass.
    pub new_version: u64,
    /// Virtual lines of the root document, separators included.
    pub virtual_line_count: usize,
    /// Live foreign documents directly owned by the root document.
    pub foreign_document_count: usize,
}

/// Mapping change callback function type
pub type MappingChangeCallback = Box<dyn FnMut(&MappingChange) + Send>;

/// A notebook and the root virtual document composed from it.
pub struct NotebookMapper {
    notebook: Notebook,
    document: VirtualDocument,
    version: u64,
    callbacks: Vec<MappingChangeCallback>,
}

impl NotebookMapper {
    /// Create a mapper; the document stays empty until the first [`NotebookMapper::update`].
    pub fn new(notebook: Notebook, options: DocumentOptions, services: DocumentServices) -> Self {
        Self {
            notebook,
            document: VirtualDocument::with_services(options, services),
            version: 0,
            callbacks: Vec::new(),
        }
    }

    /// Mapper for an IPython notebook with the built-in magic overrides.
    pub fn ipython(notebook: Notebook, path: impl Into<String>) -> Result<Self, NotebookError> {
        let mut overrides = OverrideRegistry::new();
        overrides.extend(vdoc_core::IPYTHON_LANGUAGE, ipython_overrides()?);
        let services = DocumentServices {
            overrides: Arc::new(overrides),
            ..DocumentServices::default()
        };
        let options = DocumentOptions::new(vdoc_core::IPYTHON_LANGUAGE, path);
        Ok(Self::new(notebook, options, services))
    }

    /// Mapper whose overrides and extractors come from configuration.
    pub fn from_config(
        notebook: Notebook,
        options: DocumentOptions,
        overrides: &OverridesConfig,
        extractors: &ExtractorsConfig,
    ) -> Result<Self, NotebookError> {
        let services = DocumentServices {
            overrides: Arc::new(OverrideRegistry::from_config(overrides)?),
            extractors: Arc::new(ExtractorRegistry::from_config(extractors)?),
            ..DocumentServices::default()
        };
        Ok(Self::new(notebook, options, services))
    }

    /// The cell model.
    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// The cell model, mutably. Changes take effect at the next [`NotebookMapper::update`].
    pub fn notebook_mut(&mut self) -> &mut Notebook {
        &mut self.notebook
    }

    /// The root virtual document.
    pub fn document(&self) -> &VirtualDocument {
        &self.document
    }

    /// Number of completed composition passes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Subscribe to mapping change notifications
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&MappingChange) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Recompose the root document from the current code cells.
    pub fn update(&mut self) {
        if self.document.is_disposed() {
            return;
        }
        let fragments = self
            .notebook
            .code_cells()
            .map(|cell| SourceFragment::new(cell.id(), cell.text()));
        self.document.rebuild(fragments);

        let old_version = self.version;
        self.version += 1;
        let change = MappingChange {
            old_version,
            new_version: self.version,
            virtual_line_count: self.document.last_virtual_line(),
            foreign_document_count: self.document.foreign_documents().len(),
        };
        debug!(
            path = %self.document.options().path,
            version = self.version,
            virtual_lines = change.virtual_line_count,
            "notebook recomposed"
        );
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }

    /// Text of the root virtual document.
    pub fn value(&self) -> String {
        self.document.value()
    }

    /// Root position of the active cell's cursor.
    pub fn root_cursor(&self) -> Option<RootPosition> {
        let active = self.notebook.active()?;
        let cursor = self.notebook.cursor(active)?;
        self.editor_to_root(active, cursor)
    }

    /// Move the caret to root position `position`: the owning cell becomes active and gets its
    /// cursor moved. Returns the cell, or `None` for a stale position.
    pub fn set_root_cursor(&mut self, position: RootPosition) -> Option<EditorId> {
        let (editor, cursor) = self.editor_at(position)?;
        self.notebook.set_cursor(editor, cursor).ok()?;
        self.notebook.set_active(editor).ok()?;
        Some(editor)
    }

    /// Cell and cell position shown at root position `position`.
    pub fn editor_at(&self, position: RootPosition) -> Option<(EditorId, EditorPosition)> {
        let (editor, cursor) = self.document.transform_root_to_editor(position)?;
        self.notebook.cell(editor)?;
        Some((editor, cursor))
    }

    /// Root position of `position` inside cell `editor`; `None` if the cell is not composed.
    pub fn editor_to_root(
        &self,
        editor: EditorId,
        position: EditorPosition,
    ) -> Option<RootPosition> {
        if !self.document.mapping().contains_editor(editor) {
            return None;
        }
        self.document.editor_to_root(editor, position).ok().flatten()
    }

    /// Root position shown at `position` of the root virtual document.
    pub fn transform_virtual_to_root(
        &self,
        position: VirtualPosition,
    ) -> Result<Option<RootPosition>, MappingError> {
        self.document.transform_virtual_to_root(position, &self.document)
    }

    /// Root position shown at `position` of the foreign document reached through `path`.
    pub fn transform_foreign_virtual_to_root(
        &self,
        path: &[ForeignDocumentId],
        position: VirtualPosition,
    ) -> Result<Option<RootPosition>, MappingError> {
        self.document.transform_foreign_virtual_to_root(path, position)
    }

    /// Release the root document and its foreign documents; later updates are no-ops.
    pub fn dispose(&mut self) {
        self.document.dispose();
    }
}
