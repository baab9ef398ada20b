#![warn(missing_docs)]
//! vdoc-core - Virtual Document Engine for Cell-Structured Documents
//!
//! # Overview
//!
//! Language servers understand one file at a time. A notebook is a sequence of cells, some of
//! them written in IPython dialect, some embedding code in other languages. `vdoc-core` folds
//! such a document into a single flat text per language (the *virtual document*) and keeps the
//! bookkeeping needed to translate positions back and forth.
//!
//! # Pipeline
//!
//! ```text
//! cell text ──► foreign code extraction ──► nested foreign documents
//!     │
//!     ▼
//! cell overrides ──► line overrides ──► line mapping ──► flattened text (+ blank separators)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vdoc_core::{
//!     DocumentOptions, DocumentServices, EditorId, EditorPosition, OverrideRegistry,
//!     SourceFragment, VirtualDocument, VirtualPosition, ipython_overrides,
//! };
//!
//! let mut overrides = OverrideRegistry::new();
//! overrides.extend("python", ipython_overrides().unwrap());
//! let services = DocumentServices {
//!     overrides: Arc::new(overrides),
//!     ..DocumentServices::default()
//! };
//! let mut doc =
//!     VirtualDocument::with_services(DocumentOptions::new("python", "nb.ipynb"), services);
//!
//! doc.rebuild([
//!     SourceFragment::new(EditorId::new(1), "import os"),
//!     SourceFragment::new(EditorId::new(2), "!ls\nx = 1"),
//! ]);
//!
//! assert_eq!(
//!     doc.value(),
//!     "import os\n\n\nget_ipython().getoutput(\"ls\")\nx = 1\n"
//! );
//! assert_eq!(
//!     doc.transform_virtual_to_editor(VirtualPosition::new(4, 2)).unwrap(),
//!     Some(EditorPosition::new(1, 2))
//! );
//! assert_eq!(
//!     doc.decode_code_block("get_ipython().getoutput(\"ls\")\nx = 1"),
//!     "!ls\nx = 1"
//! );
//! ```
//!
//! # Module Description
//!
//! - [`position`] - typed coordinate spaces (editor, source, virtual, root)
//! - [`overrides`] - reversible substitution maps for magic syntax
//! - [`ipython`] - the built-in IPython rule set
//! - [`extractor`] - foreign code extraction
//! - [`line_mapping`] - virtual/source line indexes
//! - [`foreign`] - foreign document registry and allocation policy
//! - [`document`] - the virtual document and its translation API

pub mod document;
pub mod extractor;
pub mod foreign;
pub mod ipython;
pub mod line_mapping;
pub mod overrides;
pub mod position;

pub use document::{
    DocumentOptions, DocumentServices, MappingError, RootMapper, SourceFragment, VirtualDocument,
};
pub use extractor::{
    ExtractedCode, ExtractorError, ExtractorRegistry, ForeignCodeExtractor,
    RegexForeignCodeExtractor,
};
pub use foreign::{
    DEFAULT_FOREIGN_DOCUMENT_LIFETIME, ForeignDocumentHandle, ForeignDocumentId,
    ForeignDocumentRegistry, ForeignDocumentRequest, ForeignDocumentSelector, ForeignSelection,
    SharedOrPooledSelector,
};
pub use ipython::{IPYTHON_LANGUAGE, ipython_overrides};
pub use line_mapping::{
    BlockSpan, ForeignFragment, ForeignFragmentMap, LineMapping, SourceLineRecord,
    TransformedBlock, VirtualLineRecord,
};
pub use overrides::{
    OverrideError, OverrideRegistry, OverrideSet, ReplaceAllResult, ReplacerFn, Replacement,
    ReversibleRule, ReversibleSubstitutionMap, SubstitutionMap, SubstitutionRule,
};
pub use position::{
    EditorId, EditorPosition, EditorRange, RootPosition, SourcePosition, VirtualPosition,
};
