#![warn(missing_docs)]
//! vdoc-notebook - Notebook Adapter for `vdoc-core`
//!
//! # Overview
//!
//! The minimal editor surface the mapping engine needs from a notebook: cell text, cell
//! cursors, the active cell, and change notifications. [`NotebookMapper`] drives full
//! recomposition of the root [`vdoc_core::VirtualDocument`] and forwards carets between root
//! and cell coordinates.
//!
//! # Quick Start
//!
//! ```rust
//! use vdoc_core::{EditorPosition, RootPosition};
//! use vdoc_notebook::{CellKind, Notebook, NotebookMapper};
//!
//! let mut notebook = Notebook::new();
//! notebook.push_cell(CellKind::Code, "import os");
//! notebook.push_cell(CellKind::Markdown, "# Notes");
//! let cell = notebook.push_cell(CellKind::Code, "%ls\nos.getcwd()");
//!
//! let mut mapper = NotebookMapper::ipython(notebook, "analysis.ipynb").unwrap();
//! mapper.update();
//!
//! assert_eq!(
//!     mapper.value(),
//!     "import os\n\n\nget_ipython().run_line_magic(\"ls\", \"\")\nos.getcwd()\n"
//! );
//! assert_eq!(mapper.set_root_cursor(RootPosition::new(2, 3)), Some(cell));
//! assert_eq!(mapper.notebook().cursor(cell), Some(EditorPosition::new(1, 3)));
//! assert_eq!(mapper.root_cursor(), Some(RootPosition::new(2, 3)));
//! ```

mod mapper;
mod notebook;

pub use mapper::{MappingChange, MappingChangeCallback, NotebookMapper};
pub use notebook::{Cell, CellKind, Notebook};

use thiserror::Error;
use vdoc_core::{EditorId, ExtractorError, OverrideError};

/// Errors produced by the notebook adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotebookError {
    #[error("unknown cell {0:?}")]
    /// No cell has this editor id.
    UnknownCell(EditorId),

    #[error("cell index {index} out of range (notebook has {len} cells)")]
    /// Insertion index past the end of the notebook.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of cells.
        len: usize,
    },

    #[error(transparent)]
    /// An override rule failed to compile.
    Override(#[from] OverrideError),

    #[error(transparent)]
    /// An extractor failed to compile.
    Extractor(#[from] ExtractorError),
}
