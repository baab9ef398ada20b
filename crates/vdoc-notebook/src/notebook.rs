//! Cell model.
//!
//! A [`Notebook`] is an ordered list of cells, each with its own editor id, text and cursor.
//! It is deliberately small: reading text, reading/moving the cursor and tracking the active
//! cell is all the mapping layer needs from a cell editor.

use crate::NotebookError;
use vdoc_core::{EditorId, EditorPosition};

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Executable code; composed into the virtual document.
    Code,
    /// Markdown prose.
    Markdown,
    /// Raw text passed through untouched by the kernel.
    Raw,
}

/// One cell and its editor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    id: EditorId,
    kind: CellKind,
    text: String,
    cursor: EditorPosition,
}

impl Cell {
    /// Editor id of the cell.
    pub fn id(&self) -> EditorId {
        self.id
    }

    /// Cell kind.
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Cell text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Caret position inside the cell.
    pub fn cursor(&self) -> EditorPosition {
        self.cursor
    }

    /// Returns `true` for code cells.
    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    fn clamp(&self, position: EditorPosition) -> EditorPosition {
        let lines: Vec<&str> = self.text.split('\n').collect();
        let line = position.line.min(lines.len().saturating_sub(1));
        let width = lines.get(line).map_or(0, |text| text.chars().count());
        EditorPosition::new(line, position.column.min(width))
    }
}

/// Ordered cells of one notebook.
#[derive(Debug, Clone, Default)]
pub struct Notebook {
    cells: Vec<Cell>,
    next_id: u64,
    active: Option<EditorId>,
}

impl Notebook {
    /// Create an empty notebook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if there are no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Code cells in order.
    pub fn code_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }

    /// Cell `id`.
    pub fn cell(&self, id: EditorId) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.id == id)
    }

    fn cell_mut(&mut self, id: EditorId) -> Result<&mut Cell, NotebookError> {
        self.cells
            .iter_mut()
            .find(|cell| cell.id == id)
            .ok_or(NotebookError::UnknownCell(id))
    }

    fn new_cell(&mut self, kind: CellKind, text: impl Into<String>) -> Cell {
        let id = EditorId::new(self.next_id);
        self.next_id += 1;
        Cell {
            id,
            kind,
            text: text.into(),
            cursor: EditorPosition::default(),
        }
    }

    /// Append a cell and return its id.
    pub fn push_cell(&mut self, kind: CellKind, text: impl Into<String>) -> EditorId {
        let cell = self.new_cell(kind, text);
        let id = cell.id;
        self.cells.push(cell);
        id
    }

    /// Insert a cell before position `index` (`index == len()` appends).
    pub fn insert_cell(
        &mut self,
        index: usize,
        kind: CellKind,
        text: impl Into<String>,
    ) -> Result<EditorId, NotebookError> {
        if index > self.cells.len() {
            return Err(NotebookError::IndexOutOfRange {
                index,
                len: self.cells.len(),
            });
        }
        let cell = self.new_cell(kind, text);
        let id = cell.id;
        self.cells.insert(index, cell);
        Ok(id)
    }

    /// Remove cell `id`. Removing the active cell leaves no cell active.
    pub fn remove_cell(&mut self, id: EditorId) -> Result<Cell, NotebookError> {
        let index = self
            .cells
            .iter()
            .position(|cell| cell.id == id)
            .ok_or(NotebookError::UnknownCell(id))?;
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(self.cells.remove(index))
    }

    /// Text of cell `id`.
    pub fn cell_text(&self, id: EditorId) -> Option<&str> {
        self.cell(id).map(Cell::text)
    }

    /// Replace the text of cell `id`; the cursor is clamped into the new text.
    pub fn set_cell_text(
        &mut self,
        id: EditorId,
        text: impl Into<String>,
    ) -> Result<(), NotebookError> {
        let cell = self.cell_mut(id)?;
        cell.text = text.into();
        cell.cursor = cell.clamp(cell.cursor);
        Ok(())
    }

    /// Change the kind of cell `id`.
    pub fn set_cell_kind(&mut self, id: EditorId, kind: CellKind) -> Result<(), NotebookError> {
        self.cell_mut(id)?.kind = kind;
        Ok(())
    }

    /// Cursor of cell `id`.
    pub fn cursor(&self, id: EditorId) -> Option<EditorPosition> {
        self.cell(id).map(Cell::cursor)
    }

    /// Move the cursor of cell `id`, clamped into its text. Returns the clamped position.
    pub fn set_cursor(
        &mut self,
        id: EditorId,
        position: EditorPosition,
    ) -> Result<EditorPosition, NotebookError> {
        let cell = self.cell_mut(id)?;
        cell.cursor = cell.clamp(position);
        Ok(cell.cursor)
    }

    /// The cell holding keyboard focus.
    pub fn active(&self) -> Option<EditorId> {
        self.active
    }

    /// Focus cell `id`.
    pub fn set_active(&mut self, id: EditorId) -> Result<(), NotebookError> {
        if self.cell(id).is_none() {
            return Err(NotebookError::UnknownCell(id));
        }
        self.active = Some(id);
        Ok(())
    }
}
