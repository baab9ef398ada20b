//! Line-level mapping between a virtual document and the fragments composed into it.
//!
//! Two parallel indexes are maintained while fragments are appended:
//!
//! - virtual line -> [`VirtualLineRecord`] (owning editor, source line or `None` for synthetic
//!   lines, skip-inspection marks)
//! - source line -> [`SourceLineRecord`] (owning editor, line inside that editor, shifts back
//!   to true editor coordinates, foreign excerpts rooted in the fragment)
//!
//! Both are plain vectors indexed by line number, so line lookups are O(1) and the virtual
//! line numbers are contiguous from 0 by construction. The mapping is rebuilt wholesale on
//! every composition pass ([`LineMapping::clear`]) and extended by [`LineMapping::append_block`].

use crate::foreign::ForeignDocumentId;
use crate::position::{EditorId, EditorPosition, EditorRange, SourcePosition};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Where one foreign excerpt of a fragment went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignFragment {
    /// Foreign document holding the excerpt.
    pub document: ForeignDocumentId,
    /// Cell editor the excerpt was taken from.
    pub editor: EditorId,
    /// First virtual line of the excerpt inside the foreign document.
    pub virtual_line: usize,
    /// First source line of the excerpt inside the foreign document.
    pub source_line: usize,
    /// Position of the excerpt's first character, relative to the fragment text.
    pub origin: EditorPosition,
}

/// Foreign excerpts of one fragment, keyed by their range inside the fragment text.
pub type ForeignFragmentMap = BTreeMap<EditorRange, ForeignFragment>;

/// One line of the flattened document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualLineRecord {
    /// Editor the line belongs to.
    pub editor: EditorId,
    /// Source line the text came from; `None` for separator/padding lines.
    pub source_line: Option<usize>,
    /// Column of the line's first character inside `source_line`; non-zero when the start of
    /// that source line was extracted away.
    pub source_column: usize,
    /// Id paths of the documents whose consumers should ignore this line.
    pub skip_inspect: Vec<String>,
}

impl VirtualLineRecord {
    /// Returns `true` if the line was synthesised rather than copied from a fragment.
    pub fn is_synthetic(&self) -> bool {
        self.source_line.is_none()
    }
}

/// One line of a fragment as it was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLineRecord {
    /// Editor the line belongs to.
    pub editor: EditorId,
    /// Line index inside the fragment.
    pub editor_line: usize,
    /// Where the fragment starts inside its editor.
    pub editor_shift: EditorPosition,
    /// Portion of the virtual text that precedes `editor_shift`.
    pub virtual_shift: EditorPosition,
    /// Virtual line showing this source line, if the transformed block kept one for it.
    pub virtual_line: Option<usize>,
    /// Foreign excerpts of the fragment this line belongs to (shared by all its lines).
    pub foreign_fragments: Arc<ForeignFragmentMap>,
}

impl SourceLineRecord {
    /// True editor position of `column` on this line.
    pub fn to_editor(&self, column: usize) -> EditorPosition {
        let line = self
            .editor_line
            .saturating_add(self.editor_shift.line)
            .saturating_sub(self.virtual_shift.line);
        let column = if self.editor_line == 0 {
            column
                .saturating_add(self.editor_shift.column)
                .saturating_sub(self.virtual_shift.column)
        } else {
            column
        };
        EditorPosition::new(line, column)
    }

    /// Inverse of [`SourceLineRecord::to_editor`] for the column; `None` if the column lies
    /// before the fragment start.
    pub fn from_editor_column(&self, column: usize) -> Option<usize> {
        if self.editor_line == 0 {
            column
                .saturating_add(self.virtual_shift.column)
                .checked_sub(self.editor_shift.column)
        } else {
            Some(column)
        }
    }
}

/// Contiguous run of lines produced by one appended fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// Owning editor.
    pub editor: EditorId,
    /// First source line.
    pub first_source_line: usize,
    /// Number of source lines (pre-override).
    pub source_line_count: usize,
    /// First virtual line.
    pub first_virtual_line: usize,
    /// Number of transformed lines, separators excluded.
    pub virtual_line_count: usize,
}

/// A fragment after extraction and overrides, ready to be indexed.
#[derive(Debug, Clone)]
pub struct TransformedBlock {
    /// Owning editor.
    pub editor: EditorId,
    /// Transformed lines, as shown in the virtual document.
    pub lines: Vec<String>,
    /// Skip-inspection marks, one entry per transformed line.
    pub skip_inspect: Vec<Vec<String>>,
    /// Fragment position of the first character of each transformed line. Lines past the end
    /// (an override that added lines) have no source.
    pub line_origins: Vec<EditorPosition>,
    /// Number of lines of the original fragment text.
    pub source_line_count: usize,
    /// Where the fragment starts inside its editor.
    pub editor_shift: EditorPosition,
    /// Portion of the virtual text that precedes `editor_shift`.
    pub virtual_shift: EditorPosition,
    /// Foreign excerpts of the fragment.
    pub foreign_fragments: Arc<ForeignFragmentMap>,
}

/// Virtual-line and source-line indexes of one document.
#[derive(Debug, Clone, Default)]
pub struct LineMapping {
    virtual_lines: Vec<VirtualLineRecord>,
    source_lines: Vec<SourceLineRecord>,
    blocks: Vec<BlockSpan>,
    editor_blocks: HashMap<EditorId, Vec<usize>>,
}

impl LineMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every line (start of a new composition pass).
    pub fn clear(&mut self) {
        self.virtual_lines.clear();
        self.source_lines.clear();
        self.blocks.clear();
        self.editor_blocks.clear();
    }

    /// Index the lines of `block`, followed by `blank_lines` separator lines marked with
    /// `separator_skip`.
    pub fn append_block(
        &mut self,
        block: &TransformedBlock,
        blank_lines: usize,
        separator_skip: &[String],
    ) -> BlockSpan {
        let first_virtual_line = self.virtual_lines.len();
        let first_source_line = self.source_lines.len();
        let span = BlockSpan {
            editor: block.editor,
            first_source_line,
            source_line_count: block.source_line_count,
            first_virtual_line,
            virtual_line_count: block.lines.len(),
        };

        // Source lines whose text was removed (extracted, or swallowed by an override) keep no
        // virtual line; when several virtual lines share a source line the first one wins.
        let mut shown_at = vec![None; block.source_line_count];
        for i in 0..block.lines.len() {
            let origin = block
                .line_origins
                .get(i)
                .filter(|origin| origin.line < block.source_line_count);
            if let Some(origin) = origin {
                shown_at[origin.line].get_or_insert(first_virtual_line + i);
            }
            self.virtual_lines.push(VirtualLineRecord {
                editor: block.editor,
                source_line: origin.map(|origin| first_source_line + origin.line),
                source_column: origin.map_or(0, |origin| origin.column),
                skip_inspect: block.skip_inspect.get(i).cloned().unwrap_or_default(),
            });
        }

        for (i, virtual_line) in shown_at.into_iter().enumerate() {
            self.source_lines.push(SourceLineRecord {
                editor: block.editor,
                editor_line: i,
                editor_shift: block.editor_shift,
                virtual_shift: block.virtual_shift,
                virtual_line,
                foreign_fragments: Arc::clone(&block.foreign_fragments),
            });
        }

        for _ in 0..blank_lines {
            self.virtual_lines.push(VirtualLineRecord {
                editor: block.editor,
                source_line: None,
                source_column: 0,
                skip_inspect: separator_skip.to_vec(),
            });
        }

        self.editor_blocks
            .entry(block.editor)
            .or_default()
            .push(self.blocks.len());
        self.blocks.push(span);
        span
    }

    /// Number of virtual lines, separators included.
    pub fn virtual_line_count(&self) -> usize {
        self.virtual_lines.len()
    }

    /// Number of source lines.
    pub fn source_line_count(&self) -> usize {
        self.source_lines.len()
    }

    /// Record of virtual line `line`.
    pub fn virtual_line(&self, line: usize) -> Option<&VirtualLineRecord> {
        self.virtual_lines.get(line)
    }

    /// Record of source line `line`.
    pub fn source_line(&self, line: usize) -> Option<&SourceLineRecord> {
        self.source_lines.get(line)
    }

    /// All virtual line records, in order.
    pub fn virtual_lines(&self) -> &[VirtualLineRecord] {
        &self.virtual_lines
    }

    /// All source line records, in order.
    pub fn source_lines(&self) -> &[SourceLineRecord] {
        &self.source_lines
    }

    /// Blocks appended during this pass, in order.
    pub fn blocks(&self) -> &[BlockSpan] {
        &self.blocks
    }

    /// Returns `true` if `editor` contributed at least one block.
    pub fn contains_editor(&self, editor: EditorId) -> bool {
        self.editor_blocks.contains_key(&editor)
    }

    /// Blocks contributed by `editor`.
    pub fn blocks_of(&self, editor: EditorId) -> impl Iterator<Item = &BlockSpan> + '_ {
        self.editor_blocks
            .get(&editor)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.blocks.get(index))
    }

    /// Source position showing `position` of `editor`, if some block covers it.
    pub fn editor_to_source(
        &self,
        editor: EditorId,
        position: EditorPosition,
    ) -> Option<SourcePosition> {
        for block in self.blocks_of(editor) {
            let first = self.source_lines.get(block.first_source_line)?;
            let Some(offset) = position
                .line
                .saturating_add(first.virtual_shift.line)
                .checked_sub(first.editor_shift.line)
            else {
                continue;
            };
            if offset >= block.source_line_count {
                continue;
            }
            let record = &self.source_lines[block.first_source_line + offset];
            if let Some(column) = record.from_editor_column(position.column) {
                return Some(SourcePosition::new(block.first_source_line + offset, column));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(editor: u64, lines: &[&str], source_line_count: usize) -> TransformedBlock {
        TransformedBlock {
            editor: EditorId::new(editor),
            lines: lines.iter().map(|line| line.to_string()).collect(),
            skip_inspect: vec![Vec::new(); lines.len()],
            line_origins: (0..lines.len()).map(|i| EditorPosition::new(i, 0)).collect(),
            source_line_count,
            editor_shift: EditorPosition::default(),
            virtual_shift: EditorPosition::default(),
            foreign_fragments: Arc::new(ForeignFragmentMap::new()),
        }
    }

    #[test]
    fn test_blocks_are_contiguous_with_separators() {
        let mut mapping = LineMapping::new();
        let skip = vec!["python".to_string()];
        let a = mapping.append_block(&block(1, &["a", "b"], 2), 2, &skip);
        let b = mapping.append_block(&block(2, &["c"], 1), 2, &skip);

        assert_eq!(a.first_virtual_line, 0);
        assert_eq!(b.first_virtual_line, 4);
        assert_eq!(b.first_source_line, 2);
        assert_eq!(mapping.virtual_line_count(), 7);
        assert_eq!(mapping.source_line_count(), 3);

        assert_eq!(mapping.virtual_line(1).unwrap().source_line, Some(1));
        let separator = mapping.virtual_line(2).unwrap();
        assert!(separator.is_synthetic());
        assert_eq!(separator.skip_inspect, skip);
        assert_eq!(separator.editor, EditorId::new(1));
        assert_eq!(mapping.virtual_line(4).unwrap().source_line, Some(2));
        assert_eq!(mapping.source_line(2).unwrap().virtual_line, Some(4));
    }

    #[test]
    fn test_shorter_transformed_block_leaves_source_lines_unmapped() {
        let mut mapping = LineMapping::new();
        mapping.append_block(&block(1, &["masked"], 2), 0, &[]);
        assert_eq!(mapping.source_line(0).unwrap().virtual_line, Some(0));
        assert_eq!(mapping.source_line(1).unwrap().virtual_line, None);
    }

    #[test]
    fn test_removed_source_lines_are_skipped() {
        let mut mapping = LineMapping::new();
        // Fragment "a\n<<x\ny>>\nb" with the match extracted: lines 1 and 2 collapse into one.
        let mut extracted = block(1, &["a", "", "b"], 4);
        extracted.line_origins = vec![
            EditorPosition::new(0, 0),
            EditorPosition::new(2, 3),
            EditorPosition::new(3, 0),
        ];
        mapping.append_block(&extracted, 0, &[]);

        assert_eq!(mapping.virtual_line(1).unwrap().source_line, Some(2));
        assert_eq!(mapping.virtual_line(1).unwrap().source_column, 3);
        assert_eq!(mapping.virtual_line(2).unwrap().source_line, Some(3));
        assert_eq!(mapping.source_line(1).unwrap().virtual_line, None);
        assert_eq!(mapping.source_line(2).unwrap().virtual_line, Some(1));
        assert_eq!(mapping.source_line(3).unwrap().virtual_line, Some(2));
    }

    #[test]
    fn test_huge_positions_do_not_overflow() {
        let mut mapping = LineMapping::new();
        let mut shifted = block(1, &["x"], 1);
        shifted.editor_shift = EditorPosition::new(2, 4);
        mapping.append_block(&shifted, 0, &[]);

        let record = mapping.source_line(0).unwrap();
        assert_eq!(record.to_editor(usize::MAX), EditorPosition::new(2, usize::MAX));
        assert_eq!(record.from_editor_column(usize::MAX), Some(usize::MAX - 4));
        assert_eq!(
            mapping.editor_to_source(EditorId::new(1), EditorPosition::new(usize::MAX, 0)),
            None
        );
    }

    #[test]
    fn test_shifts_roundtrip_through_editor_coordinates() {
        let mut mapping = LineMapping::new();
        mapping.append_block(&block(1, &["x"], 1), 0, &[]);
        let mut shifted = block(2, &["foo", "bar"], 2);
        shifted.editor_shift = EditorPosition::new(3, 4);
        mapping.append_block(&shifted, 0, &[]);

        let record = mapping.source_line(1).unwrap();
        assert_eq!(record.to_editor(2), EditorPosition::new(3, 6));
        let record = mapping.source_line(2).unwrap();
        assert_eq!(record.to_editor(1), EditorPosition::new(4, 1));

        assert_eq!(
            mapping.editor_to_source(EditorId::new(2), EditorPosition::new(3, 6)),
            Some(SourcePosition::new(1, 2))
        );
        assert_eq!(
            mapping.editor_to_source(EditorId::new(2), EditorPosition::new(4, 1)),
            Some(SourcePosition::new(2, 1))
        );
        // Before the fragment start, or past its end.
        assert_eq!(mapping.editor_to_source(EditorId::new(2), EditorPosition::new(3, 1)), None);
        assert_eq!(mapping.editor_to_source(EditorId::new(2), EditorPosition::new(2, 0)), None);
        assert_eq!(mapping.editor_to_source(EditorId::new(2), EditorPosition::new(5, 0)), None);
        assert_eq!(mapping.editor_to_source(EditorId::new(9), EditorPosition::new(0, 0)), None);
    }
}
