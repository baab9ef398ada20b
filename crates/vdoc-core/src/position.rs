//! Coordinate spaces.
//!
//! A notebook composed into a virtual document has four coordinate spaces, and mixing them up
//! is the classic bug of this kind of layer. Each space therefore gets its own position type:
//!
//! - [`EditorPosition`]: inside one cell editor.
//! - [`SourcePosition`]: inside the concatenated source lines fed to one
//!   [`crate::VirtualDocument`].
//! - [`VirtualPosition`]: inside the flattened text shown to the language server.
//! - [`RootPosition`]: inside the whole host document, as seen by the top-level composition.
//!
//! All of them are zero-based; columns count Unicode scalar values (`char`).

use std::cmp::Ordering;
use std::fmt;

macro_rules! position_space {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            /// Zero-based line index.
            pub line: usize,
            /// Zero-based column in characters.
            pub column: usize,
        }

        impl $name {
            /// Create a new position.
            pub const fn new(line: usize, column: usize) -> Self {
                Self { line, column }
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.line
                    .cmp(&other.line)
                    .then_with(|| self.column.cmp(&other.column))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.line, self.column)
            }
        }
    };
}

position_space!(
    /// Position inside a single cell editor.
    EditorPosition
);
position_space!(
    /// Position inside the source lines appended to one virtual document.
    SourcePosition
);
position_space!(
    /// Position inside the flattened virtual document text.
    VirtualPosition
);
position_space!(
    /// Position inside the whole host document.
    RootPosition
);

impl EditorPosition {
    /// Position reached by moving `offset` away from `self`.
    ///
    /// `offset` is relative: if it stays on the first line its column adds to ours, otherwise
    /// its column is already absolute on the target line.
    pub fn offset_by(self, offset: EditorPosition) -> EditorPosition {
        if offset.line == 0 {
            EditorPosition::new(self.line, self.column.saturating_add(offset.column))
        } else {
            EditorPosition::new(self.line.saturating_add(offset.line), offset.column)
        }
    }

    /// Position just past the last character of `text`.
    pub fn end_of(text: &str) -> EditorPosition {
        Self::at_char_offset(text, usize::MAX)
    }

    /// Position of the character at `char_offset` in `text`, or the end of `text`.
    pub fn at_char_offset(text: &str, char_offset: usize) -> EditorPosition {
        let mut line = 0;
        let mut column = 0;
        for ch in text.chars().take(char_offset) {
            if ch == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        EditorPosition::new(line, column)
    }
}

/// Opaque handle of one cell editor, owned by the host.
///
/// The core only uses it as a map key and hands it back to the root mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditorId(u64);

impl EditorId {
    /// Wrap a host-chosen identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A half-open range (`start..end`) inside one cell editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditorRange {
    /// Inclusive start.
    pub start: EditorPosition,
    /// Exclusive end.
    pub end: EditorPosition,
}

impl EditorRange {
    /// Create a new range.
    pub fn new(start: EditorPosition, end: EditorPosition) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `position` lies inside the range.
    ///
    /// The end is treated as inclusive so that a caret placed right after the last character
    /// of an excerpt still belongs to it.
    pub fn contains(&self, position: EditorPosition) -> bool {
        self.start <= position && position <= self.end
    }
}
