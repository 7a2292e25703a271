//! Source positions for error reporting and IR function naming.

/// A single row/column location in the source text, 1-indexed to match the
/// front-end's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RowCol {
    pub row: u32,
    pub col: u32,
}

impl RowCol {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        RowCol { row, col }
    }
}

impl std::fmt::Display for RowCol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// A begin/end span attached to an AST node.
///
/// Two nodes built from equal constructor arguments share identity in the
/// factory regardless of position — position is metadata stamped onto the
/// canonical node after lookup, never part of the hash-consing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SourcePos {
    pub begin: RowCol,
    pub end: RowCol,
}

impl SourcePos {
    #[must_use]
    pub fn new(begin: RowCol, end: RowCol) -> Self {
        SourcePos { begin, end }
    }

    /// Placeholder position for synthesized nodes that have no source text
    /// of their own (rewrite-introduced binders, desugared operators).
    #[must_use]
    pub fn synthetic() -> Self {
        SourcePos::default()
    }

    /// The name the code generator exports the function for this position
    /// under: `"r1:c1 .. r2:c2"`.
    #[must_use]
    pub fn function_name(&self) -> String {
        format!("{} .. {}", self.begin, self.end)
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.function_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_name_matches_external_interface_format() {
        let pos = SourcePos::new(RowCol::new(1, 2), RowCol::new(3, 4));
        assert_eq!(pos.function_name(), "1:2 .. 3:4");
    }

    #[test]
    fn synthetic_position_is_zeroed() {
        let pos = SourcePos::synthetic();
        assert_eq!(pos.begin, RowCol::default());
        assert_eq!(pos.end, RowCol::default());
    }
}
