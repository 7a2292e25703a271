//! Compiler-wide error type.
//!
//! One enum spans every pass (Module Table population, TypeCalc, Rewrite,
//! CodeGen) rather than a per-pass type with `From` glue, matching the
//! flat `CodeGenError` the teacher's codegen module carries — a front-end
//! calling into this crate only ever has to match on one error type.

use crate::pos::SourcePos;
use std::fmt;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// A type, property, or configuration constant name was declared more
    /// than once in the same Module Table.
    DuplicateDeclaration { name: String, pos: SourcePos },
    /// A `Data`/`Context`/`Member` reference named something the Module
    /// Table (or the active binder scope) has no entry for.
    UnknownName { name: String, pos: SourcePos },
    /// TypeCalc rejected an expression: operand types didn't satisfy an
    /// operator's rule (§4.3).
    TypeError { message: String, pos: SourcePos },
    /// The rewriter produced, or was asked to rewrite, a malformed tree —
    /// e.g. a bounded operator survived past the point every bounded
    /// operator must have been lowered.
    RewriteError { message: String, pos: SourcePos },
    /// Code generation could not lower an expression — typically a
    /// TypeCalc invariant that should have ruled this out upstream.
    CodeGenError { message: String, pos: SourcePos },
    /// The emitted IR module failed its own internal consistency check
    /// (every block terminated, every phi operand covers its predecessor,
    /// no use before def) before being handed back to the caller.
    VerifyError { message: String },
}

impl CompileError {
    #[must_use]
    pub fn pos(&self) -> Option<SourcePos> {
        match self {
            CompileError::DuplicateDeclaration { pos, .. }
            | CompileError::UnknownName { pos, .. }
            | CompileError::TypeError { pos, .. }
            | CompileError::RewriteError { pos, .. }
            | CompileError::CodeGenError { pos, .. } => Some(*pos),
            CompileError::VerifyError { .. } => None,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::DuplicateDeclaration { name, pos } => {
                write!(f, "{pos}: duplicate declaration of `{name}`")
            }
            CompileError::UnknownName { name, pos } => {
                write!(f, "{pos}: unknown name `{name}`")
            }
            CompileError::TypeError { message, pos } => {
                write!(f, "{pos}: type error: {message}")
            }
            CompileError::RewriteError { message, pos } => {
                write!(f, "{pos}: rewrite error: {message}")
            }
            CompileError::CodeGenError { message, pos } => {
                write!(f, "{pos}: codegen error: {message}")
            }
            CompileError::VerifyError { message } => {
                write!(f, "module verification failed: {message}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let err = CompileError::UnknownName {
            name: "foo".into(),
            pos: SourcePos::synthetic(),
        };
        let text = err.to_string();
        assert!(text.contains("foo"));
        assert!(text.contains("unknown name"));
    }

    #[test]
    fn verify_error_has_no_position() {
        let err = CompileError::VerifyError {
            message: "dangling phi".into(),
        };
        assert!(err.pos().is_none());
        assert!(err.to_string().contains("dangling phi"));
    }
}
