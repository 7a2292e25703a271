//! The type closed sum (§3) and its hash-consed representation.

use crate::interner::Symbol;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A hash-consed type node. Two `Ty` values are equal iff they are the same
/// canonical instance — compare with `==`, never by matching on `kind()`
/// and recursing, to get the O(1) identity check the factory exists for.
#[derive(Clone)]
pub struct Ty(pub(crate) Rc<TypeKind>);

impl Ty {
    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.0
    }
}

impl PartialEq for Ty {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Ty {}

impl Hash for Ty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// A named field in a struct type, or a named variant label in an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: Symbol,
    pub ty: Ty,
}

/// The closed sum of types from §3, plus one internal type not in the
/// user-facing surface: [`TypeKind::Sample`], the "pointer-to-sample" type
/// §4.3 assigns to `context(__curr__)` and to any `@name` binder introduced
/// by the rewriter. It never appears in a declared type, only as the
/// inferred type of a context reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Int,
    Num,
    Str,
    /// Pointer-to-sample — the type of `context(__curr__)` and of any
    /// `@name` binder (§4.3). Only `.{__time__}` member access is valid on
    /// it; see [`crate::typecalc`].
    Sample,
    /// Ordered list of labels; a `member` access on an enum-typed base
    /// yields `Bool` (the discriminant-equality test), not this type.
    Enum(Rc<[Symbol]>),
    Struct(Rc<[Field]>),
    /// Element type plus fixed size `N`, or `0` meaning dynamic (§3).
    Array(Ty, u32),
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Int => write!(f, "int"),
            TypeKind::Num => write!(f, "num"),
            TypeKind::Str => write!(f, "string"),
            TypeKind::Sample => write!(f, "sample*"),
            TypeKind::Enum(labels) => write!(f, "enum<{}>", labels.len()),
            TypeKind::Struct(fields) => write!(f, "struct<{}>", fields.len()),
            TypeKind::Array(elem, 0) => write!(f, "{}[]", elem.kind()),
            TypeKind::Array(elem, n) => write!(f, "{}[{}]", elem.kind(), n),
        }
    }
}

impl TypeKind {
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeKind::Bool | TypeKind::Int | TypeKind::Num | TypeKind::Str
        )
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeKind::Int | TypeKind::Num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;

    #[test]
    fn bool_display() {
        assert_eq!(TypeKind::Bool.to_string(), "bool");
    }

    #[test]
    fn dynamic_array_display_has_no_size() {
        let f = Factory::new();
        let elem = f.ty(TypeKind::Int);
        assert_eq!(f.ty(TypeKind::Array(elem, 0)).kind().to_string(), "int[]");
    }
}
