//! Process-wide string interning.
//!
//! Strings in the source language (identifiers and the language's own
//! `string` literals) compare by pointer identity in generated code — see
//! §4.5 of the design. [`Interner`] is the one place that decision is made:
//! every string that reaches the AST or a trace value goes through it, and
//! equal text always yields the same [`Symbol`].

use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// An interned string. Cheap to copy, compares by the interned index, not
/// by content — two `Symbol`s are equal iff they came from equal text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl Symbol {
    /// The raw interned index, for callers that need a stable numeric tag
    /// (e.g. mangled global names for string constants).
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Default)]
pub struct Interner {
    strings: RefCell<Vec<Rc<str>>>,
    lookup: RefCell<HashMap<Rc<str>, Symbol>>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Interner::default()
    }

    /// Intern `text`, returning the existing `Symbol` if this text was
    /// already seen, or allocating a fresh one otherwise.
    pub fn intern(&self, text: &str) -> Symbol {
        if let Some(sym) = self.lookup.borrow().get(text) {
            return *sym;
        }
        let rc: Rc<str> = Rc::from(text);
        let mut strings = self.strings.borrow_mut();
        let sym = Symbol(u32::try_from(strings.len()).expect("string table overflow"));
        strings.push(Rc::clone(&rc));
        self.lookup.borrow_mut().insert(rc, sym);
        sym
    }

    /// Resolve a `Symbol` back to its text.
    ///
    /// # Panics
    /// Panics if `sym` was not produced by this interner.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Rc<str> {
        Rc::clone(&self.strings.borrow()[sym.0 as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_text_interns_to_the_same_symbol() {
        let interner = Interner::new();
        let a = interner.intern("__time__");
        let b = interner.intern("__time__");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_text_interns_to_distinct_symbols() {
        let interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = Interner::new();
        let sym = interner.intern("prop_0");
        assert_eq!(&*interner.resolve(sym), "prop_0");
    }
}
