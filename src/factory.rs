//! The hash-consing factory (§3): one table per node family, keyed on
//! structural equality of the constructor arguments, so that two
//! `create(args)` calls with equal arguments return the same node.

use crate::ast::{Expr, ExprKind, IntervalData, TimeInterval};
use crate::interner::{Interner, Symbol};
use crate::pos::SourcePos;
use crate::types::{Ty, TypeKind};
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};

/// Owns the canonical tables for every hash-consed node family plus the
/// string interner, so a single `&Factory` is enough to build and compare
/// AST and type nodes throughout the pipeline.
#[derive(Default)]
pub struct Factory {
    interner: Interner,
    exprs: RefCell<HashMap<ExprKind, Expr>>,
    types: RefCell<HashMap<TypeKind, Ty>>,
    intervals: RefCell<HashMap<(Option<Expr>, Option<Expr>), TimeInterval>>,
    binder_counter: Cell<u32>,
}

impl Factory {
    #[must_use]
    pub fn new() -> Self {
        Factory::default()
    }

    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    #[must_use]
    pub fn intern(&self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    /// Hash-cons an expression node. `kind` is cloned only on a cache miss.
    #[must_use]
    pub fn expr(&self, kind: ExprKind) -> Expr {
        if let Some(existing) = self.exprs.borrow().get(&kind) {
            return existing.clone();
        }
        let node = Expr::new(kind.clone());
        self.exprs.borrow_mut().insert(kind, node.clone());
        node
    }

    /// Hash-cons an expression node and stamp it with a source position.
    /// Position is never part of the hash-consing key (see [`SourcePos`]),
    /// so a second `create_at` with the same `kind` but a different `pos`
    /// silently keeps the first-seen position.
    #[must_use]
    pub fn expr_at(&self, kind: ExprKind, pos: SourcePos) -> Expr {
        let node = self.expr(kind);
        if node.pos() == SourcePos::synthetic() {
            node.set_pos(pos);
        }
        node
    }

    #[must_use]
    pub fn ty(&self, kind: TypeKind) -> Ty {
        if let Some(existing) = self.types.borrow().get(&kind) {
            return existing.clone();
        }
        let node = Ty(std::rc::Rc::new(kind.clone()));
        self.types.borrow_mut().insert(kind, node.clone());
        node
    }

    #[must_use]
    pub fn interval(&self, lo: Option<Expr>, hi: Option<Expr>) -> TimeInterval {
        let key = (lo.clone(), hi.clone());
        if let Some(existing) = self.intervals.borrow().get(&key) {
            return existing.clone();
        }
        let node = TimeInterval(std::rc::Rc::new(IntervalData { lo, hi }));
        self.intervals.borrow_mut().insert(key, node.clone());
        node
    }

    /// A fresh `@starting$N` binder name, used by the rewriter when
    /// lowering a bounded temporal operator (§4.4). Distinct calls always
    /// produce distinct symbols, even if the text happens to collide with
    /// one already interned for an unrelated reason — the counter is
    /// global to the factory, not reset per rewrite.
    #[must_use]
    pub fn fresh_binder(&self) -> Symbol {
        let n = self.binder_counter.get();
        self.binder_counter.set(n + 1);
        self.interner.intern(&format!("@starting${n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_kinds_hash_cons_to_the_same_node() {
        let f = Factory::new();
        let a = f.expr(ExprKind::BoolLit(true));
        let b = f.expr(ExprKind::BoolLit(true));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_kinds_are_distinct_nodes() {
        let f = Factory::new();
        let a = f.expr(ExprKind::BoolLit(true));
        let b = f.expr(ExprKind::BoolLit(false));
        assert_ne!(a, b);
    }

    #[test]
    fn position_does_not_affect_identity() {
        let f = Factory::new();
        let pos = SourcePos::new(crate::pos::RowCol::new(1, 1), crate::pos::RowCol::new(1, 2));
        let a = f.expr_at(ExprKind::IntLit(7), pos);
        let b = f.expr(ExprKind::IntLit(7));
        assert_eq!(a, b);
        assert_eq!(b.pos(), pos);
    }

    #[test]
    fn fresh_binder_names_are_distinct() {
        let f = Factory::new();
        assert_ne!(f.fresh_binder(), f.fresh_binder());
    }

    #[test]
    fn types_hash_cons_too() {
        let f = Factory::new();
        assert_eq!(f.ty(TypeKind::Bool), f.ty(TypeKind::Bool));
    }
}
