//! The expression AST (§3): a closed sum of nullary literals, variable
//! references, arithmetic/comparison/logical operators, integration,
//! untimed and metric temporal operators, and specification scopes.
//!
//! Every node is hash-consed through [`crate::factory::Factory`]; see
//! [`Expr`] for the identity semantics that gives.

use crate::interner::Symbol;
use crate::pos::SourcePos;
use crate::types::Ty;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A reference to a sample binding in the current lexical scope: the
/// implicit current-iteration sample (`__curr__`), the configuration
/// record (`__conf__`), or a binder introduced by a scope or by the
/// rewriter's bounded-lowering (`@name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextName {
    Curr,
    Conf,
    Binder(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    #[must_use]
    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }
}

/// Future temporal operators. `G`/`F` are surface sugar desugared away
/// during Rewrite (see `SPEC_FULL.md` §3) and never appear past that pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureOp {
    G,
    F,
    Xs,
    Xw,
    Us,
    Uw,
    Rs,
    Rw,
}

/// Past temporal operators. `H`/`O` are surface sugar, desugared the same
/// way as `G`/`F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PastOp {
    H,
    O,
    Ys,
    Yw,
    Ss,
    Sw,
    Ts,
    Tw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalOp {
    Future(FutureOp),
    Past(PastOp),
}

impl TemporalOp {
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            TemporalOp::Future(FutureOp::G | FutureOp::F | FutureOp::Xs | FutureOp::Xw)
                | TemporalOp::Past(PastOp::H | PastOp::O | PastOp::Ys | PastOp::Yw)
        )
    }
}

/// The arguments to a temporal operator node: one child for unary
/// operators (`G, F, Xs, Xw, H, O, Ys, Yw`), two for binary operators
/// (`Us, Uw, Rs, Rw, Ss, Sw, Ts, Tw`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemporalArgs {
    Unary(Expr),
    Binary(Expr, Expr),
}

/// A specification scope (§3/§4.5): a predicate over the entire trace that
/// picks a sub-window and evaluates its body against that window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecKind {
    Globally(Expr),
    Before(Expr, Expr),
    After(Expr, Expr),
    Between(Expr, Expr, Expr),
    AfterUntil(Expr, Expr, Expr),
}

/// The closed sum of expression node payloads (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    BoolLit(bool),
    IntLit(i64),
    /// `f64` does not implement `Eq`/`Hash`; hash-consing keys on the raw
    /// bit pattern, which is exactly the equality a literal needs (no two
    /// distinct bit patterns should ever be considered the same constant).
    RealLit(u64),
    StrLit(Symbol),

    Data(Symbol),
    Context(ContextName),
    Member(Expr, Symbol),
    Index(Expr, Expr),

    Neg(Expr),
    Arith(ArithOp, Expr, Expr),

    Cmp(CmpOp, Expr, Expr),
    Equiv(Expr, Expr),

    Not(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Xor(Expr, Expr),
    Implies(Expr, Expr),
    Choice(Expr, Expr, Expr),

    Paren(Expr),

    /// `int(body, height[, time])` (§4.5).
    Integration {
        body: Expr,
        height: Expr,
        interval: Option<TimeInterval>,
    },

    Temporal {
        op: TemporalOp,
        interval: Option<TimeInterval>,
        args: TemporalArgs,
    },

    /// A rewrite-introduced lexical capture: binds `name` to the sample
    /// pointer current at the point this node is evaluated, visible to
    /// `body` as `context(@name)`. Synthesized only by bounded-lowering
    /// (§4.4); never produced by a front-end.
    At {
        name: Symbol,
        body: Expr,
    },

    Spec(SpecKind),
}

/// The owned payload behind an [`Expr`] handle: its kind, its source span
/// (mutable — stamped after hash-consing, since position is metadata, not
/// identity), and its TypeCalc-annotated result type (`None` until a
/// TypeCalc pass visits it).
pub struct ExprData {
    pub kind: ExprKind,
    pos: Cell<SourcePos>,
    ty: RefCell<Option<Ty>>,
}

impl ExprData {
    #[must_use]
    pub fn pos(&self) -> SourcePos {
        self.pos.get()
    }

    pub fn set_pos(&self, pos: SourcePos) {
        self.pos.set(pos);
    }

    #[must_use]
    pub fn ty(&self) -> Option<Ty> {
        self.ty.borrow().clone()
    }

    pub fn set_ty(&self, ty: Ty) {
        *self.ty.borrow_mut() = Some(ty);
    }
}

impl fmt::Debug for ExprData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprData")
            .field("kind", &self.kind)
            .field("pos", &self.pos.get())
            .finish()
    }
}

/// A hash-consed expression node handle.
///
/// `Expr` compares and hashes by the identity of the underlying allocation,
/// not by structural content — two `Expr`s built from equal constructor
/// arguments are, by construction through [`crate::factory::Factory`], the
/// *same* allocation, so `==` here is the O(1) identity check the
/// invariant in §3 promises ("Hash-consing: two `create(args)` calls with
/// equal arguments return the same node identity").
#[derive(Clone)]
pub struct Expr(pub(crate) Rc<ExprData>);

impl Expr {
    pub(crate) fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(ExprData {
            kind,
            pos: Cell::new(SourcePos::synthetic()),
            ty: RefCell::new(None),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    #[must_use]
    pub fn pos(&self) -> SourcePos {
        self.0.pos()
    }

    pub fn set_pos(&self, pos: SourcePos) {
        self.0.set_pos(pos);
    }

    #[must_use]
    pub fn ty(&self) -> Option<Ty> {
        self.0.ty()
    }

    pub fn set_ty(&self, ty: Ty) {
        self.0.set_ty(ty);
    }

    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self.kind(), ExprKind::Temporal { .. })
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// A hash-consed `[lo, hi]` time interval (§4.1). Either bound may be
/// absent (`TimeLowerBound`/`TimeUpperBound` sugar); both present gives a
/// closed interval.
pub struct IntervalData {
    pub lo: Option<Expr>,
    pub hi: Option<Expr>,
}

impl PartialEq for IntervalData {
    fn eq(&self, other: &Self) -> bool {
        self.lo == other.lo && self.hi == other.hi
    }
}
impl Eq for IntervalData {}
impl Hash for IntervalData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lo.hash(state);
        self.hi.hash(state);
    }
}

#[derive(Clone)]
pub struct TimeInterval(pub(crate) Rc<IntervalData>);

impl TimeInterval {
    #[must_use]
    pub fn lo(&self) -> Option<&Expr> {
        self.0.lo.as_ref()
    }

    #[must_use]
    pub fn hi(&self) -> Option<&Expr> {
        self.0.hi.as_ref()
    }
}

impl PartialEq for TimeInterval {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for TimeInterval {}

impl Hash for TimeInterval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeInterval")
            .field("lo", &self.0.lo.is_some())
            .field("hi", &self.0.hi.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;

    #[test]
    fn is_temporal_true_for_temporal_kinds() {
        let f = Factory::new();
        let a = f.expr(ExprKind::BoolLit(true));
        let g = f.expr(ExprKind::Temporal {
            op: TemporalOp::Future(FutureOp::G),
            interval: None,
            args: TemporalArgs::Unary(a),
        });
        assert!(g.is_temporal());
    }

    #[test]
    fn cmp_negate_is_involutive() {
        for op in [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge] {
            assert_eq!(op.negate().negate(), op);
        }
    }
}
