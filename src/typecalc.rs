//! TypeCalc (§4.3): a bottom-up visitor that assigns a [`Ty`] to every
//! node in an expression tree, caching the result on the hash-consed node
//! itself (§3's sharing invariant means the same subexpression is only
//! ever visited once — the cache on [`crate::ast::ExprData`] makes repeat
//! visits, including the second TypeCalc pass after Rewrite, free for
//! anything Rewrite left untouched).

use crate::ast::{ArithOp, CmpOp, ContextName, Expr, ExprKind, SpecKind, TemporalArgs};
use crate::error::CompileError;
use crate::factory::Factory;
use crate::module::Module;
use crate::types::{Ty, TypeKind};

pub struct TypeCalc<'a> {
    factory: &'a Factory,
    module: &'a Module,
}

impl<'a> TypeCalc<'a> {
    #[must_use]
    pub fn new(factory: &'a Factory, module: &'a Module) -> Self {
        TypeCalc { factory, module }
    }

    /// Compute (and cache) the type of `expr`, checking every operator
    /// rule along the way. Returns the node's type on success.
    pub fn check(&mut self, expr: &Expr) -> Result<Ty, CompileError> {
        if let Some(ty) = expr.ty() {
            return Ok(ty);
        }
        let ty = self.infer(expr)?;
        expr.set_ty(ty.clone());
        Ok(ty)
    }

    fn err(&self, expr: &Expr, message: impl Into<String>) -> CompileError {
        CompileError::TypeError {
            message: message.into(),
            pos: expr.pos(),
        }
    }

    fn expect_numeric(&mut self, expr: &Expr, sub: &Expr) -> Result<Ty, CompileError> {
        let ty = self.check(sub)?;
        if ty.kind().is_numeric() {
            Ok(ty)
        } else {
            Err(self.err(expr, format!("expected a numeric operand, found `{}`", ty.kind())))
        }
    }

    fn expect_bool(&mut self, expr: &Expr, sub: &Expr) -> Result<(), CompileError> {
        let ty = self.check(sub)?;
        if *ty.kind() == TypeKind::Bool {
            Ok(())
        } else {
            Err(self.err(expr, format!("expected `bool`, found `{}`", ty.kind())))
        }
    }

    fn numeric_join(&self, lhs: &Ty, rhs: &Ty) -> Option<TypeKind> {
        match (lhs.kind(), rhs.kind()) {
            (TypeKind::Int, TypeKind::Int) => Some(TypeKind::Int),
            (TypeKind::Int, TypeKind::Num) | (TypeKind::Num, TypeKind::Int) | (TypeKind::Num, TypeKind::Num) => {
                Some(TypeKind::Num)
            }
            _ => None,
        }
    }

    fn infer(&mut self, expr: &Expr) -> Result<Ty, CompileError> {
        match expr.kind() {
            ExprKind::BoolLit(_) => Ok(self.factory.ty(TypeKind::Bool)),
            ExprKind::IntLit(_) => Ok(self.factory.ty(TypeKind::Int)),
            ExprKind::RealLit(_) => Ok(self.factory.ty(TypeKind::Num)),
            ExprKind::StrLit(_) => Ok(self.factory.ty(TypeKind::Str)),

            ExprKind::Data(name) => self
                .module
                .get_prop(*name)
                .or_else(|| self.module.get_conf(*name))
                .cloned()
                .ok_or_else(|| CompileError::UnknownName {
                    name: self.factory.interner().resolve(*name).to_string(),
                    pos: expr.pos(),
                }),

            ExprKind::Context(ContextName::Curr) => Ok(self.factory.ty(TypeKind::Sample)),
            ExprKind::Context(ContextName::Conf) => Ok(self.factory.ty(TypeKind::Struct(
                self.module
                    .conf_names()
                    .iter()
                    .map(|n| crate::types::Field {
                        name: *n,
                        ty: self.module.get_conf(*n).expect("name from conf_names").clone(),
                    })
                    .collect(),
            ))),
            ExprKind::Context(ContextName::Binder(name)) => {
                self.module.lookup_context(*name).cloned().ok_or_else(|| CompileError::UnknownName {
                    name: self.factory.interner().resolve(*name).to_string(),
                    pos: expr.pos(),
                })
            }

            ExprKind::Member(base, field) => {
                let base_ty = self.check(base)?;
                match base_ty.kind() {
                    TypeKind::Sample => {
                        if self.factory.interner().resolve(*field).as_ref() == "__time__" {
                            Ok(self.factory.ty(TypeKind::Int))
                        } else {
                            Err(self.err(expr, "only `.__time__` is valid on a sample reference"))
                        }
                    }
                    TypeKind::Struct(fields) => fields
                        .iter()
                        .find(|f| f.name == *field)
                        .map(|f| f.ty.clone())
                        .ok_or_else(|| self.err(expr, "no such field")),
                    TypeKind::Enum(_) => Ok(self.factory.ty(TypeKind::Bool)),
                    other => Err(self.err(expr, format!("`{other}` has no members"))),
                }
            }

            ExprKind::Index(base, index) => {
                self.expect_numeric(expr, index)?;
                let base_ty = self.check(base)?;
                match base_ty.kind() {
                    TypeKind::Array(elem, _) => Ok(elem.clone()),
                    other => Err(self.err(expr, format!("`{other}` is not indexable"))),
                }
            }

            ExprKind::Neg(sub) => self.expect_numeric(expr, sub),

            ExprKind::Arith(_, lhs, rhs) => {
                let lhs_ty = self.expect_numeric(expr, lhs)?;
                let rhs_ty = self.expect_numeric(expr, rhs)?;
                self.numeric_join(&lhs_ty, &rhs_ty)
                    .map(|k| self.factory.ty(k))
                    .ok_or_else(|| self.err(expr, "arithmetic requires two numeric operands"))
            }

            ExprKind::Cmp(op, lhs, rhs) => {
                let lhs_ty = self.check(lhs)?;
                let rhs_ty = self.check(rhs)?;
                let ok = match (lhs_ty.kind(), rhs_ty.kind()) {
                    (a, b) if a.is_numeric() && b.is_numeric() => true,
                    (TypeKind::Str, TypeKind::Str) => matches!(op, CmpOp::Eq | CmpOp::Ne),
                    (TypeKind::Bool, TypeKind::Bool) => matches!(op, CmpOp::Eq | CmpOp::Ne),
                    _ => false,
                };
                if ok {
                    Ok(self.factory.ty(TypeKind::Bool))
                } else {
                    Err(self.err(expr, format!("cannot compare `{}` with `{}`", lhs_ty.kind(), rhs_ty.kind())))
                }
            }

            ExprKind::Equiv(lhs, rhs) => {
                self.expect_bool(expr, lhs)?;
                self.expect_bool(expr, rhs)?;
                Ok(self.factory.ty(TypeKind::Bool))
            }

            ExprKind::Not(sub) => {
                self.expect_bool(expr, sub)?;
                Ok(self.factory.ty(TypeKind::Bool))
            }
            ExprKind::And(lhs, rhs)
            | ExprKind::Or(lhs, rhs)
            | ExprKind::Xor(lhs, rhs)
            | ExprKind::Implies(lhs, rhs) => {
                self.expect_bool(expr, lhs)?;
                self.expect_bool(expr, rhs)?;
                Ok(self.factory.ty(TypeKind::Bool))
            }

            ExprKind::Choice(cond, then_branch, else_branch) => {
                self.expect_bool(expr, cond)?;
                let then_ty = self.check(then_branch)?;
                let else_ty = self.check(else_branch)?;
                if then_ty == else_ty {
                    Ok(then_ty)
                } else if let Some(k) = self.numeric_join(&then_ty, &else_ty) {
                    Ok(self.factory.ty(k))
                } else {
                    Err(self.err(expr, "choice branches must agree in type"))
                }
            }

            ExprKind::Paren(sub) => self.check(sub),

            ExprKind::Integration { body, height, interval } => {
                self.expect_bool(expr, body)?;
                self.expect_numeric(expr, height)?;
                self.check_interval(interval.as_ref())?;
                Ok(self.factory.ty(TypeKind::Num))
            }

            ExprKind::Temporal { interval, args, .. } => {
                self.check_interval(interval.as_ref())?;
                match args {
                    TemporalArgs::Unary(sub) => self.expect_bool(expr, sub)?,
                    TemporalArgs::Binary(lhs, rhs) => {
                        self.expect_bool(expr, lhs)?;
                        self.expect_bool(expr, rhs)?;
                    }
                }
                Ok(self.factory.ty(TypeKind::Bool))
            }

            ExprKind::At { name, body } => {
                let sample_ty = self.factory.ty(TypeKind::Sample);
                self.module.push_context(*name, sample_ty);
                let result = self.check(body).and_then(|ty| {
                    if *ty.kind() == TypeKind::Bool {
                        Ok(ty)
                    } else {
                        Err(self.err(expr, "`@name { ... }` body must be `bool`"))
                    }
                });
                self.module.pop_context();
                result
            }

            ExprKind::Spec(kind) => {
                match kind {
                    SpecKind::Globally(body) => self.expect_bool(expr, body)?,
                    SpecKind::Before(trigger, body) | SpecKind::After(trigger, body) => {
                        self.expect_bool(expr, trigger)?;
                        self.expect_bool(expr, body)?;
                    }
                    SpecKind::Between(start, end, body) | SpecKind::AfterUntil(start, end, body) => {
                        self.expect_bool(expr, start)?;
                        self.expect_bool(expr, end)?;
                        self.expect_bool(expr, body)?;
                    }
                }
                Ok(self.factory.ty(TypeKind::Bool))
            }
        }
    }

    fn check_interval(&mut self, interval: Option<&crate::ast::TimeInterval>) -> Result<(), CompileError> {
        let Some(interval) = interval else { return Ok(()) };
        if let Some(lo) = interval.lo() {
            self.expect_numeric(lo, lo)?;
        }
        if let Some(hi) = interval.hi() {
            self.expect_numeric(hi, hi)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FutureOp, TemporalOp};
    use crate::pos::SourcePos;

    #[test]
    fn data_ref_resolves_prop_type() {
        let f = Factory::new();
        let mut m = Module::new();
        let speed = f.intern("speed");
        m.add_prop(speed, f.ty(TypeKind::Num), SourcePos::synthetic(), "speed").unwrap();
        let e = f.expr(ExprKind::Data(speed));
        let mut tc = TypeCalc::new(&f, &m);
        assert_eq!(tc.check(&e).unwrap().kind(), &TypeKind::Num);
    }

    #[test]
    fn unknown_data_ref_is_rejected() {
        let f = Factory::new();
        let m = Module::new();
        let e = f.expr(ExprKind::Data(f.intern("nope")));
        let mut tc = TypeCalc::new(&f, &m);
        assert!(matches!(tc.check(&e), Err(CompileError::UnknownName { .. })));
    }

    #[test]
    fn comparing_bool_and_int_is_rejected() {
        let f = Factory::new();
        let m = Module::new();
        let lhs = f.expr(ExprKind::BoolLit(true));
        let rhs = f.expr(ExprKind::IntLit(1));
        let e = f.expr(ExprKind::Cmp(CmpOp::Eq, lhs, rhs));
        let mut tc = TypeCalc::new(&f, &m);
        assert!(matches!(tc.check(&e), Err(CompileError::TypeError { .. })));
    }

    #[test]
    fn temporal_over_non_bool_argument_is_rejected() {
        let f = Factory::new();
        let m = Module::new();
        let sub = f.expr(ExprKind::IntLit(1));
        let e = f.expr(ExprKind::Temporal {
            op: TemporalOp::Future(FutureOp::G),
            interval: None,
            args: TemporalArgs::Unary(sub),
        });
        let mut tc = TypeCalc::new(&f, &m);
        assert!(matches!(tc.check(&e), Err(CompileError::TypeError { .. })));
    }

    #[test]
    fn member_time_on_sample_context_is_int() {
        let f = Factory::new();
        let m = Module::new();
        let curr = f.expr(ExprKind::Context(ContextName::Curr));
        let time = f.intern("__time__");
        let e = f.expr(ExprKind::Member(curr, time));
        let mut tc = TypeCalc::new(&f, &m);
        assert_eq!(tc.check(&e).unwrap().kind(), &TypeKind::Int);
    }

    #[test]
    fn data_ref_falls_back_to_conf_namespace() {
        let f = Factory::new();
        let mut m = Module::new();
        let threshold = f.intern("threshold");
        m.add_conf(threshold, f.ty(TypeKind::Int), SourcePos::synthetic(), "threshold")
            .unwrap();
        let e = f.expr(ExprKind::Data(threshold));
        let mut tc = TypeCalc::new(&f, &m);
        assert_eq!(tc.check(&e).unwrap().kind(), &TypeKind::Int);
    }

    #[test]
    fn at_binder_is_visible_inside_body_only() {
        let f = Factory::new();
        let mut m = Module::new();
        let name = f.intern("starting");
        let binder_ref = f.expr(ExprKind::Context(ContextName::Binder(name)));
        let time = f.intern("__time__");
        let member = f.expr(ExprKind::Member(binder_ref, time));
        let cmp = f.expr(ExprKind::Cmp(CmpOp::Ge, member, f.expr(ExprKind::IntLit(0))));
        let at = f.expr(ExprKind::At { name, body: cmp });

        let mut tc = TypeCalc::new(&f, &m);
        assert_eq!(tc.check(&at).unwrap().kind(), &TypeKind::Bool);
        assert!(m.lookup_context(name).is_none());
    }

    #[test]
    fn bare_binder_reference_without_an_enclosing_at_is_rejected() {
        let f = Factory::new();
        let m = Module::new();
        let name = f.intern("elsewhere");
        let e = f.expr(ExprKind::Context(ContextName::Binder(name)));
        let mut tc = TypeCalc::new(&f, &m);
        assert!(matches!(tc.check(&e), Err(CompileError::UnknownName { .. })));
    }
}
