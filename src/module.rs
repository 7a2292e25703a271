//! The Module Table (§4.2): the three ordered name→type namespaces a
//! front-end populates before compilation — declared types, properties
//! (trace fields), and configuration constants — plus the registered
//! top-level expressions and specifications to compile, and the lexical
//! binder scope stack TypeCalc consults for `@name` references.

use crate::ast::Expr;
use crate::error::CompileError;
use crate::interner::Symbol;
use crate::pos::SourcePos;
use crate::types::Ty;
use hashbrown::HashMap;

#[derive(Default)]
struct Namespace {
    order: Vec<Symbol>,
    entries: HashMap<Symbol, Ty>,
}

impl Namespace {
    fn insert(&mut self, name: Symbol, ty: Ty, pos: SourcePos, text: &str) -> Result<(), CompileError> {
        if self.entries.contains_key(&name) {
            return Err(CompileError::DuplicateDeclaration {
                name: text.to_string(),
                pos,
            });
        }
        self.entries.insert(name, ty);
        self.order.push(name);
        Ok(())
    }

    fn get(&self, name: Symbol) -> Option<&Ty> {
        self.entries.get(&name)
    }

    fn has(&self, name: Symbol) -> bool {
        self.entries.contains_key(&name)
    }
}

/// A program's declared types, properties, configuration constants, and
/// the expressions/specs registered for compilation.
///
/// A front-end builds one of these (parsing is out of scope for this
/// crate, §6) and hands it to [`crate::compile_module`] alongside a
/// [`crate::factory::Factory`].
#[derive(Default)]
pub struct Module {
    types: Namespace,
    props: Namespace,
    confs: Namespace,
    exprs: Vec<Expr>,
    specs: Vec<Expr>,
    /// Active `@name` binder scopes, innermost last. TypeCalc pushes one
    /// when entering an `At` node's body and pops it on the way out, so
    /// nested binders shadow outer ones the way block scoping does.
    context_scopes: Vec<(Symbol, Ty)>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Module::default()
    }

    /// Types, properties, and configuration constants share one name
    /// space even though they're stored in three separate tables (§4.2:
    /// "configuration and property namespaces are disjoint from
    /// types" — and, by the same rule, from each other).
    fn check_disjoint(&self, name: Symbol, pos: SourcePos, text: &str) -> Result<(), CompileError> {
        if self.types.has(name) || self.props.has(name) || self.confs.has(name) {
            return Err(CompileError::DuplicateDeclaration { name: text.to_string(), pos });
        }
        Ok(())
    }

    pub fn add_type(&mut self, name: Symbol, ty: Ty, pos: SourcePos, text: &str) -> Result<(), CompileError> {
        self.check_disjoint(name, pos, text)?;
        self.types.insert(name, ty, pos, text)
    }

    pub fn add_prop(&mut self, name: Symbol, ty: Ty, pos: SourcePos, text: &str) -> Result<(), CompileError> {
        self.check_disjoint(name, pos, text)?;
        self.props.insert(name, ty, pos, text)
    }

    pub fn add_conf(&mut self, name: Symbol, ty: Ty, pos: SourcePos, text: &str) -> Result<(), CompileError> {
        self.check_disjoint(name, pos, text)?;
        self.confs.insert(name, ty, pos, text)
    }

    #[must_use]
    pub fn get_type(&self, name: Symbol) -> Option<&Ty> {
        self.types.get(name)
    }

    #[must_use]
    pub fn get_prop(&self, name: Symbol) -> Option<&Ty> {
        self.props.get(name)
    }

    #[must_use]
    pub fn get_conf(&self, name: Symbol) -> Option<&Ty> {
        self.confs.get(name)
    }

    #[must_use]
    pub fn has_type(&self, name: Symbol) -> bool {
        self.types.has(name)
    }

    #[must_use]
    pub fn has_prop(&self, name: Symbol) -> bool {
        self.props.has(name)
    }

    #[must_use]
    pub fn has_conf(&self, name: Symbol) -> bool {
        self.confs.has(name)
    }

    #[must_use]
    pub fn type_names(&self) -> &[Symbol] {
        &self.types.order
    }

    #[must_use]
    pub fn prop_names(&self) -> &[Symbol] {
        &self.props.order
    }

    #[must_use]
    pub fn conf_names(&self) -> &[Symbol] {
        &self.confs.order
    }

    pub fn add_expr(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    pub fn add_spec(&mut self, spec: Expr) {
        self.specs.push(spec);
    }

    #[must_use]
    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    #[must_use]
    pub fn specs(&self) -> &[Expr] {
        &self.specs
    }

    /// Enter an `At(name, ...)` scope: `name` now resolves to `ty` for any
    /// `context(@name)` lookup until [`Module::pop_context`] is called.
    pub fn push_context(&mut self, name: Symbol, ty: Ty) {
        self.context_scopes.push((name, ty));
    }

    /// # Panics
    /// Panics if no context scope is active — every push must be paired
    /// with a pop by the visitor that pushed it.
    pub fn pop_context(&mut self) {
        self.context_scopes
            .pop()
            .expect("pop_context called with no active scope");
    }

    /// Look up the innermost binder named `name`, if any is in scope.
    #[must_use]
    pub fn lookup_context(&self, name: Symbol) -> Option<&Ty> {
        self.context_scopes
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, ty)| ty)
    }

    /// Whether `name` resolves to an active binder (§4.2's `hasContext`).
    #[must_use]
    pub fn has_context(&self, name: Symbol) -> bool {
        self.lookup_context(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::types::TypeKind;

    #[test]
    fn duplicate_prop_name_is_rejected() {
        let f = Factory::new();
        let mut m = Module::new();
        let name = f.intern("speed");
        let ty = f.ty(TypeKind::Num);
        m.add_prop(name, ty.clone(), SourcePos::synthetic(), "speed").unwrap();
        let err = m.add_prop(name, ty, SourcePos::synthetic(), "speed").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn names_preserve_insertion_order() {
        let f = Factory::new();
        let mut m = Module::new();
        let ty = f.ty(TypeKind::Bool);
        let a = f.intern("a");
        let b = f.intern("b");
        m.add_prop(a, ty.clone(), SourcePos::synthetic(), "a").unwrap();
        m.add_prop(b, ty, SourcePos::synthetic(), "b").unwrap();
        assert_eq!(m.prop_names(), &[a, b]);
    }

    #[test]
    fn context_scope_shadows_and_unwinds() {
        let f = Factory::new();
        let mut m = Module::new();
        let name = f.intern("starting");
        let sample_ty = f.ty(TypeKind::Sample);
        assert!(m.lookup_context(name).is_none());
        m.push_context(name, sample_ty.clone());
        assert_eq!(m.lookup_context(name), Some(&sample_ty));
        m.pop_context();
        assert!(m.lookup_context(name).is_none());
    }
}
