//! Code generation: text-emitted SSA-form IR.
//!
//! Generates an LLVM-IR-flavored text module directly into a `String`
//! buffer, in the same style as the teacher's own codegen: `writeln!`
//! instructions one at a time, `fresh_temp`/`fresh_block` counters for
//! virtual register and block-label names, explicit φ-nodes at merge
//! points. Each registered top-level expression or specification becomes
//! one function `(ptr %frst, ptr %last, ptr %conf) -> i1`, named by its
//! source span (§6).

use crate::ast::{ArithOp, CmpOp, ContextName, Expr, ExprKind, FutureOp, PastOp, SpecKind, TemporalArgs, TemporalOp};
use crate::config::CodeGenConfig;
use crate::error::CompileError;
use crate::factory::Factory;
use crate::interner::Symbol;
use crate::module::Module;
use crate::types::{Ty, TypeKind};
use std::fmt::Write as _;

/// The `(frst, curr, last)` pointer triple of the loop context currently
/// active. Every temporal operator and spec scope pushes one of these on
/// entry and pops it on exit; `curr` is what `context(__curr__)` resolves
/// to at any point in the tree.
#[derive(Clone)]
struct LoopCtx {
    frst: String,
    curr: String,
    last: String,
}

/// A generated SSA value: the operand text to use in a following
/// instruction (a `%name`, or a literal like `true`/`5`), plus its source
/// type for promotion decisions.
#[derive(Clone)]
struct Value {
    reg: String,
    ty: Ty,
}

/// The finished text module handed back to the caller (§6's "one IR
/// function per registered expression and specification").
pub struct IrModule {
    pub text: String,
    pub function_names: Vec<String>,
}

pub struct CodeGen<'a> {
    module: &'a Module,
    factory: &'a Factory,
    config: &'a CodeGenConfig,
    output: String,
    function_names: Vec<String>,
    temp_counter: u32,
    block_counter: u32,
    binder_stack: Vec<(Symbol, String)>,
    ctx_stack: Vec<LoopCtx>,
    conf_value: Option<Value>,
    conf_ty: Ty,
}

impl<'a> CodeGen<'a> {
    #[must_use]
    pub fn new(module: &'a Module, factory: &'a Factory, config: &'a CodeGenConfig) -> Self {
        let conf_ty = Self::conf_struct_ty(factory, module);
        let mut gen = CodeGen {
            module,
            factory,
            config,
            output: String::new(),
            function_names: Vec::new(),
            temp_counter: 0,
            block_counter: 0,
            binder_stack: Vec::new(),
            ctx_stack: Vec::new(),
            conf_value: None,
            conf_ty,
        };
        gen.emit_layouts();
        gen
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn fresh_block(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.block_counter);
        self.block_counter += 1;
        name
    }

    fn emit(&mut self, args: std::fmt::Arguments) {
        writeln!(&mut self.output, "{args}").unwrap();
    }

    fn ctx(&self) -> &LoopCtx {
        self.ctx_stack.last().expect("loop context stack must never be empty during codegen")
    }

    fn conf_struct_ty(factory: &Factory, module: &Module) -> Ty {
        let fields = module
            .conf_names()
            .iter()
            .map(|n| crate::types::Field {
                name: *n,
                ty: module.get_conf(*n).expect("name from conf_names").clone(),
            })
            .collect();
        factory.ty(TypeKind::Struct(fields))
    }

    /// Maps a user type to its LLVM-ish textual representation: enums
    /// narrowed to `i8`, strings to process-interned `i8*`, dynamic
    /// arrays to `{ i16, T* }`, fixed arrays to native `[N x T]` (§4.5).
    fn llvm_type(&self, ty: &Ty) -> String {
        match ty.kind() {
            TypeKind::Void => "void".to_string(),
            TypeKind::Bool => "i1".to_string(),
            TypeKind::Int => "i64".to_string(),
            TypeKind::Num => "double".to_string(),
            TypeKind::Str => "ptr".to_string(),
            TypeKind::Sample => "ptr".to_string(),
            TypeKind::Enum(_) => "i8".to_string(),
            TypeKind::Struct(_) => "ptr".to_string(),
            TypeKind::Array(_, 0) => "{ i16, ptr }".to_string(),
            TypeKind::Array(elem, n) => format!("[{n} x {}]", self.llvm_type(elem)),
        }
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.factory.interner().resolve(sym).to_string()
    }

    /// Emits `%conf_t`, `%prop_t`, and one named type per struct/enum/array
    /// reachable from a declared type, property, or configuration.
    fn emit_layouts(&mut self) {
        self.emit(format_args!("; trace-logic generated module"));
        self.emit(format_args!(""));

        for name in self.module.type_names() {
            if let Some(ty) = self.module.get_type(*name) {
                let literal = self.struct_literal(ty);
                let llvm_name = format!("%Type_{}", self.name_of(*name));
                self.emit(format_args!("{llvm_name} = type {literal}"));
            }
        }

        let conf_ty = self.conf_ty.clone();
        self.emit(format_args!("%conf_t = type {}", self.struct_literal(&conf_ty)));

        let mut prop_fields = vec!["i64".to_string()];
        for name in self.module.prop_names() {
            let ty = self.module.get_prop(*name).expect("name from prop_names");
            prop_fields.push(format!("{}*", self.llvm_type(ty)));
        }
        self.emit(format_args!("%prop_t = type {{ {} }}", prop_fields.join(", ")));
        self.emit(format_args!(""));
    }

    fn struct_literal(&self, ty: &Ty) -> String {
        match ty.kind() {
            TypeKind::Struct(fields) => {
                let parts: Vec<String> = fields.iter().map(|f| self.llvm_type(&f.ty)).collect();
                format!("{{ {} }}", parts.join(", "))
            }
            other => self.llvm_type(&self.factory.ty(other.clone())),
        }
    }

    /// Compile every node of `expr` into one externally visible function.
    /// `expr` must already be the rewritten, re-type-checked form.
    pub fn emit_function(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let ty = expr.ty().ok_or_else(|| CompileError::CodeGenError {
            message: "expression reached codegen without a TypeCalc annotation".to_string(),
            pos: expr.pos(),
        })?;
        if *ty.kind() != TypeKind::Bool {
            return Err(CompileError::CodeGenError {
                message: format!("top-level expression must be `bool`, found `{}`", ty.kind()),
                pos: expr.pos(),
            });
        }

        let function_name = expr.pos().function_name();
        self.temp_counter = 0;
        self.block_counter = 0;
        self.binder_stack.clear();
        self.conf_value = Some(Value { reg: "%conf".to_string(), ty: self.conf_ty.clone() });
        self.ctx_stack = vec![LoopCtx {
            frst: "%frst".to_string(),
            curr: "%frst".to_string(),
            last: "%last".to_string(),
        }];

        let body_start = self.output.len();
        self.emit(format_args!("define i1 @\"{function_name}\"(ptr %frst, ptr %last, ptr %conf) {{"));
        self.emit(format_args!("entry:"));

        let result = match self.gen_bool(expr) {
            Ok(v) => v,
            Err(e) => {
                // No partial IR for a failed function (§7).
                self.output.truncate(body_start);
                return Err(e);
            }
        };
        self.emit(format_args!("  ret i1 {}", result.reg));
        self.emit(format_args!("}}"));
        self.emit(format_args!(""));

        if self.config.verify() {
            if let Err(e) = self.verify_function(&function_name, &self.output[body_start..]) {
                self.output.truncate(body_start);
                return Err(e);
            }
        }

        self.function_names.push(function_name);
        Ok(())
    }

    fn verify_function(&self, name: &str, text: &str) -> Result<(), CompileError> {
        let mut defined = Vec::new();
        let mut referenced = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(label) = trimmed.strip_suffix(':') {
                if !label.contains(' ') && !label.is_empty() {
                    defined.push(label.to_string());
                }
            }
            let mut rest = trimmed;
            while let Some(pos) = rest.find("label %") {
                rest = &rest[pos + "label %".len()..];
                let end = rest.find(|c: char| c == ',' || c.is_whitespace()).unwrap_or(rest.len());
                referenced.push(rest[..end].to_string());
                rest = &rest[end..];
            }
        }
        for label in &referenced {
            if !defined.contains(label) {
                return Err(CompileError::VerifyError {
                    message: format!("function \"{name}\" branches to undefined block %{label}"),
                });
            }
        }
        if !text.contains("ret i1") {
            return Err(CompileError::VerifyError {
                message: format!("function \"{name}\" has no terminating `ret i1`"),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> IrModule {
        IrModule { text: self.output, function_names: self.function_names }
    }

    // ---- expression codegen -------------------------------------------------

    fn gen_bool(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        let v = self.gen_expr(expr)?;
        if *v.ty.kind() != TypeKind::Bool {
            return Err(CompileError::CodeGenError {
                message: format!("expected `bool`, found `{}`", v.ty.kind()),
                pos: expr.pos(),
            });
        }
        Ok(v)
    }

    fn gen_numeric(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        let v = self.gen_expr(expr)?;
        if !v.ty.kind().is_numeric() {
            return Err(CompileError::CodeGenError {
                message: format!("expected a numeric value, found `{}`", v.ty.kind()),
                pos: expr.pos(),
            });
        }
        Ok(v)
    }

    /// Promote `v` to `double` if it is an `int`; otherwise pass through.
    fn promote_to_num(&mut self, v: Value) -> Value {
        if *v.ty.kind() == TypeKind::Int {
            let t = self.fresh_temp();
            self.emit(format_args!("  {t} = sitofp i64 {} to double", v.reg));
            Value { reg: t, ty: self.factory.ty(TypeKind::Num) }
        } else {
            v
        }
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        match expr.kind() {
            ExprKind::BoolLit(b) => Ok(Value {
                reg: if *b { "true" } else { "false" }.to_string(),
                ty: self.factory.ty(TypeKind::Bool),
            }),
            ExprKind::IntLit(n) => Ok(Value { reg: n.to_string(), ty: self.factory.ty(TypeKind::Int) }),
            ExprKind::RealLit(bits) => {
                Ok(Value { reg: format!("{:e}", f64::from_bits(*bits)), ty: self.factory.ty(TypeKind::Num) })
            }
            ExprKind::StrLit(sym) => {
                let global = format!("@.str.{}", sym.as_u32());
                Ok(Value { reg: global, ty: self.factory.ty(TypeKind::Str) })
            }

            ExprKind::Data(name) => self.gen_data(*name, expr),
            ExprKind::Context(ContextName::Curr) => {
                Ok(Value { reg: self.ctx().curr.clone(), ty: self.factory.ty(TypeKind::Sample) })
            }
            ExprKind::Context(ContextName::Conf) => {
                Ok(self.conf_value.clone().expect("conf_value set at function entry"))
            }
            ExprKind::Context(ContextName::Binder(name)) => self
                .binder_stack
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, reg)| Value { reg: reg.clone(), ty: self.factory.ty(TypeKind::Sample) })
                .ok_or_else(|| CompileError::CodeGenError {
                    message: format!("unbound binder `@{}` reached codegen", self.name_of(*name)),
                    pos: expr.pos(),
                }),

            ExprKind::Member(base, name) => self.gen_member(base, *name, expr),
            ExprKind::Index(base, idx) => self.gen_index(base, idx, expr),

            ExprKind::Neg(sub) => {
                let v = self.gen_numeric(sub)?;
                let t = self.fresh_temp();
                if *v.ty.kind() == TypeKind::Int {
                    self.emit(format_args!("  {t} = sub i64 0, {}", v.reg));
                } else {
                    self.emit(format_args!("  {t} = fneg double {}", v.reg));
                }
                Ok(Value { reg: t, ty: v.ty })
            }
            ExprKind::Arith(op, lhs, rhs) => self.gen_arith(*op, lhs, rhs),
            ExprKind::Cmp(op, lhs, rhs) => self.gen_cmp(*op, lhs, rhs),
            ExprKind::Equiv(lhs, rhs) => {
                let l = self.gen_bool(lhs)?;
                let r = self.gen_bool(rhs)?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = icmp eq i1 {}, {}", l.reg, r.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }

            ExprKind::Not(sub) => {
                let v = self.gen_bool(sub)?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = xor i1 {}, true", v.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            ExprKind::And(lhs, rhs) => {
                let l = self.gen_bool(lhs)?;
                let r = self.gen_bool(rhs)?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = select i1 {}, i1 {}, i1 false", l.reg, r.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            ExprKind::Or(lhs, rhs) => {
                let l = self.gen_bool(lhs)?;
                let r = self.gen_bool(rhs)?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = select i1 {}, i1 true, i1 {}", l.reg, r.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            ExprKind::Xor(lhs, rhs) => {
                let l = self.gen_bool(lhs)?;
                let r = self.gen_bool(rhs)?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = xor i1 {}, {}", l.reg, r.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            ExprKind::Implies(lhs, rhs) => {
                let l = self.gen_bool(lhs)?;
                let r = self.gen_bool(rhs)?;
                let nl = self.fresh_temp();
                self.emit(format_args!("  {nl} = xor i1 {}, true", l.reg));
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = select i1 {nl}, i1 true, i1 {}", r.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            ExprKind::Choice(cond, then_branch, else_branch) => self.gen_choice(cond, then_branch, else_branch),

            ExprKind::Paren(inner) => self.gen_expr(inner),

            ExprKind::Integration { body, height, interval } => {
                self.gen_integration(body, height, interval.as_ref())
            }

            ExprKind::At { name, body } => {
                let binder_val = self.ctx().curr.clone();
                self.binder_stack.push((*name, binder_val));
                let result = self.gen_expr(body);
                self.binder_stack.pop();
                result
            }

            ExprKind::Spec(kind) => self.gen_spec(kind),

            ExprKind::Temporal { op, interval, args } => {
                if interval.is_some() {
                    return Err(CompileError::CodeGenError {
                        message: "temporal operator reached codegen with a residual TimeInterval; Rewrite should have lowered it".to_string(),
                        pos: expr.pos(),
                    });
                }
                self.gen_temporal(*op, args, expr)
            }
        }
    }

    fn gen_data(&mut self, name: Symbol, expr: &Expr) -> Result<Value, CompileError> {
        if let Some(ty) = self.module.get_prop(name).cloned() {
            let idx = 1 + self.module.prop_names().iter().position(|n| *n == name).expect("prop_names contains name");
            let gep = self.fresh_temp();
            self.emit(format_args!(
                "  {gep} = getelementptr %prop_t, ptr {}, i32 0, i32 {idx}",
                self.ctx().curr
            ));
            let ptr = self.fresh_temp();
            self.emit(format_args!("  {ptr} = load ptr, ptr {gep}"));
            if ty.kind().is_scalar() {
                let val = self.fresh_temp();
                self.emit(format_args!("  {val} = load {}, ptr {ptr}", self.llvm_type(&ty)));
                Ok(Value { reg: val, ty })
            } else {
                Ok(Value { reg: ptr, ty })
            }
        } else if let Some(ty) = self.module.get_conf(name).cloned() {
            let idx = self.module.conf_names().iter().position(|n| *n == name).expect("conf_names contains name");
            let gep = self.fresh_temp();
            let conf_reg = self.conf_value.clone().expect("conf_value set at function entry").reg;
            self.emit(format_args!("  {gep} = getelementptr %conf_t, ptr {conf_reg}, i32 0, i32 {idx}"));
            if ty.kind().is_scalar() {
                let val = self.fresh_temp();
                self.emit(format_args!("  {val} = load {}, ptr {gep}", self.llvm_type(&ty)));
                Ok(Value { reg: val, ty })
            } else {
                Ok(Value { reg: gep, ty })
            }
        } else {
            Err(CompileError::CodeGenError {
                message: format!("`{}` resolves to neither a property nor a configuration", self.name_of(name)),
                pos: expr.pos(),
            })
        }
    }

    fn gen_member(&mut self, base: &Expr, name: Symbol, expr: &Expr) -> Result<Value, CompileError> {
        let base_v = self.gen_expr(base)?;
        let base_literal = self.struct_literal(&base_v.ty);
        match base_v.ty.kind().clone() {
            TypeKind::Sample => {
                if self.name_of(name) != "__time__" {
                    return Err(CompileError::CodeGenError {
                        message: "only `.__time__` is valid on a sample reference".to_string(),
                        pos: expr.pos(),
                    });
                }
                let gep = self.fresh_temp();
                self.emit(format_args!("  {gep} = getelementptr %prop_t, ptr {}, i32 0, i32 0", base_v.reg));
                let val = self.fresh_temp();
                self.emit(format_args!("  {val} = load i64, ptr {gep}"));
                Ok(Value { reg: val, ty: self.factory.ty(TypeKind::Int) })
            }
            TypeKind::Struct(fields) => {
                let idx = fields
                    .iter()
                    .position(|f| f.name == name)
                    .ok_or_else(|| CompileError::CodeGenError { message: "no such field".to_string(), pos: expr.pos() })?;
                let field_ty = fields[idx].ty.clone();
                let gep = self.fresh_temp();
                self.emit(format_args!("  {gep} = getelementptr {base_literal}, ptr {}, i32 0, i32 {idx}", base_v.reg));
                if field_ty.kind().is_scalar() {
                    let val = self.fresh_temp();
                    self.emit(format_args!("  {val} = load {}, ptr {gep}", self.llvm_type(&field_ty)));
                    Ok(Value { reg: val, ty: field_ty })
                } else {
                    Ok(Value { reg: gep, ty: field_ty })
                }
            }
            TypeKind::Enum(labels) => {
                let ordinal = labels.iter().position(|l| *l == name).ok_or_else(|| CompileError::CodeGenError {
                    message: "no such enum label".to_string(),
                    pos: expr.pos(),
                })?;
                let t = self.fresh_temp();
                self.emit(format_args!("  {t} = icmp eq i8 {}, {ordinal}", base_v.reg));
                Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
            }
            other => Err(CompileError::CodeGenError { message: format!("`{other}` has no members"), pos: expr.pos() }),
        }
    }

    fn gen_index(&mut self, base: &Expr, idx: &Expr, expr: &Expr) -> Result<Value, CompileError> {
        let base_v = self.gen_expr(base)?;
        let idx_v = self.gen_numeric(idx)?;
        match base_v.ty.kind().clone() {
            TypeKind::Array(elem, _) => {
                let gep = self.fresh_temp();
                self.emit(format_args!(
                    "  {gep} = getelementptr {}, ptr {}, i32 0, i64 {}",
                    self.llvm_type(&elem),
                    base_v.reg,
                    idx_v.reg
                ));
                if elem.kind().is_scalar() {
                    let val = self.fresh_temp();
                    self.emit(format_args!("  {val} = load {}, ptr {gep}", self.llvm_type(&elem)));
                    Ok(Value { reg: val, ty: elem })
                } else {
                    Ok(Value { reg: gep, ty: elem })
                }
            }
            other => Err(CompileError::CodeGenError { message: format!("`{other}` is not indexable"), pos: expr.pos() }),
        }
    }

    fn gen_arith(&mut self, op: ArithOp, lhs: &Expr, rhs: &Expr) -> Result<Value, CompileError> {
        let l = self.gen_numeric(lhs)?;
        let r = self.gen_numeric(rhs)?;
        let both_int = *l.ty.kind() == TypeKind::Int && *r.ty.kind() == TypeKind::Int;
        let (l, r) = if both_int { (l, r) } else { (self.promote_to_num(l), self.promote_to_num(r)) };
        let ty = l.ty.clone();
        let mnemonic = match (op, both_int) {
            (ArithOp::Add, true) => "add i64",
            (ArithOp::Sub, true) => "sub i64",
            (ArithOp::Mul, true) => "mul i64",
            (ArithOp::Div, true) => "sdiv i64",
            (ArithOp::Mod, true) => "srem i64",
            (ArithOp::Add, false) => "fadd double",
            (ArithOp::Sub, false) => "fsub double",
            (ArithOp::Mul, false) => "fmul double",
            (ArithOp::Div, false) => "fdiv double",
            (ArithOp::Mod, false) => "frem double",
        };
        let t = self.fresh_temp();
        self.emit(format_args!("  {t} = {mnemonic} {}, {}", l.reg, r.reg));
        Ok(Value { reg: t, ty })
    }

    fn gen_cmp(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr) -> Result<Value, CompileError> {
        let l = self.gen_expr(lhs)?;
        let r = self.gen_expr(rhs)?;
        let lk = l.ty.kind().clone();
        let rk = r.ty.kind().clone();
        let t = self.fresh_temp();
        match (lk, rk) {
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let both_int = a == TypeKind::Int && b == TypeKind::Int;
                let (l, r) = if both_int { (l, r) } else { (self.promote_to_num(l), self.promote_to_num(r)) };
                let mnemonic = if both_int {
                    format!("icmp {}", Self::icmp_pred(op))
                } else {
                    format!("fcmp {}", Self::fcmp_pred(op))
                };
                let llty = if both_int { "i64" } else { "double" };
                self.emit(format_args!("  {t} = {mnemonic} {llty} {}, {}", l.reg, r.reg));
            }
            (TypeKind::Str, TypeKind::Str) => {
                self.emit(format_args!("  {t} = icmp {} ptr {}, {}", Self::icmp_pred(op), l.reg, r.reg));
            }
            (TypeKind::Bool, TypeKind::Bool) => {
                self.emit(format_args!("  {t} = icmp {} i1 {}, {}", Self::icmp_pred(op), l.reg, r.reg));
            }
            (a, b) => {
                return Err(CompileError::CodeGenError {
                    message: format!("cannot compare `{a}` with `{b}`"),
                    pos: lhs.pos(),
                })
            }
        }
        Ok(Value { reg: t, ty: self.factory.ty(TypeKind::Bool) })
    }

    fn icmp_pred(op: CmpOp) -> &'static str {
        match op {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "slt",
            CmpOp::Le => "sle",
            CmpOp::Gt => "sgt",
            CmpOp::Ge => "sge",
        }
    }

    fn fcmp_pred(op: CmpOp) -> &'static str {
        match op {
            CmpOp::Eq => "oeq",
            CmpOp::Ne => "one",
            CmpOp::Lt => "olt",
            CmpOp::Le => "ole",
            CmpOp::Gt => "ogt",
            CmpOp::Ge => "oge",
        }
    }

    fn gen_choice(&mut self, cond: &Expr, then_branch: &Expr, else_branch: &Expr) -> Result<Value, CompileError> {
        let c = self.gen_bool(cond)?;
        let t = self.gen_expr(then_branch)?;
        let e = self.gen_expr(else_branch)?;
        let (t, e, ty) = if t.ty == e.ty {
            let ty = t.ty.clone();
            (t, e, ty)
        } else {
            let t2 = self.promote_to_num(t);
            let e2 = self.promote_to_num(e);
            let ty = t2.ty.clone();
            (t2, e2, ty)
        };
        let result = self.fresh_temp();
        self.emit(format_args!("  {result} = select i1 {}, {} {}, {} {}", c.reg, self.llvm_type(&ty), t.reg, self.llvm_type(&ty), e.reg));
        Ok(Value { reg: result, ty })
    }

    // ---- temporal operator skeletons ---------------------------------------

    /// `direction` is `true` for the future step (`Xs/Xw`, via `getNext`),
    /// `false` for the past step (`Ys/Yw`, via `getPrev`). `end_value` is
    /// the result when the step leaves `[frst,last]` — `false` for the
    /// strong variants, `true` for the weak ones.
    fn gen_xy(&mut self, future: bool, strong: bool, body: &Expr) -> Result<Value, CompileError> {
        let head = self.fresh_block("xy_head");
        let in_band = self.fresh_block("xy_body");
        let out_band = self.fresh_block("xy_end");
        let tail = self.fresh_block("xy_tail");

        self.emit(format_args!("  br label %{head}"));
        self.emit(format_args!("{head}:"));
        let next = self.fresh_temp();
        if future {
            self.emit(format_args!("  {next} = call ptr @prop_next(ptr {})", self.ctx().curr));
            let cmp = self.fresh_temp();
            self.emit(format_args!("  {cmp} = icmp ule ptr {next}, {}", self.ctx().last));
            self.emit(format_args!("  br i1 {cmp}, label %{in_band}, label %{out_band}"));
        } else {
            self.emit(format_args!("  {next} = call ptr @prop_prev(ptr {})", self.ctx().curr));
            let cmp = self.fresh_temp();
            self.emit(format_args!("  {cmp} = icmp uge ptr {next}, {}", self.ctx().frst));
            self.emit(format_args!("  br i1 {cmp}, label %{in_band}, label %{out_band}"));
        }

        self.emit(format_args!("{in_band}:"));
        self.ctx_stack.push(LoopCtx { frst: self.ctx().frst.clone(), curr: next, last: self.ctx().last.clone() });
        let body_v = self.gen_bool(body)?;
        self.ctx_stack.pop();
        let in_band_pred = self.fresh_block("xy_body_end");
        self.emit(format_args!("  br label %{in_band_pred}"));
        self.emit(format_args!("{in_band_pred}:"));
        self.emit(format_args!("  br label %{tail}"));

        self.emit(format_args!("{out_band}:"));
        self.emit(format_args!("  br label %{tail}"));

        self.emit(format_args!("{tail}:"));
        let result = self.fresh_temp();
        self.emit(format_args!(
            "  {result} = phi i1 [ {}, %{in_band_pred} ], [ {}, %{out_band} ]",
            body_v.reg,
            if strong { "false" } else { "true" }
        ));
        Ok(Value { reg: result, ty: self.factory.ty(TypeKind::Bool) })
    }

    /// The shared `UR`/`ST` emitter for all eight binary temporal
    /// operators, parameterized by the characteristic constants
    /// `(rhsV, lhsV, endV)` from §4.5's table.
    #[allow(clippy::too_many_arguments)]
    fn gen_ur_st(
        &mut self,
        future: bool,
        rhs_v: bool,
        lhs_v: bool,
        end_v: bool,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value, CompileError> {
        let outer = self.fresh_block("loop_outer");
        let inner = self.fresh_block("loop_inner");
        let body = self.fresh_block("loop_body");
        let next_block = self.fresh_block("loop_next");
        let tail = self.fresh_block("loop_tail");

        self.emit(format_args!("  br label %{outer}"));
        self.emit(format_args!("{outer}:"));
        let curr_phi = self.fresh_temp();
        self.emit(format_args!(
            "  {curr_phi} = phi ptr [ {}, %entry ], [ %loopnext_val, %{next_block} ]",
            self.ctx().curr
        ));
        let in_range = self.fresh_temp();
        if future {
            self.emit(format_args!("  {in_range} = icmp ule ptr {curr_phi}, {}", self.ctx().last));
        } else {
            self.emit(format_args!("  {in_range} = icmp uge ptr {curr_phi}, {}", self.ctx().frst));
        }
        self.emit(format_args!("  br i1 {in_range}, label %{inner}, label %{tail}"));

        self.emit(format_args!("{inner}:"));
        self.ctx_stack.push(LoopCtx { frst: self.ctx().frst.clone(), curr: curr_phi.clone(), last: self.ctx().last.clone() });
        let rhs_val = self.gen_bool(rhs)?;
        let rhs_matches = self.fresh_temp();
        self.emit(format_args!("  {rhs_matches} = icmp eq i1 {}, {}", rhs_val.reg, rhs_v));
        self.emit(format_args!("  br i1 {rhs_matches}, label %{tail}, label %{body}"));

        self.emit(format_args!("{body}:"));
        let lhs_val = self.gen_bool(lhs)?;
        self.ctx_stack.pop();
        let lhs_matches = self.fresh_temp();
        self.emit(format_args!("  {lhs_matches} = icmp eq i1 {}, {}", lhs_val.reg, lhs_v));
        self.emit(format_args!("  br i1 {lhs_matches}, label %{tail}, label %{next_block}"));

        self.emit(format_args!("{next_block}:"));
        let stepped = self.fresh_temp();
        if future {
            self.emit(format_args!("  {stepped} = call ptr @prop_next(ptr {curr_phi})"));
        } else {
            self.emit(format_args!("  {stepped} = call ptr @prop_prev(ptr {curr_phi})"));
        }
        self.emit(format_args!("  %loopnext_val = bitcast ptr {stepped} to ptr"));
        self.emit(format_args!("  br label %{outer}"));

        self.emit(format_args!("{tail}:"));
        let result = self.fresh_temp();
        self.emit(format_args!(
            "  {result} = phi i1 [ {rhs_v}, %{inner} ], [ {lhs_v}, %{body} ], [ {end_v}, %{outer} ]"
        ));
        Ok(Value { reg: result, ty: self.factory.ty(TypeKind::Bool) })
    }

    fn gen_temporal(&mut self, op: TemporalOp, args: &TemporalArgs, expr: &Expr) -> Result<Value, CompileError> {
        match (op, args) {
            (TemporalOp::Future(FutureOp::Xs), TemporalArgs::Unary(a)) => self.gen_xy(true, true, a),
            (TemporalOp::Future(FutureOp::Xw), TemporalArgs::Unary(a)) => self.gen_xy(true, false, a),
            (TemporalOp::Past(PastOp::Ys), TemporalArgs::Unary(a)) => self.gen_xy(false, true, a),
            (TemporalOp::Past(PastOp::Yw), TemporalArgs::Unary(a)) => self.gen_xy(false, false, a),

            (TemporalOp::Future(FutureOp::Us), TemporalArgs::Binary(a, b)) => self.gen_ur_st(true, true, false, false, a, b),
            (TemporalOp::Future(FutureOp::Uw), TemporalArgs::Binary(a, b)) => self.gen_ur_st(true, true, false, true, a, b),
            (TemporalOp::Future(FutureOp::Rs), TemporalArgs::Binary(a, b)) => self.gen_ur_st(true, false, true, false, a, b),
            (TemporalOp::Future(FutureOp::Rw), TemporalArgs::Binary(a, b)) => self.gen_ur_st(true, false, true, true, a, b),

            (TemporalOp::Past(PastOp::Ss), TemporalArgs::Binary(a, b)) => self.gen_ur_st(false, true, false, false, a, b),
            (TemporalOp::Past(PastOp::Sw), TemporalArgs::Binary(a, b)) => self.gen_ur_st(false, true, false, true, a, b),
            (TemporalOp::Past(PastOp::Ts), TemporalArgs::Binary(a, b)) => self.gen_ur_st(false, false, true, false, a, b),
            (TemporalOp::Past(PastOp::Tw), TemporalArgs::Binary(a, b)) => self.gen_ur_st(false, false, true, true, a, b),

            _ => Err(CompileError::CodeGenError {
                message: "G/F/H/O reached codegen unlowered, or operator arity mismatched its arguments".to_string(),
                pos: expr.pos(),
            }),
        }
    }

    /// `int(body, height[, lo,hi])`: walks consecutive sample pairs,
    /// accumulating `height(curr) * (_hi - _lo)` over the sub-intervals
    /// where `body` holds (§4.5).
    fn gen_integration(&mut self, body: &Expr, height: &Expr, interval: Option<&crate::ast::TimeInterval>) -> Result<Value, CompileError> {
        let outer = self.fresh_block("int_outer");
        let step = self.fresh_block("int_step");
        let skip = self.fresh_block("int_skip");
        let tail = self.fresh_block("int_tail");

        self.emit(format_args!("  br label %{outer}"));
        self.emit(format_args!("{outer}:"));
        let curr_phi = self.fresh_temp();
        let acc_phi = self.fresh_temp();
        self.emit(format_args!("  {curr_phi} = phi ptr [ {}, %entry ], [ %int_next_ptr, %{step} ], [ %int_next_ptr, %{skip} ]", self.ctx().curr));
        self.emit(format_args!("  {acc_phi} = phi double [ 0.000000e+00, %entry ], [ %int_acc_next, %{step} ], [ {acc_phi}, %{skip} ]"));
        let next = self.fresh_temp();
        self.emit(format_args!("  {next} = call ptr @prop_next(ptr {curr_phi})"));
        let has_next = self.fresh_temp();
        self.emit(format_args!("  {has_next} = icmp ule ptr {next}, {}", self.ctx().last));
        self.emit(format_args!("  br i1 {has_next}, label %{step}, label %{tail}"));

        self.emit(format_args!("{step}:"));
        self.ctx_stack.push(LoopCtx { frst: self.ctx().frst.clone(), curr: curr_phi.clone(), last: self.ctx().last.clone() });
        let body_v = self.gen_bool(body)?;
        let height_v = self.gen_numeric(height)?;
        let height_v = self.promote_to_num(height_v);
        let curr_time_gep = self.fresh_temp();
        self.emit(format_args!("  {curr_time_gep} = getelementptr %prop_t, ptr {curr_phi}, i32 0, i32 0"));
        let curr_time = self.fresh_temp();
        self.emit(format_args!("  {curr_time} = load i64, ptr {curr_time_gep}"));
        let next_time_gep = self.fresh_temp();
        self.emit(format_args!("  {next_time_gep} = getelementptr %prop_t, ptr {next}, i32 0, i32 0"));
        let next_time = self.fresh_temp();
        self.emit(format_args!("  {next_time} = load i64, ptr {next_time_gep}"));

        let lo_bound = match interval.and_then(|iv| iv.lo()) {
            Some(lo) => self.gen_numeric(lo)?.reg,
            None => curr_time.clone(),
        };
        let hi_bound = match interval.and_then(|iv| iv.hi()) {
            Some(hi) => self.gen_numeric(hi)?.reg,
            None => next_time.clone(),
        };
        let span = self.fresh_temp();
        self.emit(format_args!("  {span} = sub i64 {hi_bound}, {lo_bound}"));
        let span_f = self.fresh_temp();
        self.emit(format_args!("  {span_f} = sitofp i64 {span} to double"));
        let contribution = self.fresh_temp();
        self.emit(format_args!("  {contribution} = fmul double {}, {span_f}", height_v.reg));
        let gated = self.fresh_temp();
        self.emit(format_args!("  {gated} = select i1 {}, double {contribution}, double 0.000000e+00", body_v.reg));
        self.ctx_stack.pop();
        self.emit(format_args!("  %int_acc_next = fadd double {acc_phi}, {gated}"));
        self.emit(format_args!("  %int_next_ptr = bitcast ptr {next} to ptr"));
        self.emit(format_args!("  br label %{outer}"));

        self.emit(format_args!("{skip}:"));
        self.emit(format_args!("  br label %{outer}"));

        self.emit(format_args!("{tail}:"));
        Ok(Value { reg: acc_phi, ty: self.factory.ty(TypeKind::Num) })
    }

    // ---- specification scopes -----------------------------------------------

    fn gen_spec(&mut self, kind: &SpecKind) -> Result<Value, CompileError> {
        match kind {
            SpecKind::Globally(body) => self.gen_bool(body),
            SpecKind::Before(cond, body) => self.gen_before(cond, body, true),
            SpecKind::After(cond, body) => self.gen_before(cond, body, false),
            SpecKind::Between(lhs, rhs, body) => self.gen_between(lhs, rhs, body, true),
            SpecKind::AfterUntil(lhs, rhs, body) => self.gen_between(lhs, rhs, body, false),
        }
    }

    fn gen_before(&mut self, cond: &Expr, body: &Expr, before: bool) -> Result<Value, CompileError> {
        let outer = self.fresh_block("scope_scan");
        let found = self.fresh_block("scope_found");
        let advance = self.fresh_block("scope_advance");
        let tail = self.fresh_block("scope_tail");

        self.emit(format_args!("  br label %{outer}"));
        self.emit(format_args!("{outer}:"));
        let curr_phi = self.fresh_temp();
        self.emit(format_args!("  {curr_phi} = phi ptr [ {}, %entry ], [ %scope_next_ptr, %{advance} ]", self.ctx().frst));
        let in_range = self.fresh_temp();
        self.emit(format_args!("  {in_range} = icmp ule ptr {curr_phi}, {}", self.ctx().last));
        self.emit(format_args!("  br i1 {in_range}, label %{found}, label %{tail}"));

        self.emit(format_args!("{found}:"));
        self.ctx_stack.push(LoopCtx { frst: self.ctx().frst.clone(), curr: curr_phi.clone(), last: self.ctx().last.clone() });
        let cond_v = self.gen_bool(cond)?;
        self.ctx_stack.pop();
        self.emit(format_args!("  br i1 {}, label %{tail}, label %{advance}", cond_v.reg));

        self.emit(format_args!("{advance}:"));
        self.emit(format_args!("  %scope_next_ptr = call ptr @prop_next(ptr {curr_phi})"));
        self.emit(format_args!("  br label %{outer}"));

        self.emit(format_args!("{tail}:"));
        let window = if before {
            LoopCtx { frst: self.ctx().frst.clone(), curr: self.ctx().frst.clone(), last: curr_phi.clone() }
        } else {
            LoopCtx { frst: curr_phi.clone(), curr: curr_phi.clone(), last: self.ctx().last.clone() }
        };
        self.ctx_stack.push(window);
        let body_v = self.gen_bool(body);
        self.ctx_stack.pop();
        let body_v = body_v?;

        let cap = self.fresh_temp();
        self.emit(format_args!("  {cap} = select i1 {in_range}, i1 {}, i1 true", body_v.reg));
        Ok(Value { reg: cap, ty: self.factory.ty(TypeKind::Bool) })
    }

    /// `between`/`after_until`: a two-state machine over `inside ∈
    /// {false,true}`, short-circuiting to `fail` the moment a closed window
    /// violates `body`. `close_at_end` selects the trailing evaluation that
    /// distinguishes `between` (evaluate the still-open window, §4.5) from
    /// `after_until` (an unclosed region contributes `T`).
    fn gen_between(&mut self, lhs: &Expr, rhs: &Expr, body: &Expr, close_at_end: bool) -> Result<Value, CompileError> {
        let scan = self.fresh_block("win_scan");
        let check = self.fresh_block("win_check");
        let enter = self.fresh_block("win_enter");
        let leave = self.fresh_block("win_leave");
        let window = self.fresh_block("win_window");
        let fail = self.fresh_block("win_fail");
        let advance = self.fresh_block("win_advance");
        let tail = self.fresh_block("win_tail");

        self.emit(format_args!("  br label %{scan}"));
        self.emit(format_args!("{scan}:"));
        let curr_phi = self.fresh_temp();
        let inside_phi = self.fresh_temp();
        let inner_frst_phi = self.fresh_temp();
        self.emit(format_args!("  {curr_phi} = phi ptr [ {}, %entry ], [ %win_next_ptr, %{advance} ]", self.ctx().frst));
        self.emit(format_args!("  {inside_phi} = phi i1 [ false, %entry ], [ %win_inside_next, %{advance} ]"));
        self.emit(format_args!("  {inner_frst_phi} = phi ptr [ {}, %entry ], [ %win_inner_frst_next, %{advance} ]", self.ctx().frst));
        let in_range = self.fresh_temp();
        self.emit(format_args!("  {in_range} = icmp ule ptr {curr_phi}, {}", self.ctx().last));
        self.emit(format_args!("  br i1 {in_range}, label %{check}, label %{tail}"));

        self.emit(format_args!("{check}:"));
        self.ctx_stack.push(LoopCtx { frst: self.ctx().frst.clone(), curr: curr_phi.clone(), last: self.ctx().last.clone() });
        let lhs_v = self.gen_bool(lhs)?;
        let rhs_v = self.gen_bool(rhs)?;
        self.ctx_stack.pop();
        let not_inside = self.fresh_temp();
        self.emit(format_args!("  {not_inside} = xor i1 {inside_phi}, true"));
        let not_rhs = self.fresh_temp();
        self.emit(format_args!("  {not_rhs} = xor i1 {}, true", rhs_v.reg));
        let enter_cond_a = self.fresh_temp();
        self.emit(format_args!("  {enter_cond_a} = select i1 {not_inside}, i1 {}, i1 false", lhs_v.reg));
        let enter_cond = self.fresh_temp();
        self.emit(format_args!("  {enter_cond} = select i1 {enter_cond_a}, i1 {not_rhs}, i1 false"));
        let leave_cond = self.fresh_temp();
        self.emit(format_args!("  {leave_cond} = select i1 {inside_phi}, i1 {}, i1 false", rhs_v.reg));
        self.emit(format_args!("  br i1 {enter_cond}, label %{enter}, label %{leave}"));

        self.emit(format_args!("{enter}:"));
        self.emit(format_args!("  br label %{advance}"));

        self.emit(format_args!("{leave}:"));
        self.emit(format_args!("  br i1 {leave_cond}, label %{window}, label %{advance}"));

        self.emit(format_args!("{window}:"));
        self.ctx_stack.push(LoopCtx { frst: inner_frst_phi.clone(), curr: inner_frst_phi.clone(), last: curr_phi.clone() });
        let window_v = self.gen_bool(body);
        self.ctx_stack.pop();
        let window_v = window_v?;
        self.emit(format_args!("  br i1 {}, label %{advance}, label %{fail}", window_v.reg));

        self.emit(format_args!("{fail}:"));
        self.emit(format_args!("  br label %{tail}"));

        self.emit(format_args!("{advance}:"));
        self.emit(format_args!(
            "  %win_inside_next = phi i1 [ true, %{enter} ], [ {inside_phi}, %{leave} ], [ false, %{window} ]"
        ));
        self.emit(format_args!(
            "  %win_inner_frst_next = phi ptr [ {curr_phi}, %{enter} ], [ {inner_frst_phi}, %{leave} ], [ {inner_frst_phi}, %{window} ]"
        ));
        self.emit(format_args!("  %win_next_ptr = call ptr @prop_next(ptr {curr_phi})"));
        self.emit(format_args!("  br label %{scan}"));

        self.emit(format_args!("{tail}:"));
        let tail_inside_open = if close_at_end {
            self.ctx_stack.push(LoopCtx { frst: inner_frst_phi.clone(), curr: inner_frst_phi.clone(), last: self.ctx().last.clone() });
            let v = self.gen_bool(body);
            self.ctx_stack.pop();
            v?.reg
        } else {
            "true".to_string()
        };
        let still_open = self.fresh_temp();
        self.emit(format_args!("  {still_open} = select i1 {inside_phi}, i1 {tail_inside_open}, i1 true"));
        let result = self.fresh_temp();
        self.emit(format_args!("  {result} = phi i1 [ false, %{fail} ], [ {still_open}, %{scan} ]"));
        Ok(Value { reg: result, ty: self.factory.ty(TypeKind::Bool) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CmpOp;
    use crate::factory::Factory;
    use crate::pos::{RowCol, SourcePos};

    fn build_module() -> (Factory, Module) {
        let f = Factory::new();
        let mut m = Module::new();
        let speed = f.intern("speed");
        m.add_prop(speed, f.ty(TypeKind::Num), SourcePos::synthetic(), "speed").unwrap();
        (f, m)
    }

    #[test]
    fn emits_one_function_per_expression() {
        let (f, mut m) = build_module();
        let speed = f.intern("speed");
        let data = f.expr(ExprKind::Data(speed));
        let zero = f.expr(ExprKind::RealLit(0.0f64.to_bits()));
        let cmp = f.expr(ExprKind::Cmp(CmpOp::Ge, data, zero));
        cmp.set_pos(SourcePos::new(RowCol::new(1, 1), RowCol::new(1, 10)));
        let mut checker = crate::typecalc::TypeCalc::new(&f, &m);
        checker.check(&cmp).unwrap();
        m.add_expr(cmp.clone());

        let config = CodeGenConfig::new();
        let mut gen = CodeGen::new(&m, &f, &config);
        gen.emit_function(&cmp).unwrap();
        let module = gen.finish();
        assert_eq!(module.function_names.len(), 1);
        assert!(module.text.contains("define i1 @\"1:1 .. 1:10\""));
    }

    #[test]
    fn rejects_non_bool_top_level_expression() {
        let (f, m) = build_module();
        let lit = f.expr(ExprKind::IntLit(1));
        let mut checker = crate::typecalc::TypeCalc::new(&f, &m);
        checker.check(&lit).unwrap();

        let config = CodeGenConfig::new();
        let mut gen = CodeGen::new(&m, &f, &config);
        assert!(matches!(gen.emit_function(&lit), Err(CompileError::CodeGenError { .. })));
    }

    #[test]
    fn verify_rejects_a_branch_to_an_undefined_block() {
        let (f, m) = build_module();
        let config = CodeGenConfig::new();
        let gen = CodeGen::new(&m, &f, &config);
        let broken = "entry:\n  br label %nonexistent\n  ret i1 true\n";
        assert!(gen.verify_function("broken", broken).is_err());
    }
}
