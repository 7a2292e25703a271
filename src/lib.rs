//! Metric temporal logic over sampled signal traces — compiler core
//!
//! This crate lowers a program of declared types, properties, configuration
//! constants, and temporal specifications into a module of SSA-form IR
//! functions, one per top-level expression or specification, each with
//! signature `(frst: *const Sample, last: *const Sample, conf: *const Conf)
//! -> bool`.
//!
//! The pipeline is one pass per specification, with no back-edges between
//! components:
//!
//! text -> (external parser) -> [`ast`] -> [`typecalc`] -> [`rewrite`] ->
//! [`typecalc`] (again, on the rewritten tree) -> [`codegen`] -> IR module
//!
//! The parser front-end, trace storage format, JIT/linking harness, and CLI
//! are external collaborators and out of scope for this crate; see
//! [`module::Module`] for the shape a front-end is expected to populate.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod factory;
pub mod interner;
pub mod module;
pub mod pos;
pub mod rewrite;
pub mod typecalc;
pub mod types;

pub use ast::{Expr, ExprKind, TimeInterval};
pub use codegen::{CodeGen, IrModule};
pub use config::CodeGenConfig;
pub use error::CompileError;
pub use factory::Factory;
pub use interner::Symbol;
pub use module::Module;
pub use pos::SourcePos;
pub use types::{Ty, TypeKind};

/// Compile every top-level expression and specification registered on
/// `module` into one IR function each.
///
/// Runs the full pipeline for each entry: TypeCalc, Rewrite, TypeCalc again
/// on the rewritten form, then CodeGen. A failure on any single entry aborts
/// the whole compilation — partial IR is never returned (§7 of the design:
/// "Partial IR from a failed function must not be committed to the output
/// module").
#[tracing::instrument(skip_all, fields(types = module.type_names().len(), props = module.prop_names().len(), confs = module.conf_names().len()))]
pub fn compile_module(
    factory: &Factory,
    module: &Module,
    config: &CodeGenConfig,
) -> Result<IrModule, CompileError> {
    tracing::debug!("starting compilation");

    let mut checker = typecalc::TypeCalc::new(factory, module);
    for expr in module.exprs().iter().chain(module.specs().iter()) {
        checker.check(expr)?;
    }

    let mut rewritten = Vec::with_capacity(module.exprs().len());
    for expr in module.exprs() {
        rewritten.push((expr.clone(), false));
    }
    let mut rewritten_specs = Vec::with_capacity(module.specs().len());
    for spec in module.specs() {
        rewritten_specs.push(spec.clone());
    }

    let rewriter = rewrite::Rewriter::new(factory);
    let mut final_exprs = Vec::with_capacity(rewritten.len());
    for (expr, _) in &rewritten {
        let rw = rewriter.rewrite(expr)?;
        let mut checker2 = typecalc::TypeCalc::new(factory, module);
        checker2.check(&rw)?;
        final_exprs.push(rw);
    }
    let mut final_specs = Vec::with_capacity(rewritten_specs.len());
    for spec in &rewritten_specs {
        let rw = rewriter.rewrite(spec)?;
        let mut checker2 = typecalc::TypeCalc::new(factory, module);
        checker2.check(&rw)?;
        final_specs.push(rw);
    }

    let mut gen = codegen::CodeGen::new(module, factory, config);
    for expr in &final_exprs {
        gen.emit_function(expr)?;
    }
    for spec in &final_specs {
        gen.emit_function(spec)?;
    }

    tracing::debug!(functions = final_exprs.len() + final_specs.len(), "compilation finished");
    Ok(gen.finish())
}
