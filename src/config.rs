//! Code generation configuration, builder-style, mirroring the teacher's
//! `CompilerConfig`.

/// Tunables for [`crate::codegen::CodeGen`]. Every option has a sensible
/// default; front-ends override only what they need.
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Prefix every generated function and block name with this string,
    /// so multiple modules can be linked without name collisions.
    module_prefix: String,
    /// Emit `@starting`-binder debug comments alongside each generated
    /// temporal-loop skeleton.
    annotate_temporal_loops: bool,
    /// Run the post-generation structural verifier before returning the
    /// module (§7). Front-ends that trust their own TypeCalc/Rewrite
    /// output may disable this to skip the pass.
    verify: bool,
}

impl Default for CodeGenConfig {
    fn default() -> Self {
        CodeGenConfig {
            module_prefix: String::new(),
            annotate_temporal_loops: true,
            verify: true,
        }
    }
}

impl CodeGenConfig {
    #[must_use]
    pub fn new() -> Self {
        CodeGenConfig::default()
    }

    #[must_use]
    pub fn with_module_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.module_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_annotate_temporal_loops(mut self, annotate: bool) -> Self {
        self.annotate_temporal_loops = annotate;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn module_prefix(&self) -> &str {
        &self.module_prefix
    }

    #[must_use]
    pub fn annotate_temporal_loops(&self) -> bool {
        self.annotate_temporal_loops
    }

    #[must_use]
    pub fn verify(&self) -> bool {
        self.verify
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_verify_and_annotate() {
        let cfg = CodeGenConfig::new();
        assert!(cfg.verify());
        assert!(cfg.annotate_temporal_loops());
        assert_eq!(cfg.module_prefix(), "");
    }

    #[test]
    fn builder_methods_chain() {
        let cfg = CodeGenConfig::new()
            .with_module_prefix("m0.")
            .with_verify(false);
        assert_eq!(cfg.module_prefix(), "m0.");
        assert!(!cfg.verify());
    }
}
