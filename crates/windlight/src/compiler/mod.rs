mod directive;
mod utilities;

pub use directive::DirectiveCompiler;
pub use utilities::{UtilityTable, escape_class};

use crate::sources::{Root, SourceEntry};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for compiler operations
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Can't resolve '{specifier}' in '{}'", .base.display())]
    UnresolvedImport { specifier: String, base: PathBuf },

    #[error("Circular @import of {}", .0.display())]
    ImportCycle(PathBuf),

    #[error("Compilation failed: {0}")]
    CompileFailed(String),
}

/// A compiler turns source CSS into a stylesheet that still needs candidates
pub trait Compiler: Send + Sync {
    /// Parse `css`, resolving relative paths against `base`.
    ///
    /// `on_dependency` is called once per file the stylesheet pulls in, so
    /// callers can rebuild when one of them changes.
    fn compile(
        &self,
        css: &str,
        base: &Path,
        on_dependency: &mut dyn FnMut(&Path),
    ) -> Result<Box<dyn CompiledStylesheet>, CompilerError>;
}

/// First-phase compiler output
pub trait CompiledStylesheet: Send {
    /// Where candidates should be scanned for
    fn root(&self) -> &Root;

    /// Additional sources declared by the stylesheet, in declaration order
    fn globs(&self) -> &[SourceEntry];

    /// Generate the final CSS for the given candidates
    fn build(&mut self, candidates: &[String]) -> Result<String, CompilerError>;
}
