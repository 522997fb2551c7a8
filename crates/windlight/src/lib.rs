pub mod cli;
pub mod compiler;
pub mod guard;
pub mod optimizer;
pub mod pipeline;
pub mod scanner;
pub mod sources;
pub mod types;

pub use compiler::{CompiledStylesheet, Compiler, CompilerError, DirectiveCompiler};
pub use optimizer::{LightningTransformer, PostProcessor, Previous, TransformError, Transformer};
pub use pipeline::{CompileOutput, CompileRequest, Session, compile, compile_file};
pub use scanner::{ScanError, Scanner};
pub use sources::{Root, SourceEntry, resolve_sources};
pub use types::{
    BrowserTargets, CompilerOptions, DEFAULT_INPUT, Drafts, FileConfig, NonStandard,
    TransformOptions, WindlightError, browser_version,
};
