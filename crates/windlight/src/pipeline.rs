use crate::compiler::{CompiledStylesheet, Compiler, DirectiveCompiler};
use crate::optimizer::{DEFAULT_FILENAME, LightningTransformer, PostProcessor, Transformer};
use crate::scanner::Scanner;
use crate::sources::{SourceEntry, resolve_sources};
use crate::types::{CompilerOptions, DEFAULT_INPUT, WindlightError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One compilation: the source CSS plus where it came from
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    pub css: String,

    /// File the CSS was read from, if any
    pub input_file: Option<PathBuf>,

    /// Base directory override. Defaults to the input file's directory, then
    /// the current working directory.
    pub base_path: Option<PathBuf>,

    /// Transform options. `None` transforms with the default options.
    pub options: Option<CompilerOptions>,
}

impl CompileRequest {
    /// Request for a literal stylesheet. Empty input compiles the default stylesheet.
    pub fn from_css(css: impl Into<String>) -> Self {
        let css = css.into();
        let css = if css.is_empty() { DEFAULT_INPUT.to_string() } else { css };
        Self { css, ..Self::default() }
    }

    /// Request for the contents of `path`, read as UTF-8
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WindlightError> {
        let path = path.as_ref();
        let css = fs::read_to_string(path)
            .map_err(|source| WindlightError::Read { path: path.to_path_buf(), source })?;
        Ok(Self { css, input_file: Some(path.to_path_buf()), ..Self::default() })
    }

    pub fn with_base_path(mut self, base_path: Option<PathBuf>) -> Self {
        self.base_path = base_path;
        self
    }

    pub fn with_options(mut self, options: Option<CompilerOptions>) -> Self {
        self.options = options;
        self
    }
}

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub css: String,

    /// Input file followed by every file the compiler pulled in, in order
    pub dependencies: Vec<PathBuf>,

    /// Sources that were scanned for candidates
    pub sources: Vec<SourceEntry>,

    /// Files the scanner read
    pub files: Vec<PathBuf>,
}

/// Runs the compile → scan → build → post-process pipeline.
///
/// A session owns the post-processing memo, so repeated runs that generate
/// identical CSS skip the transform engine.
pub struct Session<C: Compiler = DirectiveCompiler, T: Transformer = LightningTransformer> {
    compiler: C,
    post_processor: PostProcessor<T>,
}

impl Session {
    pub fn new() -> Self {
        Self::with(DirectiveCompiler::new(), LightningTransformer::new())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Compiler, T: Transformer> Session<C, T> {
    pub fn with(compiler: C, transformer: T) -> Self {
        Self { compiler, post_processor: PostProcessor::new(transformer) }
    }

    pub fn post_processor(&self) -> &PostProcessor<T> {
        &self.post_processor
    }

    pub fn run(&mut self, request: &CompileRequest) -> Result<CompileOutput, WindlightError> {
        if let Some(options) = &request.options {
            options.transform.validate()?;
        }

        let input_file = request.input_file.as_deref().map(std::path::absolute).transpose()?;
        let base = match (&request.base_path, &input_file) {
            (Some(base), _) => base.clone(),
            (None, Some(file)) => match file.parent() {
                Some(parent) => parent.to_path_buf(),
                None => std::env::current_dir()?,
            },
            (None, None) => std::env::current_dir()?,
        };

        let mut dependencies: Vec<PathBuf> = input_file.iter().cloned().collect();

        debug!(base = %base.display(), "compiling stylesheet");
        let mut stylesheet = self.compiler.compile(&request.css, &base, &mut |path: &Path| {
            dependencies.push(path.to_path_buf());
        })?;

        let sources = resolve_sources(stylesheet.root(), stylesheet.globs(), &base);
        debug!(sources = ?sources, "resolved scan sources");

        let mut scanner = Scanner::new(&sources)?;
        let candidates = scanner.scan();

        let generated = build(stylesheet.as_mut(), &candidates)?;

        let filename = input_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let css = self.post_processor.process(generated, request.options.as_ref(), &filename)?;

        Ok(CompileOutput { css, dependencies, sources, files: scanner.files().to_vec() })
    }
}

/// Finalize a compiled stylesheet with the scanned candidates
pub fn build(
    stylesheet: &mut dyn CompiledStylesheet,
    candidates: &[String],
) -> Result<String, WindlightError> {
    let css = stylesheet.build(candidates)?;
    debug!(candidates = candidates.len(), bytes = css.len(), "built stylesheet");
    Ok(css)
}

/// Compile a stylesheet and optionally transform it with Lightning CSS.
///
/// # Arguments
/// * `input` - The CSS to compile. Empty input compiles `@import "tailwindcss";`
/// * `base_path` - Base directory for the compiler. Defaults to the current directory.
/// * `options` - Lightning CSS options. `None` transforms with the defaults.
///
/// # Example
/// ```no_run
/// let css = windlight::compile("@import \"tailwindcss\";", None, None).unwrap();
/// assert!(!css.is_empty());
/// ```
pub fn compile(
    input: &str,
    base_path: Option<&Path>,
    options: Option<&CompilerOptions>,
) -> Result<String, WindlightError> {
    let request = CompileRequest::from_css(input)
        .with_base_path(base_path.map(Path::to_path_buf))
        .with_options(options.cloned());
    Ok(Session::new().run(&request)?.css)
}

/// Compile a CSS file and optionally transform it with Lightning CSS.
///
/// Without an input file the default stylesheet is compiled. The base
/// directory defaults to the file's directory.
pub fn compile_file(
    input_file: Option<&Path>,
    base_path: Option<&Path>,
    options: Option<&CompilerOptions>,
) -> Result<String, WindlightError> {
    let request = match input_file {
        Some(path) => CompileRequest::from_file(path)?,
        None => CompileRequest::from_css(DEFAULT_INPUT),
    };
    let request =
        request.with_base_path(base_path.map(Path::to_path_buf)).with_options(options.cloned());
    Ok(Session::new().run(&request)?.css)
}
