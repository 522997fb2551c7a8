use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::collections::HashMap;
use std::path::PathBuf;
use windlight::{
    BrowserTargets, CompilerOptions, Drafts, NonStandard, TransformOptions, WindlightError,
    compile as compile_css, compile_file as compile_css_file,
};

/// Draft syntax to parse
#[napi(object)]
pub struct DraftsOptions {
    pub custom_media: Option<bool>,
}

/// Non-standard syntax to parse
#[napi(object)]
pub struct NonStandardOptions {
    pub deep_selector_combinator: Option<bool>,
}

/// Options for compiling a stylesheet.
///
/// Passing an options object replaces the built-in transform defaults:
/// fields left out are treated as off.
#[napi(object)]
pub struct CompileOptions {
    /// Minify the output
    pub minify: Option<bool>,

    /// Accepted for compatibility, no source map is produced
    pub source_map: Option<bool>,

    pub drafts: Option<DraftsOptions>,

    pub non_standard: Option<NonStandardOptions>,

    /// Lightning CSS feature bits to always compile
    pub include: Option<u32>,

    /// Lightning CSS feature bits to never compile
    pub exclude: Option<u32>,

    /// Browser name to encoded minimum version, e.g. `{ safari: 16 << 16 }`
    pub targets: Option<HashMap<String, u32>>,

    pub error_recovery: Option<bool>,

    /// Skip the Lightning CSS pass
    pub disable_transforms: Option<bool>,

    /// Run the Lightning CSS pass twice
    pub transform_twice: Option<bool>,
}

impl TryFrom<CompileOptions> for CompilerOptions {
    type Error = Error;

    fn try_from(opts: CompileOptions) -> Result<Self> {
        let mut targets = BrowserTargets::default();
        for (browser, version) in opts.targets.unwrap_or_default() {
            if !targets.set(&browser, version) {
                let err = WindlightError::Config(format!("unknown browser target '{browser}'"));
                return Err(Error::from_reason(err.to_string()));
            }
        }

        let neutral = TransformOptions::neutral();
        let transform = TransformOptions {
            minify: opts.minify.unwrap_or(neutral.minify),
            source_map: opts.source_map.unwrap_or(neutral.source_map),
            drafts: Drafts {
                custom_media: opts
                    .drafts
                    .and_then(|d| d.custom_media)
                    .unwrap_or(neutral.drafts.custom_media),
            },
            non_standard: NonStandard {
                deep_selector_combinator: opts
                    .non_standard
                    .and_then(|n| n.deep_selector_combinator)
                    .unwrap_or(neutral.non_standard.deep_selector_combinator),
            },
            include: opts.include.unwrap_or(neutral.include),
            exclude: opts.exclude.unwrap_or(neutral.exclude),
            targets,
            error_recovery: opts.error_recovery.unwrap_or(neutral.error_recovery),
        };

        Ok(CompilerOptions {
            transform,
            disable_transforms: opts.disable_transforms.unwrap_or_default(),
            transform_twice: opts.transform_twice.unwrap_or_default(),
        })
    }
}

fn convert(options: Option<CompileOptions>) -> Result<Option<CompilerOptions>> {
    options.map(CompilerOptions::try_from).transpose()
}

/// Compile a stylesheet (async)
///
/// @param input - CSS source, empty for the default `@import "tailwindcss";`
/// @param basePath - Directory for resolving imports and scanning sources
/// @param options - Transform options, built-in defaults when omitted
/// @returns Promise with the final CSS
#[napi]
pub async fn compile(
    input: String,
    base_path: Option<String>,
    options: Option<CompileOptions>,
) -> Result<String> {
    let options = convert(options)?;
    let base_path = base_path.map(PathBuf::from);

    // Run CPU-bound work in blocking thread pool
    tokio::task::spawn_blocking(move || {
        compile_css(&input, base_path.as_deref(), options.as_ref())
    })
    .await
    .map_err(|e| Error::from_reason(format!("Task panicked: {e}")))?
    .map_err(|e| Error::from_reason(e.to_string()))
}

/// Compile a stylesheet read from a file (async)
///
/// @param inputFile - Path of the entry stylesheet, default input when omitted
/// @param basePath - Directory for resolving imports, the file's directory when omitted
/// @param options - Transform options, built-in defaults when omitted
/// @returns Promise with the final CSS
#[napi]
pub async fn compile_file(
    input_file: Option<String>,
    base_path: Option<String>,
    options: Option<CompileOptions>,
) -> Result<String> {
    let options = convert(options)?;
    let input_file = input_file.map(PathBuf::from);
    let base_path = base_path.map(PathBuf::from);

    tokio::task::spawn_blocking(move || {
        compile_css_file(input_file.as_deref(), base_path.as_deref(), options.as_ref())
    })
    .await
    .map_err(|e| Error::from_reason(format!("Task panicked: {e}")))?
    .map_err(|e| Error::from_reason(e.to_string()))
}

/// Compile a stylesheet (sync)
#[napi]
pub fn compile_sync(
    input: String,
    base_path: Option<String>,
    options: Option<CompileOptions>,
) -> Result<String> {
    let options = convert(options)?;
    let base_path = base_path.map(PathBuf::from);

    compile_css(&input, base_path.as_deref(), options.as_ref())
        .map_err(|e| Error::from_reason(e.to_string()))
}

/// Compile a stylesheet read from a file (sync)
#[napi]
pub fn compile_file_sync(
    input_file: Option<String>,
    base_path: Option<String>,
    options: Option<CompileOptions>,
) -> Result<String> {
    let options = convert(options)?;
    let input_file = input_file.map(PathBuf::from);
    let base_path = base_path.map(PathBuf::from);

    compile_css_file(input_file.as_deref(), base_path.as_deref(), options.as_ref())
        .map_err(|e| Error::from_reason(e.to_string()))
}
