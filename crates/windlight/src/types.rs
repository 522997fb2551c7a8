use crate::compiler::CompilerError;
use crate::optimizer::TransformError;
use crate::scanner::ScanError;
use lightningcss::targets::Features;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Input used when neither a stylesheet nor an input file is given
pub const DEFAULT_INPUT: &str = "\n@import \"tailwindcss\";\n";

/// Encode a browser version the way Lightning CSS expects it: `major.minor.patch`
/// packed into the low three bytes of a `u32`.
pub const fn browser_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 16) | (minor << 8) | patch
}

/// Options accepted by the compile entry points.
///
/// `disable_transforms` and `transform_twice` only steer the pipeline; the
/// transform engine only ever receives [`TransformOptions`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Options handed to the transform engine
    #[serde(flatten)]
    pub transform: TransformOptions,

    /// Skip the Lightning CSS pass entirely. Transforms are enabled by default.
    #[serde(default)]
    pub disable_transforms: bool,

    /// Run the Lightning CSS pass twice, feeding the first output into the second.
    /// Nested rules merge more completely on the second pass. Single pass by default.
    #[serde(default)]
    pub transform_twice: bool,
}

impl CompilerOptions {
    /// Separate the engine options from the pipeline-only flags
    pub fn split(&self) -> (&TransformOptions, PipelineFlags) {
        (
            &self.transform,
            PipelineFlags {
                disable_transforms: self.disable_transforms,
                transform_twice: self.transform_twice,
            },
        )
    }
}

/// Pipeline-only switches stripped from [`CompilerOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineFlags {
    pub disable_transforms: bool,
    pub transform_twice: bool,
}

/// Options for the Lightning CSS transform.
///
/// `Default` yields the tuned process-wide defaults. A deserialized options
/// object replaces them wholesale: keys it leaves out fall back to the
/// engine's neutral values, not to the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default = "TransformOptions::neutral")]
pub struct TransformOptions {
    pub minify: bool,

    /// Accepted for compatibility. The pipeline returns CSS text only, so no
    /// map is produced.
    pub source_map: bool,

    pub drafts: Drafts,

    pub non_standard: NonStandard,

    /// Feature bits to always compile, regardless of targets
    pub include: u32,

    /// Feature bits to never compile, regardless of targets
    pub exclude: u32,

    pub targets: BrowserTargets,

    pub error_recovery: bool,
}

impl TransformOptions {
    /// Options with every switch off and no browser targets
    pub fn neutral() -> Self {
        Self {
            minify: false,
            source_map: false,
            drafts: Drafts::default(),
            non_standard: NonStandard::default(),
            include: 0,
            exclude: 0,
            targets: BrowserTargets::default(),
            error_recovery: false,
        }
    }

    /// Reject feature bits that Lightning CSS does not define
    pub fn validate(&self) -> Result<(), WindlightError> {
        for (key, bits) in [("include", self.include), ("exclude", self.exclude)] {
            if Features::from_bits(bits).is_none() {
                return Err(WindlightError::Config(format!(
                    "unknown feature bits in '{key}': {bits:#x}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            minify: false,
            source_map: false,
            drafts: Drafts { custom_media: true },
            non_standard: NonStandard { deep_selector_combinator: true },
            include: Features::Nesting.bits(),
            exclude: (Features::LogicalProperties | Features::DirSelector).bits(),
            targets: BrowserTargets {
                safari: Some(browser_version(16, 4, 0)),
                ios_saf: Some(browser_version(16, 4, 0)),
                firefox: Some(browser_version(128, 0, 0)),
                chrome: Some(browser_version(111, 0, 0)),
                ..BrowserTargets::default()
            },
            error_recovery: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Drafts {
    /// Parse `@custom-media` rules
    pub custom_media: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NonStandard {
    /// Parse the `>>>` and `/deep/` selector combinators
    pub deep_selector_combinator: bool,
}

/// Minimum browser versions, encoded with [`browser_version`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserTargets {
    pub android: Option<u32>,
    pub chrome: Option<u32>,
    pub edge: Option<u32>,
    pub firefox: Option<u32>,
    pub ie: Option<u32>,
    pub ios_saf: Option<u32>,
    pub opera: Option<u32>,
    pub safari: Option<u32>,
    pub samsung: Option<u32>,
}

impl BrowserTargets {
    /// Set a target by its Lightning CSS browser name.
    /// Returns `false` when the name is not a known browser.
    pub fn set(&mut self, browser: &str, version: u32) -> bool {
        let slot = match browser {
            "android" => &mut self.android,
            "chrome" => &mut self.chrome,
            "edge" => &mut self.edge,
            "firefox" => &mut self.firefox,
            "ie" => &mut self.ie,
            "ios_saf" => &mut self.ios_saf,
            "opera" => &mut self.opera,
            "safari" => &mut self.safari,
            "samsung" => &mut self.samsung,
            _ => return false,
        };
        *slot = Some(version);
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Error types for windlight operations
#[derive(Error, Debug)]
pub enum WindlightError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompilerError),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Config file structure for windlight.json / windlight.jsonc
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,

    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub base: Option<PathBuf>,

    #[serde(default)]
    pub options: Option<CompilerOptions>,
}
