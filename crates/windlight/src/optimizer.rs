//! Lightning CSS post-processing with a single-slot memo.

use crate::types::{BrowserTargets, CompilerOptions, TransformOptions};
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};
use thiserror::Error;
use tracing::debug;

/// Filename reported to the transform engine when the CSS did not come from a file
pub const DEFAULT_FILENAME: &str = "input.css";

/// Error types for the transform engine
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Minify(String),

    #[error("{0}")]
    Print(String),
}

/// A CSS transform engine
pub trait Transformer {
    fn transform(
        &self,
        css: &str,
        options: &TransformOptions,
        filename: &str,
    ) -> Result<String, TransformError>;
}

/// Transformer backed by Lightning CSS
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningTransformer;

impl LightningTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for LightningTransformer {
    fn transform(
        &self,
        css: &str,
        options: &TransformOptions,
        filename: &str,
    ) -> Result<String, TransformError> {
        let parser_options = ParserOptions {
            filename: filename.to_string(),
            flags: parser_flags(options),
            error_recovery: options.error_recovery,
            ..ParserOptions::default()
        };
        let mut stylesheet = StyleSheet::parse(css, parser_options)
            .map_err(|e| TransformError::Parse(e.to_string()))?;

        stylesheet
            .minify(MinifyOptions { targets: targets(options), ..MinifyOptions::default() })
            .map_err(|e| TransformError::Minify(e.to_string()))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: options.minify,
                targets: targets(options),
                ..PrinterOptions::default()
            })
            .map_err(|e| TransformError::Print(e.to_string()))?;

        Ok(result.code)
    }
}

fn parser_flags(options: &TransformOptions) -> ParserFlags {
    let mut flags = ParserFlags::empty();
    if options.drafts.custom_media {
        flags |= ParserFlags::CUSTOM_MEDIA;
    }
    if options.non_standard.deep_selector_combinator {
        flags |= ParserFlags::DEEP_SELECTOR_COMBINATOR;
    }
    flags
}

fn targets(options: &TransformOptions) -> Targets {
    Targets {
        browsers: browsers(&options.targets),
        include: Features::from_bits_truncate(options.include),
        exclude: Features::from_bits_truncate(options.exclude),
    }
}

fn browsers(targets: &BrowserTargets) -> Option<Browsers> {
    if targets.is_empty() {
        return None;
    }

    Some(Browsers {
        android: targets.android,
        chrome: targets.chrome,
        edge: targets.edge,
        firefox: targets.firefox,
        ie: targets.ie,
        ios_saf: targets.ios_saf,
        opera: targets.opera,
        safari: targets.safari,
        samsung: targets.samsung,
    })
}

/// The most recent input to the transform engine and its output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Previous {
    pub css: String,
    pub optimized_css: String,
}

/// Runs generated CSS through a [`Transformer`], skipping the engine when the
/// input is identical to the previous call's
pub struct PostProcessor<T: Transformer> {
    transformer: T,
    previous: Previous,
}

impl<T: Transformer> PostProcessor<T> {
    pub fn new(transformer: T) -> Self {
        Self { transformer, previous: Previous::default() }
    }

    /// Post-process `raw`.
    ///
    /// Absent options mean transforms are enabled with the default options.
    pub fn process(
        &mut self,
        raw: String,
        options: Option<&CompilerOptions>,
        filename: &str,
    ) -> Result<String, TransformError> {
        let defaults;
        let options = match options {
            Some(options) => options,
            None => {
                defaults = CompilerOptions::default();
                &defaults
            }
        };
        let (transform_options, flags) = options.split();

        if flags.disable_transforms {
            return Ok(raw);
        }

        if raw == self.previous.css {
            debug!("generated CSS unchanged, reusing optimized output");
            return Ok(self.previous.optimized_css.clone());
        }

        let mut optimized = self.transformer.transform(&raw, transform_options, filename)?;
        if flags.transform_twice {
            // Adjacent rules only merge once nesting has been flattened
            optimized = self.transformer.transform(&optimized, transform_options, filename)?;
        }

        self.previous = Previous { css: raw, optimized_css: optimized.clone() };
        Ok(optimized)
    }

    pub fn previous(&self) -> &Previous {
        &self.previous
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }
}
