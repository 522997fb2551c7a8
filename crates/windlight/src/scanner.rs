use crate::sources::SourceEntry;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Extensions of files that never contain candidates
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "ico", "bmp", "tiff", "woff", "woff2", "ttf",
    "otf", "eot", "mp3", "mp4", "webm", "ogg", "wav", "pdf", "zip", "gz", "tar", "br", "wasm",
    "exe", "dll", "so", "dylib", "bin", "lockb",
];

/// Stylesheets are inputs, not candidate sources
const STYLESHEET_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];

/// Package manager lock files
const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lock",
    "bun.lockb",
    "Cargo.lock",
    "composer.lock",
    "Gemfile.lock",
];

/// Longest token considered a candidate
const MAX_CANDIDATE_LEN: usize = 256;

/// Error types for scanning
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid source pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// A source entry with its pattern compiled
struct CompiledSource {
    base: PathBuf,
    matcher: GlobSet,
}

impl CompiledSource {
    fn new(entry: &SourceEntry) -> Result<Self, ScanError> {
        let glob = GlobBuilder::new(&entry.pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| ScanError::Glob { pattern: entry.pattern.clone(), source })?;

        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let matcher = builder
            .build()
            .map_err(|source| ScanError::Glob { pattern: entry.pattern.clone(), source })?;

        Ok(Self { base: entry.base.clone(), matcher })
    }

    fn matches(&self, path: &Path) -> bool {
        path.strip_prefix(&self.base).is_ok_and(|relative| self.matcher.is_match(relative))
    }
}

/// Scans source files for class-name-like candidates
pub struct Scanner {
    sources: Vec<CompiledSource>,
    excluded: Vec<CompiledSource>,
    files: Vec<PathBuf>,
}

impl Scanner {
    /// Compile the patterns of `sources`. Negated entries exclude files from every source.
    pub fn new(sources: &[SourceEntry]) -> Result<Self, ScanError> {
        let mut included = Vec::new();
        let mut excluded = Vec::new();

        for entry in sources {
            let compiled = CompiledSource::new(entry)?;
            if entry.negated {
                excluded.push(compiled);
            } else {
                included.push(compiled);
            }
        }

        Ok(Self { sources: included, excluded, files: Vec::new() })
    }

    /// Walk every source and return the sorted, deduplicated candidate list
    pub fn scan(&mut self) -> Vec<String> {
        let files = self.collect_files();

        let found: FxHashSet<String> = files
            .par_iter()
            .flat_map_iter(|path| match fs::read(path) {
                Ok(bytes) => extract_candidates(&String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    Vec::new()
                }
            })
            .collect();

        let mut candidates: Vec<String> = found.into_iter().collect();
        candidates.sort_unstable();

        debug!(files = files.len(), candidates = candidates.len(), "scan finished");
        self.files = files;
        candidates
    }

    /// Files visited by the last [`Scanner::scan`], sorted
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn collect_files(&self) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();

        for source in &self.sources {
            if !source.base.is_dir() {
                debug!(base = %source.base.display(), "source base is not a directory");
                continue;
            }

            let mut walker_builder = WalkBuilder::new(&source.base);
            walker_builder.hidden(false).git_ignore(true).require_git(false);

            // Always exclude node_modules and VCS directories during traversal
            let mut overrides = OverrideBuilder::new(&source.base);
            overrides.add("!**/node_modules/").ok();
            overrides.add("!**/.git/").ok();
            if let Ok(built) = overrides.build() {
                walker_builder.overrides(built);
            }

            for entry in walker_builder.build().flatten() {
                let path = entry.path();

                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                if is_ignored_file(path) || !source.matches(path) {
                    continue;
                }

                if self.excluded.iter().any(|excluded| excluded.matches(path)) {
                    continue;
                }

                seen.insert(path.to_path_buf());
            }
        }

        let mut files: Vec<PathBuf> = seen.into_iter().collect();
        files.sort();
        files
    }
}

fn is_ignored_file(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if LOCK_FILES.contains(&name.as_ref()) {
        return true;
    }

    match path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) {
        Some(ext) => {
            BINARY_EXTENSIONS.contains(&ext.as_str()) || STYLESHEET_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Get the compiled regex for candidate tokens (compiled once, cached)
fn candidate_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Matches runs of characters that may appear in a class name
        // Examples:
        //   content-auto
        //   md:hover:underline
        //   w-1/2  grid-cols-[1fr_2fr]  text-[#0af]  flex!
        Regex::new(r"[A-Za-z0-9_!\-:./\[\]%#@]+").unwrap()
    })
}

/// Extract class-name-like tokens from file content
pub fn extract_candidates(content: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for token in candidate_regex().find_iter(content) {
        let token = token.as_str().trim_end_matches(['.', ':', '/']).trim_start_matches('.');

        if token.is_empty() || token.len() > MAX_CANDIDATE_LEN {
            continue;
        }

        if !token.bytes().any(|b| b.is_ascii_alphabetic()) {
            continue;
        }

        candidates.push(token.to_string());
    }

    candidates
}
