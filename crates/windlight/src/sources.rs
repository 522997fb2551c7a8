use std::path::{Component, Path, PathBuf};

/// Pattern scanned when no explicit root is declared
pub const DEFAULT_PATTERN: &str = "**/*";

/// A directory plus the glob (relative to it) whose files are scanned for candidates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceEntry {
    pub base: PathBuf,
    pub pattern: String,
    /// Excludes matching files instead of adding them (`@source not "…"`)
    pub negated: bool,
}

impl SourceEntry {
    pub fn new(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self { base: base.into(), pattern: pattern.into(), negated: false }
    }

    /// Every file below `base`
    pub fn all(base: impl Into<PathBuf>) -> Self {
        Self::new(base, DEFAULT_PATTERN)
    }

    /// Build an entry from a path or glob written relative to `base`.
    ///
    /// An existing directory scans everything beneath it. Otherwise the
    /// longest glob-free prefix becomes the base and the rest the pattern.
    pub fn from_path_pattern(base: &Path, raw: &str) -> Self {
        let joined = base.join(raw);
        if joined.is_dir() {
            return Self::all(normalize(&joined));
        }

        let mut static_base = PathBuf::new();
        let mut rest = Vec::new();
        for component in Path::new(raw).components() {
            let text = component.as_os_str().to_string_lossy();
            if rest.is_empty() && !is_glob(&text) {
                static_base.push(component);
            } else {
                rest.push(text.into_owned());
            }
        }

        if rest.is_empty() {
            // A plain file path: scan exactly that file
            let file = normalize(&joined);
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
            return Self::new(parent, escape_glob(&name));
        }

        Self::new(normalize(&base.join(static_base)), rest.join("/"))
    }

    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }
}

/// Where the compiler wants candidates scanned from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// Automatic source detection is disabled
    None,
    /// Nothing declared: scan the fallback base
    Unset,
    /// Scan exactly this entry
    Explicit(SourceEntry),
}

/// Compute the ordered list of scan sources for a compiled stylesheet
pub fn resolve_sources(root: &Root, globs: &[SourceEntry], fallback_base: &Path) -> Vec<SourceEntry> {
    let mut sources = match root {
        Root::None => Vec::new(),
        Root::Unset => vec![SourceEntry::all(fallback_base)],
        Root::Explicit(entry) => vec![entry.clone()],
    };
    sources.extend(globs.iter().cloned());
    sources
}

fn is_glob(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

fn escape_glob(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '{' | '}') {
            escaped.push('[');
            escaped.push(ch);
            escaped.push(']');
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
