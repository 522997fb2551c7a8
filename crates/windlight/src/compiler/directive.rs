use super::utilities::UtilityTable;
use super::{CompiledStylesheet, Compiler, CompilerError};
use crate::sources::{Root, SourceEntry};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

const FRAMEWORK_INDEX: &str = include_str!("framework/index.css");
const FRAMEWORK_THEME: &str = include_str!("framework/theme.css");
const FRAMEWORK_PREFLIGHT: &str = include_str!("framework/preflight.css");
const FRAMEWORK_UTILITIES: &str = include_str!("framework/utilities.css");

/// Compiler for the Tailwind v4 directive surface.
///
/// Understands `@import "tailwindcss"` (with `source(…)` and `layer(…)`),
/// local `@import` inlining, `@source`, `@utility`, `@theme` and
/// `@tailwind utilities`. Utilities come from `@utility` definitions only.
pub struct DirectiveCompiler;

impl DirectiveCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectiveCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for DirectiveCompiler {
    fn compile(
        &self,
        css: &str,
        base: &Path,
        on_dependency: &mut dyn FnMut(&Path),
    ) -> Result<Box<dyn CompiledStylesheet>, CompilerError> {
        let mut expander = Expander {
            on_dependency,
            stack: Vec::new(),
            root: None,
            globs: Vec::new(),
            utilities: UtilityTable::new(),
        };
        let css = expander.expand(css, base)?;

        debug!(
            utilities = expander.utilities.len(),
            globs = expander.globs.len(),
            "compiled stylesheet"
        );

        Ok(Box::new(DirectiveStylesheet {
            css,
            root: expander.root.unwrap_or(Root::Unset),
            globs: expander.globs,
            utilities: expander.utilities,
        }))
    }
}

struct DirectiveStylesheet {
    css: String,
    root: Root,
    globs: Vec<SourceEntry>,
    utilities: UtilityTable,
}

impl CompiledStylesheet for DirectiveStylesheet {
    fn root(&self) -> &Root {
        &self.root
    }

    fn globs(&self) -> &[SourceEntry] {
        &self.globs
    }

    fn build(&mut self, candidates: &[String]) -> Result<String, CompilerError> {
        let marker = utilities_marker_regex();
        if !marker.is_match(&mask_comments(&self.css)) {
            return Ok(self.css.clone());
        }

        let generated = self.utilities.generate(candidates);
        rewrite(&self.css, marker, |_| Ok::<_, CompilerError>(generated.trim_end().to_string()))
    }
}

/// Walks a stylesheet and everything it imports, collecting directives
struct Expander<'a> {
    on_dependency: &'a mut dyn FnMut(&Path),
    /// Files currently being inlined, for cycle detection
    stack: Vec<PathBuf>,
    root: Option<Root>,
    globs: Vec<SourceEntry>,
    utilities: UtilityTable,
}

impl Expander<'_> {
    /// Expand `css`, whose relative paths resolve against `dir`
    fn expand(&mut self, css: &str, dir: &Path) -> Result<String, CompilerError> {
        let css = self.collect_utilities(css)?;

        let css = rewrite(&css, import_regex(), |caps| {
            let specifier = &caps[1];
            let modifiers = caps.get(2).map_or("", |m| m.as_str());
            self.inline_import(&caps[0], specifier, modifiers, dir)
        })?;

        let css = rewrite(&css, source_regex(), |caps| {
            let entry = SourceEntry::from_path_pattern(dir, &caps[2]);
            self.globs.push(if caps.get(1).is_some() { entry.negate() } else { entry });
            Ok::<_, CompilerError>(String::new())
        })?;

        rewrite(&css, theme_regex(), |_| Ok(":root, :host {".to_string()))
    }

    /// Remove `@utility` blocks from `css`, registering each one
    fn collect_utilities(&mut self, css: &str) -> Result<String, CompilerError> {
        let masked = mask_comments(css);
        let mut out = String::with_capacity(css.len());
        let mut last = 0;

        while let Some(caps) = utility_regex().captures_at(&masked, last) {
            let (Some(head), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let open = head.end();
            let close = matching_brace(&masked, open).ok_or_else(|| {
                CompilerError::CompileFailed(format!("Unclosed @utility {}", name.as_str()))
            })?;

            self.utilities.define(name.as_str(), &masked[open..close]);
            out.push_str(&css[last..head.start()]);
            last = close + 1;
        }

        out.push_str(&css[last..]);
        Ok(out)
    }

    fn inline_import(
        &mut self,
        statement: &str,
        specifier: &str,
        modifiers: &str,
        dir: &Path,
    ) -> Result<String, CompilerError> {
        if is_remote(specifier) {
            return Ok(statement.to_string());
        }

        let mut modifiers = modifiers.to_string();
        let layer = take_modifier(&mut modifiers, layer_regex());
        let source = take_modifier(&mut modifiers, source_modifier_regex());
        let media = modifiers.trim().to_string();

        let content = if let Some(stylesheet) = framework_stylesheet(specifier) {
            if let Some(source) = source {
                self.declare_root(&source, dir)?;
            }
            self.expand(stylesheet, dir)?
        } else {
            if source.is_some() {
                return Err(CompilerError::CompileFailed(format!(
                    "source(…) is only supported on framework imports, found on '{specifier}'"
                )));
            }
            self.inline_file(specifier, dir)?
        };

        Ok(wrap(content, layer.as_deref(), &media))
    }

    fn inline_file(&mut self, specifier: &str, dir: &Path) -> Result<String, CompilerError> {
        let path = resolve_import(specifier, dir)?.canonicalize()?;
        if self.stack.contains(&path) {
            return Err(CompilerError::ImportCycle(path));
        }

        let content = fs::read_to_string(&path)?;
        (self.on_dependency)(&path);
        debug!(path = %path.display(), "inlining import");

        let import_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
        self.stack.push(path);
        let expanded = self.expand(&content, &import_dir);
        self.stack.pop();
        expanded
    }

    /// Record a `source(…)` modifier. Only one may appear per compilation.
    fn declare_root(&mut self, source: &str, dir: &Path) -> Result<(), CompilerError> {
        if self.root.is_some() {
            return Err(CompilerError::CompileFailed(
                "source(…) can only be used once".to_string(),
            ));
        }

        let root = if source == "none" {
            Root::None
        } else {
            let path = source.trim_matches(|c| c == '"' || c == '\'');
            Root::Explicit(SourceEntry::all(normalize_dir(&dir.join(path))))
        };
        self.root = Some(root);
        Ok(())
    }
}

/// Replace every match of `regex` outside comments in `css` with the output of `replacement`
fn rewrite<E>(
    css: &str,
    regex: &Regex,
    mut replacement: impl FnMut(&Captures<'_>) -> Result<String, E>,
) -> Result<String, E> {
    let masked = mask_comments(css);
    let mut out = String::with_capacity(css.len());
    let mut last = 0;

    for caps in regex.captures_iter(&masked) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&css[last..whole.start()]);
        out.push_str(&replacement(&caps)?);
        last = whole.end();
    }

    out.push_str(&css[last..]);
    Ok(out)
}

/// Copy of `css` with every `/* … */` comment blanked to spaces.
///
/// Byte offsets are preserved, so matches found in the copy index the original.
fn mask_comments(css: &str) -> String {
    let mut masked = String::with_capacity(css.len());
    let mut rest = css;

    while let Some(start) = rest.find("/*") {
        masked.push_str(&rest[..start]);
        let end = rest[start + 2..].find("*/").map_or(rest.len(), |offset| start + 2 + offset + 2);
        masked.push_str(&" ".repeat(end - start));
        rest = &rest[end..];
    }

    masked.push_str(rest);
    masked
}

/// Remove the first match of `regex` from `modifiers`, returning its first group
fn take_modifier(modifiers: &mut String, regex: &Regex) -> Option<String> {
    let caps = regex.captures(modifiers)?;
    let range = caps.get(0)?.range();
    let value = caps.get(1)?.as_str().trim().to_string();
    modifiers.replace_range(range, "");
    Some(value)
}

fn wrap(content: String, layer: Option<&str>, media: &str) -> String {
    let content = match layer {
        Some(layer) if !layer.is_empty() => format!("@layer {layer} {{\n{}\n}}", content.trim()),
        _ => content,
    };
    if media.is_empty() {
        content
    } else {
        format!("@media {media} {{\n{}\n}}", content.trim())
    }
}

fn framework_stylesheet(specifier: &str) -> Option<&'static str> {
    match specifier {
        "tailwindcss" | "tailwindcss/index.css" => Some(FRAMEWORK_INDEX),
        "tailwindcss/theme" | "tailwindcss/theme.css" => Some(FRAMEWORK_THEME),
        "tailwindcss/preflight" | "tailwindcss/preflight.css" => Some(FRAMEWORK_PREFLIGHT),
        "tailwindcss/utilities" | "tailwindcss/utilities.css" => Some(FRAMEWORK_UTILITIES),
        _ => None,
    }
}

fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("http://")
        || specifier.starts_with("https://")
        || specifier.starts_with("//")
}

/// Resolve an import relative to `dir`, or through `node_modules` for bare specifiers
fn resolve_import(specifier: &str, dir: &Path) -> Result<PathBuf, CompilerError> {
    let relative = specifier.starts_with('.') || Path::new(specifier).is_absolute();
    let mut roots = vec![dir.to_path_buf()];
    if !relative {
        roots.extend(dir.ancestors().map(|ancestor| ancestor.join("node_modules")));
    }

    for root in roots {
        let candidate = root.join(specifier);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if candidate.extension().is_none() {
            let with_extension = candidate.with_extension("css");
            if with_extension.is_file() {
                return Ok(with_extension);
            }
        }
    }

    Err(CompilerError::UnresolvedImport {
        specifier: specifier.to_string(),
        base: dir.to_path_buf(),
    })
}

fn normalize_dir(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Byte offset of the `}` closing the block whose body starts at `open`
fn matching_brace(css: &str, open: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, byte) in css.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn import_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Examples:
        //   @import "tailwindcss" source(none);
        //   @import url('./base.css') layer(base);
        Regex::new(r#"@import\s+(?:url\(\s*)?['"]([^'"]+)['"]\s*\)?([^;]*);"#).unwrap()
    })
}

fn source_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"@source\s+(not\s+)?['"]([^'"]+)['"]\s*;"#).unwrap())
}

fn source_modifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"source\(\s*(none|'[^']*'|"[^"]*")\s*\)"#).unwrap())
}

fn layer_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"layer\(([^)]*)\)").unwrap())
}

fn utility_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@utility\s+([A-Za-z0-9_-]+)\s*\{").unwrap())
}

fn theme_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@theme\b[^{;]*\{").unwrap())
}

fn utilities_marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@tailwind\s+utilities\s*;").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn compile(css: &str, base: &Path) -> (Box<dyn CompiledStylesheet>, Vec<PathBuf>) {
        let mut dependencies = Vec::new();
        let stylesheet = DirectiveCompiler::new()
            .compile(css, base, &mut |path: &Path| dependencies.push(path.to_path_buf()))
            .unwrap();
        (stylesheet, dependencies)
    }

    #[test]
    fn test_framework_import_without_source_is_unset() {
        let dir = tempdir().unwrap();
        let (mut stylesheet, dependencies) = compile(r#"@import "tailwindcss";"#, dir.path());

        assert_eq!(stylesheet.root(), &Root::Unset);
        assert!(stylesheet.globs().is_empty());
        assert!(dependencies.is_empty());

        let css = stylesheet.build(&[]).unwrap();
        assert!(css.contains("@layer theme, base, components, utilities;"));
        assert!(css.contains("@layer base {"));
        assert!(!css.contains("@tailwind"));
        assert!(!css.contains("@theme"));
    }

    #[test]
    fn test_source_none_disables_detection() {
        let dir = tempdir().unwrap();
        let (stylesheet, _) = compile(r#"@import "tailwindcss" source(none);"#, dir.path());
        assert_eq!(stylesheet.root(), &Root::None);
    }

    #[test]
    fn test_source_path_is_explicit_root() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        let (stylesheet, _) = compile(r#"@import "tailwindcss" source("./src");"#, dir.path());
        let expected = SourceEntry::all(dir.path().join("src").canonicalize().unwrap());
        assert_eq!(stylesheet.root(), &Root::Explicit(expected));
    }

    #[test]
    fn test_source_used_twice_fails() {
        let dir = tempdir().unwrap();
        let css = r#"
@import "tailwindcss/theme" source(none);
@import "tailwindcss/utilities" source("./src");
"#;
        let result = DirectiveCompiler::new().compile(css, dir.path(), &mut |_: &Path| {});
        assert!(matches!(result, Err(CompilerError::CompileFailed(_))));
    }

    #[test]
    fn test_source_directives_become_globs() {
        let dir = tempdir().unwrap();
        let css = r#"
@import "tailwindcss";
@source "../templates/**/*.html";
@source not "./legacy/**";
"#;
        let (mut stylesheet, _) = compile(css, &dir.path().join("styles"));

        assert_eq!(stylesheet.globs().len(), 2);
        assert_eq!(stylesheet.globs()[0].base, dir.path().join("templates"));
        assert_eq!(stylesheet.globs()[0].pattern, "**/*.html");
        assert!(!stylesheet.globs()[0].negated);
        assert!(stylesheet.globs()[1].negated);
        assert!(!stylesheet.build(&[]).unwrap().contains("@source"));
    }

    #[test]
    fn test_local_imports_report_dependencies() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/buttons.css"), ".btn { color: red; }").unwrap();
        fs::write(
            dir.path().join("components.css"),
            "@import './partials/buttons' layer(components);\n.card { padding: 1rem; }",
        )
        .unwrap();

        let (mut stylesheet, dependencies) = compile(r#"@import "./components.css";"#, dir.path());

        assert_eq!(dependencies.len(), 2);
        assert!(dependencies[0].ends_with("components.css"));
        assert!(dependencies[1].ends_with("partials/buttons.css"));

        let css = stylesheet.build(&[]).unwrap();
        assert!(css.contains("@layer components {\n.btn { color: red; }\n}"));
        assert!(css.contains(".card { padding: 1rem; }"));
    }

    #[test]
    fn test_unresolved_import_fails() {
        let dir = tempdir().unwrap();
        let result = DirectiveCompiler::new().compile(r#"@import "./missing.css";"#, dir.path(), &mut |_: &Path| {});
        assert!(matches!(result, Err(CompilerError::UnresolvedImport { .. })));
    }

    #[test]
    fn test_import_cycle_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.css"), r#"@import "./b.css";"#).unwrap();
        fs::write(dir.path().join("b.css"), r#"@import "./a.css";"#).unwrap();

        let result = DirectiveCompiler::new().compile(r#"@import "./a.css";"#, dir.path(), &mut |_: &Path| {});
        assert!(matches!(result, Err(CompilerError::ImportCycle(_))));
    }

    #[test]
    fn test_remote_import_is_kept() {
        let dir = tempdir().unwrap();
        let css = r#"@import url("https://fonts.example.com/inter.css");"#;
        let (mut stylesheet, _) = compile(css, dir.path());
        assert_eq!(stylesheet.build(&[]).unwrap(), css);
    }

    #[test]
    fn test_build_emits_used_utilities() {
        let dir = tempdir().unwrap();
        let css = r#"
@import "tailwindcss";
@utility content-auto {
  content-visibility: auto;
}
@utility unused-utility { color: red; }
"#;
        let (mut stylesheet, _) = compile(css, dir.path());
        let output = stylesheet
            .build(&["content-auto".to_string(), "hover:content-auto".to_string()])
            .unwrap();

        assert!(output.contains(".content-auto {\n  content-visibility: auto;\n}"));
        assert!(output.contains(".hover\\:content-auto:hover {"));
        assert!(!output.contains("unused-utility"));
        assert!(!output.contains("@utility"));
    }

    #[test]
    fn test_without_marker_build_returns_stylesheet() {
        let dir = tempdir().unwrap();
        let css = "@utility content-auto { content-visibility: auto; }\n.a { color: red; }";
        let (mut stylesheet, _) = compile(css, dir.path());

        let output = stylesheet.build(&["content-auto".to_string()]).unwrap();
        assert_eq!(output.trim(), ".a { color: red; }");
    }

    #[test]
    fn test_unclosed_utility_fails() {
        let dir = tempdir().unwrap();
        let result = DirectiveCompiler::new().compile("@utility broken { color: red;", dir.path(), &mut |_: &Path| {});
        assert!(matches!(result, Err(CompilerError::CompileFailed(_))));
    }

    #[test]
    fn test_theme_rewritten_to_root() {
        let dir = tempdir().unwrap();
        let (mut stylesheet, _) = compile("@theme inline { --color-brand: #0af; }", dir.path());
        assert_eq!(stylesheet.build(&[]).unwrap(), ":root, :host { --color-brand: #0af; }");
    }

    #[test]
    fn test_mask_comments_keeps_offsets() {
        let css = "a /* b */ c /* unterminated";
        let masked = mask_comments(css);

        assert_eq!(masked.len(), css.len());
        assert_eq!(masked.trim_end(), "a         c");
    }

    #[test]
    fn test_commented_import_is_ignored() {
        let dir = tempdir().unwrap();
        let css = "/* @import \"./old.css\"; */\n@import \"tailwindcss\";";
        let (mut stylesheet, dependencies) = compile(css, dir.path());

        assert!(dependencies.is_empty());
        let output = stylesheet.build(&[]).unwrap();
        assert!(output.starts_with("/* @import \"./old.css\"; */"));
        assert!(output.contains("@layer base {"));
    }

    #[test]
    fn test_commented_source_adds_no_glob() {
        let dir = tempdir().unwrap();
        let css = "@import \"tailwindcss\" source(none);\n/* @source \"./\"; */";
        let (stylesheet, _) = compile(css, dir.path());

        assert_eq!(stylesheet.root(), &Root::None);
        assert!(stylesheet.globs().is_empty());
    }

    #[test]
    fn test_commented_utility_is_not_defined() {
        let dir = tempdir().unwrap();
        let css = "@tailwind utilities;\n/* @utility ghost { color: red; } */";
        let (mut stylesheet, _) = compile(css, dir.path());

        let output = stylesheet.build(&["ghost".to_string()]).unwrap();
        assert!(!output.contains(".ghost"));
        assert!(output.contains("/* @utility ghost { color: red; } */"));
    }
}
