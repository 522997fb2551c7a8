use rustc_hash::FxHashMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    PseudoClass(&'static str),
    Media(&'static str),
}

fn variant(name: &str) -> Option<Variant> {
    let variant = match name {
        "hover" => Variant::PseudoClass(":hover"),
        "focus" => Variant::PseudoClass(":focus"),
        "focus-visible" => Variant::PseudoClass(":focus-visible"),
        "focus-within" => Variant::PseudoClass(":focus-within"),
        "active" => Variant::PseudoClass(":active"),
        "visited" => Variant::PseudoClass(":visited"),
        "disabled" => Variant::PseudoClass(":disabled"),
        "first" => Variant::PseudoClass(":first-child"),
        "last" => Variant::PseudoClass(":last-child"),
        "odd" => Variant::PseudoClass(":nth-child(odd)"),
        "even" => Variant::PseudoClass(":nth-child(even)"),
        "sm" => Variant::Media("(width >= 40rem)"),
        "md" => Variant::Media("(width >= 48rem)"),
        "lg" => Variant::Media("(width >= 64rem)"),
        "xl" => Variant::Media("(width >= 80rem)"),
        "2xl" => Variant::Media("(width >= 96rem)"),
        "dark" => Variant::Media("(prefers-color-scheme: dark)"),
        _ => return None,
    };
    Some(variant)
}

/// A candidate split into its variants, utility name and importance
#[derive(Debug, PartialEq)]
struct ParsedCandidate<'a> {
    variants: Vec<Variant>,
    utility: &'a str,
    important: bool,
}

fn parse_candidate(candidate: &str) -> Option<ParsedCandidate<'_>> {
    let mut parts: Vec<&str> = candidate.split(':').collect();
    let last = parts.pop()?;

    let (utility, important) = if let Some(name) = last.strip_suffix('!') {
        (name, true)
    } else if let Some(name) = last.strip_prefix('!') {
        (name, true)
    } else {
        (last, false)
    };

    if utility.is_empty() {
        return None;
    }

    let variants = parts.into_iter().map(variant).collect::<Option<Vec<_>>>()?;
    Some(ParsedCandidate { variants, utility, important })
}

/// Utilities declared with `@utility name { … }`, in definition order
#[derive(Debug, Clone, Default)]
pub struct UtilityTable {
    /// Declaration bodies, indexed through `index`
    bodies: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl UtilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a utility. Redefining a name replaces its body but keeps its position.
    pub fn define(&mut self, name: &str, body: &str) {
        let body = body.trim().to_string();
        match self.index.get(name) {
            Some(&position) => self.bodies[position] = body,
            None => {
                self.index.insert(name.to_string(), self.bodies.len());
                self.bodies.push(body);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Emit one rule per candidate that names a known utility.
    ///
    /// Rules without variants come first, then by utility definition order,
    /// then by candidate text.
    pub fn generate(&self, candidates: &[String]) -> String {
        let mut matched: Vec<(usize, usize, &str, ParsedCandidate<'_>)> = candidates
            .iter()
            .filter_map(|candidate| {
                let parsed = parse_candidate(candidate)?;
                let position = *self.index.get(parsed.utility)?;
                Some((parsed.variants.len(), position, candidate.as_str(), parsed))
            })
            .collect();
        matched.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        matched.dedup_by(|a, b| a.2 == b.2);

        let mut css = String::new();
        for (_, position, candidate, parsed) in &matched {
            render_rule(&mut css, candidate, parsed, &self.bodies[*position]);
        }
        css
    }
}

fn render_rule(css: &mut String, candidate: &str, parsed: &ParsedCandidate<'_>, body: &str) {
    let mut selector = format!(".{}", escape_class(candidate));
    let mut media = Vec::new();
    for variant in &parsed.variants {
        match variant {
            Variant::PseudoClass(pseudo) => selector.push_str(pseudo),
            Variant::Media(query) => media.push(*query),
        }
    }

    let mut depth = 0;
    for query in &media {
        let _ = writeln!(css, "{}@media {query} {{", indent(depth));
        depth += 1;
    }

    let _ = writeln!(css, "{}{selector} {{", indent(depth));
    for line in declarations(body, parsed.important) {
        let _ = writeln!(css, "{}{line}", indent(depth + 1));
    }
    let _ = writeln!(css, "{}}}", indent(depth));

    while depth > 0 {
        depth -= 1;
        let _ = writeln!(css, "{}}}", indent(depth));
    }
}

fn declarations(body: &str, important: bool) -> Vec<String> {
    // Nested rules are emitted verbatim
    if body.contains('{') {
        return body.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
    }

    body.split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .map(|decl| {
            if important && !decl.ends_with("!important") {
                format!("{decl} !important;")
            } else {
                format!("{decl};")
            }
        })
        .collect()
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Escape a class name for use in a selector, following `CSS.escape`
pub fn escape_class(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 8);
    let first = name.chars().next();

    for (i, ch) in name.chars().enumerate() {
        if ch == '\0' {
            escaped.push('\u{FFFD}');
        } else if ch.is_ascii_digit() && (i == 0 || (i == 1 && first == Some('-'))) {
            let _ = write!(escaped, "\\{:x} ", ch as u32);
        } else if i == 0 && ch == '-' && name.len() == 1 {
            escaped.push_str("\\-");
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            escaped.push(ch);
        } else {
            escaped.push('\\');
            escaped.push(ch);
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> UtilityTable {
        let mut table = UtilityTable::new();
        table.define("content-auto", "content-visibility: auto;");
        table.define("scroll-snap", "scroll-snap-type: x mandatory; scroll-behavior: smooth");
        table
    }

    fn candidates(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_escape_class() {
        assert_eq!(escape_class("content-auto"), "content-auto");
        assert_eq!(escape_class("hover:content-auto"), "hover\\:content-auto");
        assert_eq!(escape_class("w-1/2"), "w-1\\/2");
        assert_eq!(escape_class("2xl:flex"), "\\32 xl\\:flex");
        assert_eq!(escape_class("-"), "\\-");
        assert_eq!(escape_class("flex!"), "flex\\!");
    }

    #[test]
    fn test_parse_candidate_variants() {
        let parsed = parse_candidate("md:hover:content-auto").unwrap();
        assert_eq!(parsed.utility, "content-auto");
        assert_eq!(parsed.variants, vec![Variant::Media("(width >= 48rem)"), Variant::PseudoClass(":hover")]);
        assert!(!parsed.important);
    }

    #[test]
    fn test_parse_candidate_important() {
        assert!(parse_candidate("content-auto!").unwrap().important);
        assert!(parse_candidate("!content-auto").unwrap().important);
        assert!(parse_candidate("unknown:content-auto").is_none());
        assert!(parse_candidate("hover:").is_none());
    }

    #[test]
    fn test_generate_plain_utility() {
        let css = table().generate(&candidates(&["content-auto", "unrelated"]));
        assert_eq!(css, ".content-auto {\n  content-visibility: auto;\n}\n");
    }

    #[test]
    fn test_generate_orders_by_variants_then_definition() {
        let css = table().generate(&candidates(&["hover:content-auto", "scroll-snap", "content-auto"]));

        let plain = css.find(".content-auto {").unwrap();
        let snap = css.find(".scroll-snap {").unwrap();
        let hover = css.find(".hover\\:content-auto:hover {").unwrap();
        assert!(plain < snap);
        assert!(snap < hover);
        assert!(css.contains("scroll-behavior: smooth;"));
    }

    #[test]
    fn test_generate_media_variant_and_important() {
        let css = table().generate(&candidates(&["sm:content-auto!"]));
        assert_eq!(
            css,
            "@media (width >= 40rem) {\n  .sm\\:content-auto\\! {\n    content-visibility: auto !important;\n  }\n}\n"
        );
    }

    #[test]
    fn test_redefine_keeps_position() {
        let mut table = table();
        table.define("content-auto", "content-visibility: hidden;");

        assert_eq!(table.len(), 2);
        let css = table.generate(&candidates(&["scroll-snap", "content-auto"]));
        assert!(css.starts_with(".content-auto {\n  content-visibility: hidden;"));
    }
}
