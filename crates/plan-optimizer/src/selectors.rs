//! Fallback selector derivation
//!
//! Candidates are ordered by how stable they tend to be across page
//! revisions: identifier attribute, name attribute, accessibility label,
//! visible text, then structural position.

use once_cell::sync::Lazy;
use plan_ir::ElementHint;
use regex::Regex;

static OPENING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<([A-Za-z][A-Za-z0-9-]*)([^>]*)>").expect("opening tag regex"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][A-Za-z0-9_:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex")
});
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static CSS_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("ident regex"));
static PSEUDO_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"::?[A-Za-z-]+(?:\([^)]*\))?").expect("pseudo-class regex")
});

/// Longest visible text still used as a text selector
const MAX_TEXT_SELECTOR_LEN: usize = 50;

/// Collapses whitespace runs outside quoted sections and trims the ends
pub fn normalize_selector(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for c in selector.trim().chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = true,
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Ordered, de-duplicated alternatives to `primary`, never including it
pub fn fallback_candidates(primary: &str, element: Option<&ElementHint>) -> Vec<String> {
    let mut candidates = Vec::new();

    match element {
        Some(hint) => {
            if let Some(html) = hint.html.as_deref() {
                candidates.extend(from_markup(html));
            }
            if let Some(path) = hint.dom_path.as_deref() {
                candidates.push(normalize_selector(path));
            }
        }
        None => candidates.extend(structural_variants(primary)),
    }

    let mut seen = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.is_empty() || candidate == primary || seen.contains(&candidate) {
            continue;
        }
        seen.push(candidate);
    }
    seen
}

fn from_markup(html: &str) -> Vec<String> {
    let Some(tag) = OPENING_TAG.captures(html) else {
        return Vec::new();
    };
    let tag_name = tag[1].to_ascii_lowercase();
    let attrs = attributes(&tag[2]);
    let attr = |name: &str| {
        attrs
            .iter()
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    };

    let mut out = Vec::new();
    if let Some(id) = attr("id") {
        if CSS_IDENT.is_match(&id) {
            out.push(format!("#{id}"));
        } else {
            out.push(format!("[id=\"{}\"]", escape(&id)));
        }
    }
    if let Some(test_id) = attr("data-testid") {
        out.push(format!("[data-testid=\"{}\"]", escape(&test_id)));
    }
    if let Some(name) = attr("name") {
        out.push(format!("{tag_name}[name=\"{}\"]", escape(&name)));
    }
    if let Some(label) = attr("aria-label") {
        out.push(format!("[aria-label=\"{}\"]", escape(&label)));
    }
    if let Some(text) = visible_text(html) {
        out.push(format!("text=\"{}\"", escape(&text)));
    }
    out
}

fn attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|cap| {
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (cap[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn visible_text(html: &str) -> Option<String> {
    let stripped = ANY_TAG.replace_all(html, " ");
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() || text.chars().count() > MAX_TEXT_SELECTOR_LEN {
        None
    } else {
        Some(text)
    }
}

fn structural_variants(primary: &str) -> Vec<String> {
    if is_engine_selector(primary) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let without_pseudo = normalize_selector(&PSEUDO_CLASS.replace_all(primary, ""));
    if !without_pseudo.is_empty() {
        out.push(without_pseudo.clone());
    }
    if without_pseudo.contains('>') {
        let relaxed: Vec<&str> = without_pseudo
            .split('>')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        out.push(relaxed.join(" "));
    }
    out
}

/// Playwright engine-prefixed selectors are not CSS and have no variants
fn is_engine_selector(selector: &str) -> bool {
    ["text=", "xpath=", "role=", "//"]
        .iter()
        .any(|prefix| selector.starts_with(prefix))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
