//! Built-in sanitizers.
//!
//! Every function here is pure: untrusted text in, safe text out. They are
//! wired into argument schemas through [`Sanitizer`](crate::args::Sanitizer).

use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style)[^>]*>.*?</(?:script|style)\s*>").expect("script regex")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").expect("tag regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n\t ]+").expect("whitespace regex"));
static OCTET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("octet regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)([^<>]*?)(/?)>").expect("html tag regex")
});
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z][A-Za-z0-9_-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+)"#).expect("attr regex")
});

/// Tags `filter_post_kses` keeps, with the attributes each may carry.
const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("a",          &["href", "title", "rel", "target"]),
    ("abbr",       &["title"]),
    ("b",          &[]),
    ("blockquote", &["cite"]),
    ("br",         &[]),
    ("code",       &[]),
    ("del",        &["datetime"]),
    ("div",        &["class"]),
    ("em",         &[]),
    ("h1",         &[]),
    ("h2",         &[]),
    ("h3",         &[]),
    ("h4",         &[]),
    ("h5",         &[]),
    ("h6",         &[]),
    ("hr",         &[]),
    ("i",          &[]),
    ("img",        &["src", "alt", "title", "width", "height"]),
    ("li",         &[]),
    ("ol",         &[]),
    ("p",          &["class"]),
    ("pre",        &[]),
    ("span",       &["class"]),
    ("strong",     &[]),
    ("ul",         &[]),
];

/// Default sanitizer for plain-text fields.
///
/// Strips tags (script and style blocks with their content), encodes any
/// stray `<`, collapses whitespace runs to a single space, drops
/// percent-encoded octets and trims the result.
pub fn text_field(input: &str) -> String {
    let mut out = input.to_owned();
    if out.contains('<') {
        out = SCRIPT_STYLE.replace_all(&out, "").into_owned();
        out = TAG.replace_all(&out, "").into_owned();
        out = out.replace('<', "&lt;");
    }
    out = WHITESPACE.replace_all(&out, " ").trim().to_owned();

    if OCTET.is_match(&out) {
        // Removing one octet can join its neighbours into another.
        while OCTET.is_match(&out) {
            out = OCTET.replace_all(&out, "").into_owned();
        }
        out = WHITESPACE.replace_all(out.trim(), " ").into_owned();
    }
    out
}

/// Reduces `input` to a plausible `local@domain` address, or `""`.
pub fn email(input: &str) -> String {
    let input = input.trim();
    if input.len() < 6 {
        return String::new();
    }
    let Some(at) = input.find('@').filter(|&i| i > 0) else {
        return String::new();
    };
    let (local, domain) = (&input[..at], &input[at + 1..]);

    let local: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(*c))
        .collect();
    if local.is_empty() || domain.contains("..") {
        return String::new();
    }

    let domain = domain.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '\0');
    let subs: Vec<String> = domain
        .split('.')
        .map(|sub| {
            sub.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '\0')
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|sub| !sub.is_empty())
        .collect();
    if subs.len() < 2 {
        return String::new();
    }

    format!("{local}@{}", subs.join("."))
}

/// Allow-list HTML filter for rich post content.
///
/// Works on slashed input and returns slashed output, so it must run inside
/// the `add_slashes` / `strip_slashes` bracket that
/// [`Sanitizer::RichContent`](crate::args::Sanitizer::RichContent) applies.
pub fn filter_post_kses(slashed: &str) -> String {
    let html = strip_slashes(slashed);
    let html = SCRIPT_STYLE.replace_all(&html, "");
    let html = HTML_TAG.replace_all(&html, |caps: &Captures<'_>| {
        let name = caps[2].to_ascii_lowercase();
        let Some((_, allowed)) = ALLOWED_TAGS.iter().find(|(tag, _)| *tag == name) else {
            return String::new();
        };
        if &caps[1] == "/" {
            return format!("</{name}>");
        }
        let mut tag = format!("<{name}");
        for attr in ATTR.captures_iter(&caps[3]) {
            let key = attr[1].to_ascii_lowercase();
            let value = attr[2].trim_matches(|c| c == '"' || c == '\'');
            if !allowed.contains(&key.as_str()) || is_script_url(value) {
                continue;
            }
            tag.push_str(&format!(r#" {key}="{}""#, value.replace('"', "&quot;")));
        }
        if &caps[4] == "/" {
            tag.push_str(" /");
        }
        tag.push('>');
        tag
    });
    add_slashes(&html)
}

fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:") || compact.starts_with("vbscript:") || compact.starts_with("data:")
}

/// Backslash-escapes quotes, backslashes and NUL.
pub fn add_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`add_slashes`]. A lone trailing backslash is dropped.
pub fn strip_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some(next) => out.push(next),
            None => {}
        }
    }
    out
}

/// Cleans a URL for use in a `Location` header.
///
/// Only `http`, `https` and scheme-less (relative) URLs survive; spaces are
/// encoded and characters outside the URL alphabet are removed.
pub fn url_raw(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .replace(' ', "%20")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-~+_.?#=!&;,/:%@$|*'()[]".contains(*c))
        .collect();
    if cleaned.is_empty() {
        return cleaned;
    }

    let scheme_end = cleaned.find(':');
    let path_start = cleaned.find(['/', '?', '#']).unwrap_or(cleaned.len());
    match scheme_end {
        Some(i) if i < path_start => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            if scheme == "http" || scheme == "https" { cleaned } else { String::new() }
        }
        _ => cleaned,
    }
}
