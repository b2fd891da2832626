//! Route template compilation.
//!
//! A template mixes literal segments with named tokens:
//!
//! ```text
//! post/{POST_ID}      →  ^api/json/post/(\d+)$      vars = [post_id]
//! user/{USER_ID}      →  ^api/json/user/(\d+)$      vars = [user_id]
//! ```
//!
//! Each token substitutes to one capture group, left to right, so the n-th
//! token feeds the n-th variable. Literal text is escaped. The compiled regex
//! is anchored at both ends: a path matches completely or not at all.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Token, variable it fills, and the value class it accepts.
const TOKENS: &[(&str, &str, &str)] = &[
    ("{POST_ID}",    "post_id",    r"(\d+)"),
    ("{USER_ID}",    "user_id",    r"(\d+)"),
    ("{COMMENT_ID}", "comment_id", r"(\d+)"),
    ("{TERM_ID}",    "term_id",    r"(\d+)"),
];

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Z][A-Z0-9_]*\}").expect("token regex"));

/// A compiled route template. Built once at registration, read-only afterwards.
#[derive(Clone, Debug)]
pub struct Pattern {
    template: String,
    regex: Regex,
    vars: Vec<&'static str>,
}

impl Pattern {
    /// Compiles `template` under `base` (e.g. `"api/json/"`).
    pub fn compile(base: &str, template: &str) -> Result<Self, Error> {
        let mut source = String::from("^");
        source.push_str(&regex::escape(base));

        let mut vars = Vec::new();
        let mut last = 0;
        for m in TOKEN.find_iter(template) {
            let (_, var, class) = TOKENS
                .iter()
                .find(|(token, _, _)| *token == m.as_str())
                .ok_or_else(|| Error::UnknownToken {
                    template: template.to_owned(),
                    token: m.as_str().to_owned(),
                })?;
            source.push_str(&regex::escape(&template[last..m.start()]));
            source.push_str(class);
            vars.push(*var);
            last = m.end();
        }
        source.push_str(&regex::escape(&template[last..]));
        source.push('$');

        let regex = Regex::new(&source).map_err(|source| Error::Regex {
            template: template.to_owned(),
            source,
        })?;

        Ok(Self { template: template.to_owned(), regex, vars })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variable names in capture order.
    pub fn vars(&self) -> &[&'static str] {
        &self.vars
    }

    /// Matches `path` in full and returns each variable with its raw
    /// (still percent-encoded) capture.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<(&'static str, &'p str)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.vars
                .iter()
                .enumerate()
                .filter_map(|(i, var)| caps.get(i + 1).map(|m| (*var, m.as_str())))
                .collect(),
        )
    }
}
