//! Logical-to-physical column name translation
//!
//! Caller-supplied fragments name columns by their logical token. Before a
//! fragment is executed every token is rewritten to its physical column.
//! Rewriting is whole-word and never touches single-quoted literals or a token
//! that is already part of a qualified name (`table.token` / `token.column`).

use std::collections::HashMap;

use regex::{Captures, Regex};

/// Rewrites a fixed set of logical tokens in one pass.
#[derive(Debug, Clone)]
pub struct ColumnTranslator {
    pattern: Option<Regex>,
    targets: HashMap<String, String>,
}

impl ColumnTranslator {
    /// Build a translator from `(logical, physical)` pairs.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let targets: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| !k.is_empty() && k != v)
            .collect();

        if targets.is_empty() {
            return Ok(Self {
                pattern: None,
                targets,
            });
        }

        // Longest first so `category_name` wins over `category`.
        let mut tokens: Vec<&String> = targets.keys().collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = tokens
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"'[^']*'|\b(?:{alternation})\b"))?;

        Ok(Self {
            pattern: Some(pattern),
            targets,
        })
    }

    /// Rewrite every logical token in `fragment`.
    pub fn translate(&self, fragment: &str) -> String {
        let Some(ref pattern) = self.pattern else {
            return fragment.to_string();
        };

        pattern
            .replace_all(fragment, |caps: &Captures| {
                let Some(m) = caps.get(0) else {
                    return String::new();
                };
                let text = m.as_str();
                if text.starts_with('\'') {
                    return text.to_string();
                }

                let before = fragment[..m.start()].chars().next_back();
                let after = fragment[m.end()..].chars().next();
                if before == Some('.') || after == Some('.') {
                    return text.to_string();
                }

                self.targets
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| text.to_string())
            })
            .into_owned()
    }
}

/// Rewrite a single logical token inside `fragment`.
pub fn translate_column_name(token: &str, physical: &str, fragment: &str) -> String {
    match ColumnTranslator::new([(token, physical)]) {
        Ok(translator) => translator.translate(fragment),
        Err(_) => fragment.to_string(),
    }
}
