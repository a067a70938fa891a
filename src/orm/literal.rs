//! SQL literal escaping
//!
//! Literals inlined into SQL text go through one substitution table: double
//! quote, single quote, the typographic apostrophe and backslash are replaced
//! by HTML-entity markers. After substitution a standard-conforming string
//! literal contains no character that can terminate it. NUL bytes are dropped
//! because PostgreSQL text cannot hold them.
//!
//! Array literals get a second table so element text cannot collide with the
//! `{a,b,c}` delimiter syntax.

/// Escape table applied to every inlined string literal.
const STRING_ENCODE: [(char, &str); 4] = [
    ('"', "&quot;"),
    ('\'', "&apos;"),
    ('\u{2019}', "&apos;"),
    ('\\', "&#92;"),
];

/// Markers used for array element delimiters.
const ARRAY_ENCODE: [(char, &str); 3] = [(',', "&sbquo;"), ('{', "&#123;"), ('}', "&#1252;")];

/// Replace literal-breaking characters with their escape markers.
pub fn pg_string_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\0' {
            continue;
        }
        match STRING_ENCODE.iter().find(|(raw, _)| *raw == c) {
            Some((_, marker)) => out.push_str(marker),
            None => out.push(c),
        }
    }
    out
}

/// Reverse both the string and the array escape tables.
pub fn pg_string_decode(value: &str) -> String {
    value
        .replace("&sbquo;", ",")
        .replace("&#123;", "{")
        .replace("&#1252;", "}")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#92;", "\\")
}

/// Escape array delimiter characters inside one array element.
pub fn pg_array_element_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match ARRAY_ENCODE.iter().find(|(raw, _)| *raw == c) {
            Some((_, marker)) => out.push_str(marker),
            None => out.push(c),
        }
    }
    out
}

/// Quote a raw string as an escaped SQL literal.
pub fn aps(value: &str) -> String {
    format!("'{}'", pg_string_encode(value))
}

/// Quote a LIKE pattern using SQL-standard quote doubling.
///
/// Backslashes are kept so `\%` and `\_` still escape wildcards.
pub fn quote_pattern(pattern: &str) -> String {
    format!("'{}'", pattern.replace('\0', "").replace('\'', "''"))
}

/// Quote a JSON document as a string literal.
pub fn quote_json(json: &str) -> String {
    format!("'{}'", json.replace('\0', "").replace('\'', "''"))
}

/// Literal form of a boolean as inlined into statements.
pub fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Literal for an absent value.
pub const NULL: &str = "null";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aps() {
        assert_eq!(aps("test"), "'test'");
        assert_eq!(aps("test\t"), "'test\t'");
        assert_eq!(aps("test's"), "'test&apos;s'");
        assert_eq!(aps("test1\\2"), "'test1&#92;2'");
        assert_eq!(aps("test1(\"value\")"), "'test1(&quot;value&quot;)'");
        assert_eq!(aps("it\u{2019}s"), "'it&apos;s'");
    }

    #[test]
    fn test_encode_drops_nul() {
        assert_eq!(pg_string_encode("a\0b"), "ab");
    }

    #[test]
    fn test_decode_reverses_both_tables() {
        assert_eq!(
            pg_string_decode("&quot;a&quot;&sbquo;&#123;b&#1252;&apos;&#92;"),
            "\"a\",{b}'\\"
        );
    }

    #[test]
    fn test_array_element_encode() {
        assert_eq!(pg_array_element_encode("a,{b}"), "a&sbquo;&#123;b&#1252;");
    }

    #[test]
    fn test_quote_pattern_keeps_like_escapes() {
        assert_eq!(quote_pattern("a\\%b"), "'a\\%b'");
        assert_eq!(quote_pattern("%a'bc%"), "'%a''bc%'");
    }

    #[test]
    fn test_bool_literal() {
        assert_eq!(bool_literal(true), "true");
        assert_eq!(bool_literal(false), "false");
    }
}
