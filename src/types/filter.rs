//! Input filter pipeline
//!
//! Every category is optional and applied in a fixed order: case transform,
//! backslash, slash, quote, whitespace, html, diacritic, separator and special
//! characters. `all` fills in every category left unset except the case
//! transform. A value that ends up empty is treated as absent.

use once_cell::sync::Lazy;
use regex::Regex;

/// What a filter category does with the characters it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Remove,
    Encode,
    Decode,
    /// Replace with a neutral character (diacritic: base letter, separators: space)
    Strip,
    /// Whitespace only: trim both ends
    Trim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    Lower,
    Upper,
}

/// Filter settings, one optional mode per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filters {
    pub back_slash: Option<FilterMode>,
    pub slash: Option<FilterMode>,
    pub quote: Option<FilterMode>,
    pub white_space: Option<FilterMode>,
    pub html: Option<FilterMode>,
    pub diacritic: Option<FilterMode>,
    pub separator: Option<FilterMode>,
    pub special_char: Option<FilterMode>,
    pub transform: Option<CaseTransform>,
    pub all: Option<FilterMode>,
}

impl Filters {
    /// No filtering at all.
    pub const NONE: Filters = Filters::new();

    /// Strip markup and every character that can break out of a literal or path.
    pub const SANITIZE: Filters = Filters::new()
        .back_slash(FilterMode::Remove)
        .slash(FilterMode::Remove)
        .quote(FilterMode::Remove)
        .white_space(FilterMode::Remove)
        .html(FilterMode::Remove);

    pub const fn new() -> Self {
        Self {
            back_slash: None,
            slash: None,
            quote: None,
            white_space: None,
            html: None,
            diacritic: None,
            separator: None,
            special_char: None,
            transform: None,
            all: None,
        }
    }

    pub const fn back_slash(mut self, mode: FilterMode) -> Self {
        self.back_slash = Some(mode);
        self
    }

    pub const fn slash(mut self, mode: FilterMode) -> Self {
        self.slash = Some(mode);
        self
    }

    pub const fn quote(mut self, mode: FilterMode) -> Self {
        self.quote = Some(mode);
        self
    }

    pub const fn white_space(mut self, mode: FilterMode) -> Self {
        self.white_space = Some(mode);
        self
    }

    pub const fn html(mut self, mode: FilterMode) -> Self {
        self.html = Some(mode);
        self
    }

    pub const fn diacritic(mut self, mode: FilterMode) -> Self {
        self.diacritic = Some(mode);
        self
    }

    pub const fn separator(mut self, mode: FilterMode) -> Self {
        self.separator = Some(mode);
        self
    }

    pub const fn special_char(mut self, mode: FilterMode) -> Self {
        self.special_char = Some(mode);
        self
    }

    pub const fn transform(mut self, transform: CaseTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub const fn all(mut self, mode: FilterMode) -> Self {
        self.all = Some(mode);
        self
    }

    /// Run the pipeline. Returns `None` when nothing is left.
    pub fn apply(&self, value: &str) -> Option<String> {
        let or_all = |mode: Option<FilterMode>| mode.or(self.all);

        let mut value = match self.transform {
            Some(CaseTransform::Lower) => value.to_lowercase(),
            Some(CaseTransform::Upper) => value.to_uppercase(),
            None => value.to_string(),
        };

        value = match or_all(self.back_slash) {
            Some(FilterMode::Remove) => value.replace('\\', ""),
            Some(FilterMode::Encode) => value.replace('\\', "&#92;"),
            Some(FilterMode::Decode) => value.replace("&#92;", "\\"),
            _ => value,
        };

        value = match or_all(self.slash) {
            Some(FilterMode::Remove) => value.replace('/', ""),
            Some(FilterMode::Encode) => value.replace('/', "&frasl;"),
            Some(FilterMode::Decode) => value.replace("&frasl;", "/"),
            _ => value,
        };

        value = match or_all(self.quote) {
            Some(FilterMode::Remove) => value.replace(QUOTES, ""),
            Some(FilterMode::Encode) => value
                .replace('"', "&quot;")
                .replace(['\'', '\u{2019}'], "&apos;"),
            Some(FilterMode::Decode) => value.replace("&quot;", "\"").replace("&apos;", "'"),
            _ => value,
        };

        value = match or_all(self.white_space) {
            Some(FilterMode::Remove) => value.replace(WHITE_SPACE, ""),
            Some(FilterMode::Encode) => value.replace(WHITE_SPACE, "-"),
            Some(FilterMode::Trim) => value.trim_matches(WHITE_SPACE).to_string(),
            _ => value,
        };

        value = match or_all(self.html) {
            Some(FilterMode::Remove) => strip_tags(&decode_html(&value)),
            Some(FilterMode::Encode) => value
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;"),
            Some(FilterMode::Decode) => decode_html(&value),
            _ => value,
        };

        value = match or_all(self.diacritic) {
            Some(FilterMode::Remove) => value
                .chars()
                .filter(|c| base_letter(*c).is_none())
                .collect(),
            Some(FilterMode::Strip | FilterMode::Encode) => {
                value.chars().map(|c| base_letter(c).unwrap_or(c)).collect()
            }
            _ => value,
        };

        value = match or_all(self.separator) {
            Some(FilterMode::Remove) => value.replace(SEPARATORS, ""),
            Some(FilterMode::Strip) => value.replace(SEPARATORS, " "),
            Some(FilterMode::Encode) => value.replace(SEPARATORS, "-"),
            _ => value,
        };

        value = match or_all(self.special_char) {
            Some(FilterMode::Remove) => value.replace(SPECIAL_CHARS, ""),
            Some(FilterMode::Strip) => value.replace(SPECIAL_CHARS, " "),
            Some(FilterMode::Encode) => value.replace(SPECIAL_CHARS, "-"),
            _ => value,
        };

        (!value.is_empty()).then_some(value)
    }
}

const QUOTES: [char; 3] = ['"', '\'', '\u{2019}'];

const WHITE_SPACE: [char; 6] = ['\0', '\t', '\n', '\x0B', '\r', ' '];

const SEPARATORS: [char; 16] = [
    '_', '+', '.', ',', '?', '!', ':', ';', '~', '(', ')', '{', '}', '[', ']', '|',
];

const SPECIAL_CHARS: [char; 7] = ['*', '$', '&', '@', '^', '#', '%'];

/// Czech accented letters and their base letters.
const DIACRITICS: [(char, char); 38] = [
    ('á', 'a'),
    ('ä', 'a'),
    ('č', 'c'),
    ('ď', 'd'),
    ('é', 'e'),
    ('ě', 'e'),
    ('ë', 'e'),
    ('í', 'i'),
    ('ň', 'n'),
    ('ó', 'o'),
    ('ö', 'o'),
    ('ř', 'r'),
    ('š', 's'),
    ('ť', 't'),
    ('ú', 'u'),
    ('ů', 'u'),
    ('ü', 'u'),
    ('ý', 'y'),
    ('ž', 'z'),
    ('Á', 'A'),
    ('Ä', 'A'),
    ('Č', 'C'),
    ('Ď', 'D'),
    ('É', 'E'),
    ('Ě', 'E'),
    ('Ë', 'E'),
    ('Í', 'I'),
    ('Ň', 'N'),
    ('Ó', 'O'),
    ('Ö', 'O'),
    ('Ř', 'R'),
    ('Š', 'S'),
    ('Ť', 'T'),
    ('Ú', 'U'),
    ('Ů', 'U'),
    ('Ü', 'U'),
    ('Ý', 'Y'),
    ('Ž', 'Z'),
];

fn base_letter(c: char) -> Option<char> {
    DIACRITICS
        .iter()
        .find(|(accented, _)| *accented == c)
        .map(|(_, base)| *base)
}

fn decode_html(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

static TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());

fn strip_tags(value: &str) -> String {
    match TAG.as_ref() {
        Some(tag) => tag.replace_all(value, "").into_owned(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(value: &str, filters: Filters) -> Option<String> {
        filters.apply(value)
    }

    #[test]
    fn test_no_filters() {
        assert_eq!(run(r"tes\t", Filters::NONE).as_deref(), Some(r"tes\t"));
        assert_eq!(run("", Filters::NONE), None);
    }

    #[test]
    fn test_back_slash() {
        let remove = Filters::new().back_slash(FilterMode::Remove);
        assert_eq!(run(r"te\st\1", remove).as_deref(), Some("test1"));
        let encode = Filters::new().back_slash(FilterMode::Encode);
        assert_eq!(run(r"te\st\1", encode).as_deref(), Some("te&#92;st&#92;1"));
        let decode = Filters::new().back_slash(FilterMode::Decode);
        assert_eq!(run("te&#92;st&#92;1", decode).as_deref(), Some(r"te\st\1"));
    }

    #[test]
    fn test_slash() {
        let remove = Filters::new().slash(FilterMode::Remove);
        assert_eq!(run("te//st", remove).as_deref(), Some("test"));
        let encode = Filters::new().slash(FilterMode::Encode);
        assert_eq!(
            run(r"te\/st/1", encode).as_deref(),
            Some(r"te\&frasl;st&frasl;1")
        );
        let decode = Filters::new().slash(FilterMode::Decode);
        assert_eq!(
            run("te&frasl;st&frasl;1", decode).as_deref(),
            Some("te/st/1")
        );
    }

    #[test]
    fn test_quotes() {
        let remove = Filters::new().quote(FilterMode::Remove);
        assert_eq!(run("test's", remove).as_deref(), Some("tests"));
        assert_eq!(run(r#"te"te\"st'"#, remove).as_deref(), Some(r"tete\st"));
        let encode = Filters::new().quote(FilterMode::Encode);
        assert_eq!(
            run(r#"te"te"st'"#, encode).as_deref(),
            Some("te&quot;te&quot;st&apos;")
        );
        let decode = Filters::new().quote(FilterMode::Decode);
        assert_eq!(
            run("te&quot;te&quot;st&apos;", decode).as_deref(),
            Some(r#"te"te"st'"#)
        );
    }

    #[test]
    fn test_white_space() {
        let remove = Filters::new().white_space(FilterMode::Remove);
        assert_eq!(run("\tte st \n1", remove).as_deref(), Some("test1"));
        let encode = Filters::new().white_space(FilterMode::Encode);
        assert_eq!(run(" \tte st \n1 ", encode).as_deref(), Some("--te-st--1-"));
        let trim = Filters::new().white_space(FilterMode::Trim);
        assert_eq!(run(" \tte st \n1 ", trim).as_deref(), Some("te st \n1"));
    }

    #[test]
    fn test_html() {
        let remove = Filters::new().html(FilterMode::Remove);
        assert_eq!(run("<b>test 1</b>", remove).as_deref(), Some("test 1"));
        let encode = Filters::new().html(FilterMode::Encode);
        assert_eq!(run("&test 1", encode).as_deref(), Some("&amp;test 1"));
        assert_eq!(
            run("<b>&nbsp;test 1</b>", encode).as_deref(),
            Some("&lt;b&gt;&amp;nbsp;test 1&lt;/b&gt;")
        );
        let decode = Filters::new().html(FilterMode::Decode);
        assert_eq!(
            run("&lt;b&gt;&amp;nbsp;test 1&lt;/b&gt;", decode).as_deref(),
            Some("<b>&nbsp;test 1</b>")
        );
    }

    #[test]
    fn test_transform() {
        let lower = Filters::new().transform(CaseTransform::Lower);
        assert_eq!(run("Test 1", lower).as_deref(), Some("test 1"));
        let upper = Filters::new().transform(CaseTransform::Upper);
        assert_eq!(run("Test 1", upper).as_deref(), Some("TEST 1"));
    }

    #[test]
    fn test_seo_slug() {
        let filters = Filters::new()
            .white_space(FilterMode::Encode)
            .html(FilterMode::Remove)
            .diacritic(FilterMode::Encode)
            .separator(FilterMode::Remove)
            .special_char(FilterMode::Remove)
            .transform(CaseTransform::Lower);
        assert_eq!(
            run("<b>%Žluťoučký kůň - hračka.</b>", filters).as_deref(),
            Some("zlutoucky-kun---hracka")
        );
    }

    #[test]
    fn test_all_fills_unset_categories() {
        let filters = Filters::new()
            .all(FilterMode::Remove)
            .separator(FilterMode::Strip);
        assert_eq!(run("a/b c.d", filters).as_deref(), Some("abc d"));
    }

    #[test]
    fn test_diacritic_remove() {
        let filters = Filters::new().diacritic(FilterMode::Remove);
        assert_eq!(run("kůň", filters).as_deref(), Some("k"));
    }
}
