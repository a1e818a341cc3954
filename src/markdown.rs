//! Best-effort HTML to Markdown transliteration.
//!
//! This is deliberately a regex substitution pipeline, not a DOM converter:
//! each step rewrites the output of the previous one, in a fixed order.
//! Malformed or deeply nested markup degrades instead of failing, and the
//! exact degradation is part of the observable contract; do not swap this
//! for a parsing converter without flagging the behaviour change.

use regex::{Captures, Regex};

/// Fixed named-entity table, applied in this order after tag stripping.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&copy;", "(c)"),
    ("&reg;", "(r)"),
    ("&trade;", "(tm)"),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    ("&hellip;", "\u{2026}"),
    ("&laquo;", "\u{ab}"),
    ("&raquo;", "\u{bb}"),
];

/// Converts an HTML document to Markdown.
///
/// Pure and deterministic; operates on already-rehomed HTML, so image `src`
/// values pass through unchanged.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.to_string();

    // Scripts and styles are dropped entirely.
    text = Regex::new(r"(?is)<script\b.*?</script>")
        .unwrap()
        .replace_all(&text, "")
        .into_owned();
    text = Regex::new(r"(?is)<style\b.*?</style>")
        .unwrap()
        .replace_all(&text, "")
        .into_owned();

    // Headings, h6 first so nested replacement cannot double-match.
    for level in (1..=6).rev() {
        let pattern = format!(r"(?is)<h{level}[^>]*>(.*?)</h{level}>");
        let replacement = format!("{} $1\n\n", "#".repeat(level));
        text = Regex::new(&pattern)
            .unwrap()
            .replace_all(&text, replacement.as_str())
            .into_owned();
    }

    for (pattern, replacement) in [
        (r"(?is)<b\b[^>]*>(.*?)</b>", "**$1**"),
        (r"(?is)<strong\b[^>]*>(.*?)</strong>", "**$1**"),
        (r"(?is)<i\b[^>]*>(.*?)</i>", "*$1*"),
        (r"(?is)<em\b[^>]*>(.*?)</em>", "*$1*"),
        (r"(?is)<u\b[^>]*>(.*?)</u>", "_$1_"),
        (r#"(?is)<a\b[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#, "[$2]($1)"),
        (r#"(?i)<img\b[^>]*src="([^"]*)"[^>]*alt="([^"]*)"[^>]*>"#, "![$2]($1)"),
        (r#"(?i)<img\b[^>]*src="([^"]*)"[^>]*>"#, "![]($1)"),
        (r"(?is)<li\b[^>]*>(.*?)</li>", "* $1\n"),
        (r"(?i)<ul\b[^>]*>|</ul>", ""),
        (r"(?i)<ol\b[^>]*>|</ol>", ""),
        (r"(?is)<p\b[^>]*>(.*?)</p>", "$1\n\n"),
        (r"(?i)<br\b[^>]*>", "  \n"),
        (r"(?i)<hr\b[^>]*>", "\n---\n"),
        (r"(?i)<table[^>]*>", "\n"),
        (r"(?i)</table>", "\n"),
        (r"(?i)<tr[^>]*>", "\n"),
        (r"(?i)</tr>", ""),
        (r"(?is)<td[^>]*>(.*?)</td>", "| $1 "),
        (r"(?is)<th[^>]*>(.*?)</th>", "| **$1** "),
    ] {
        text = Regex::new(pattern)
            .unwrap()
            .replace_all(&text, replacement)
            .into_owned();
    }

    // Anything still tag-shaped is stripped with no replacement.
    text = Regex::new(r"<[^>]*>")
        .unwrap()
        .replace_all(&text, "")
        .into_owned();

    for (entity, replacement) in NAMED_ENTITIES {
        text = text.replace(entity, replacement);
    }

    // Numeric entities, decimal then hex; invalid code points stay literal.
    text = Regex::new(r"&#(\d+);")
        .unwrap()
        .replace_all(&text, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();
    text = Regex::new(r"&#x([0-9a-fA-F]+);")
        .unwrap()
        .replace_all(&text, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();

    // Whitespace normalization: collapse space runs, then blank-line noise.
    text = Regex::new(r"[ \t]+")
        .unwrap()
        .replace_all(&text, " ")
        .into_owned();
    text = Regex::new(r"\n[ \t]+\n")
        .unwrap()
        .replace_all(&text, "\n\n")
        .into_owned();
    text = Regex::new(r"\n\s*\n")
        .unwrap()
        .replace_all(&text, "\n\n")
        .into_owned();

    text.trim().to_string()
}
