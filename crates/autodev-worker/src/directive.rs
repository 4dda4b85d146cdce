//! Extract structured directives out of rich-text work-item bodies.
//!
//! Ticket descriptions arrive as HTML. Markup handling stays here, at the
//! edge: the rest of the system only ever sees plain text and extracted
//! directive values.

use std::sync::OnceLock;

use regex::Regex;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("literal regex compiles"))
}

/// Replace markup with whitespace and decode the common entities, so token
/// extraction works on plain text.
pub fn strip_markup(text: &str) -> String {
    tag_regex()
        .replace_all(text, " ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

/// Find a `@{key}:<value>` directive token in a rich-text body.
///
/// Values are repository-name shaped: letters, digits, dots, underscores
/// and dashes. Returns the first occurrence.
pub fn extract_directive(text: &str, key: &str) -> Option<String> {
    let plain = strip_markup(text);
    let pattern = format!(r"@{}:\s*([A-Za-z0-9._\-]+)", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(&plain).map(|captures| captures[1].to_string())
}
