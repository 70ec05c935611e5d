//! Turns raw item descriptions into plain text suitable for a chat message.
//!
//! Feed generators wrap descriptions in all kinds of markup. The cleanup is a fixed
//! sequence of small, total steps; none of them fails when its pattern is missing, so
//! a description that does not match the expected shape simply passes through.

use html2text::render::TrivialDecorator;

/// Maximum body length, in characters, before truncation
pub const MAX_BODY_CHARS: usize = 2048;

/// Appended to a truncated body
pub const ELLIPSIS: &str = "...";

const PREAMBLE_MARKER: &str = "'>";
const BODY_TAG: &str = "<body>";
const PARAGRAPH_TAG: &str = "<p>";
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Wide enough that the HTML renderer never wraps a paragraph
const WRAP_WIDTH: usize = 100_000;

/// Upper bound on cleanup rounds
const MAX_ROUNDS: usize = 32;

type Step = fn(String) -> String;

/// Cleanup passes, in application order
const STEPS: &[Step] = &[
    collapse_line_breaks,
    drop_preamble,
    extract_body_fragment,
    strip_cdata,
    trim_line_break,
    strip_tags,
];

/// Sanitize a raw feed item body.
///
/// The cleanup passes are repeated until the text stops changing, so the result is a
/// fixed point and `sanitize(sanitize(x)) == sanitize(x)`. Markup that only appears once
/// entities are decoded (`&lt;b&gt;`) is removed on a later round.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = STEPS.iter().fold(text.clone(), |acc, step| step(acc));
        if next == text {
            break;
        }
        text = next;
    }
    truncate(text)
}

fn collapse_line_breaks(mut text: String) -> String {
    loop {
        let collapsed = text
            .replace("\r\n\r\n", "\r\n")
            .replace("\r\r", "\r")
            .replace("\n\n", "\n");
        if collapsed == text {
            return text;
        }
        text = collapsed;
    }
}

fn drop_preamble(text: String) -> String {
    match text.find(PREAMBLE_MARKER) {
        Some(i) => text[i + PREAMBLE_MARKER.len()..].to_string(),
        None => text,
    }
}

fn extract_body_fragment(text: String) -> String {
    let Some(body) = text.find(BODY_TAG) else {
        return text;
    };
    let start = body + BODY_TAG.len();
    match text[start..].find(PARAGRAPH_TAG) {
        Some(offset) => text[start..start + offset].to_string(),
        None => text,
    }
}

fn strip_cdata(text: String) -> String {
    if !text.contains(CDATA_OPEN) && !text.contains(CDATA_CLOSE) {
        return text;
    }
    text.replace(CDATA_OPEN, "").replace(CDATA_CLOSE, "")
}

/// Removes one line break from each end, not every one
fn trim_line_break(text: String) -> String {
    let mut s = text.as_str();
    s = s
        .strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\r'))
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s);
    s = s
        .strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\r'))
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s);
    if s.len() == text.len() {
        text
    } else {
        s.to_string()
    }
}

/// Render remaining markup as plain text, resolving every named and numeric entity
fn strip_tags(text: String) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text;
    }

    match html2text::from_read_with_decorator(text.as_bytes(), WRAP_WIDTH, TrivialDecorator::new()) {
        Ok(plain) => plain.replace('\u{a0}', " ").trim_end().to_string(),
        Err(_) => text,
    }
}

fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(sanitize("Hello world"), "Hello world");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_collapses_line_breaks() {
        assert_eq!(sanitize("a\n\n\n\nb"), "a\nb");
        assert_eq!(sanitize("a\r\n\r\n\r\n\r\nb"), "a\r\nb");
        assert_eq!(sanitize("a\r\r\rb"), "a\rb");
    }

    #[test]
    fn test_drops_preamble_up_to_marker() {
        let raw = "<img src='https://example.com/pic.jpg'>The actual text";
        assert_eq!(sanitize(raw), "The actual text");
    }

    #[test]
    fn test_extracts_body_fragment() {
        let raw = "<html><body>Lead paragraph<p>Rest of the page</p></body></html>";
        assert_eq!(sanitize(raw), "Lead paragraph");
    }

    #[test]
    fn test_body_without_paragraph_keeps_everything() {
        let raw = "<body>Only body</body>";
        assert_eq!(sanitize(raw), "Only body");
    }

    #[test]
    fn test_strips_cdata_markers() {
        assert_eq!(sanitize("<![CDATA[Inside]]>"), "Inside");
    }

    #[test]
    fn test_trims_line_breaks_at_the_ends() {
        assert_eq!(sanitize("\r\nText\r\n"), "Text");
        assert_eq!(sanitize("\nText\n"), "Text");
        assert_eq!(trim_line_break("\n\rText".to_string()), "\rText");
    }

    #[test]
    fn test_strips_tags_and_decodes_entities() {
        let raw = "<p>Tom &amp; Jerry&nbsp;&mdash; <b>live</b></p>";
        assert_eq!(sanitize(raw), "Tom & Jerry \u{2014} live");
    }

    #[test]
    fn test_decodes_numeric_and_named_entities() {
        assert_eq!(sanitize("It&#8217;s caf&eacute; &#233; &#x41;"), "It\u{2019}s caf\u{e9} \u{e9} A");
        assert_eq!(sanitize("&#8217;"), "\u{2019}");
        assert_eq!(sanitize("&#233;t&#233;"), "\u{e9}t\u{e9}");
        assert_eq!(sanitize("&#x41;BC"), "ABC");
        assert_eq!(sanitize("&eacute;"), "\u{e9}");
    }

    #[test]
    fn test_non_breaking_space_becomes_plain_space() {
        assert_eq!(sanitize("a&nbsp;b"), "a b");
    }

    #[test]
    fn test_paragraphs_become_lines() {
        assert_eq!(sanitize("<div>first</div><div>second</div>"), "first\nsecond");
    }

    #[test]
    fn test_truncates_with_ellipsis() {
        let raw = "x".repeat(MAX_BODY_CHARS + 10);
        let result = sanitize(&raw);
        assert_eq!(result.chars().count(), MAX_BODY_CHARS + ELLIPSIS.len());
        assert!(result.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let raw = "\u{0456}".repeat(MAX_BODY_CHARS + 1);
        let result = sanitize(&raw);
        assert!(result.starts_with('\u{0456}'));
        assert_eq!(result.chars().count(), MAX_BODY_CHARS + ELLIPSIS.len());
    }

    #[test]
    fn test_exact_limit_not_truncated() {
        let raw = "y".repeat(MAX_BODY_CHARS);
        assert_eq!(sanitize(&raw), raw);
    }

    #[test]
    fn test_escaped_markup_is_removed_as_well() {
        // entities that decode into a tag are stripped on the next round
        assert_eq!(sanitize("a &lt;b&gt;bold&lt;/b&gt; c"), "a bold c");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(raw in "(?s).{0,300}") {
            let once = sanitize(&raw);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn prop_sanitize_is_idempotent_on_markup(
            raw in r"(<body>|<p>|</p>|'>|<!\[CDATA\[|\]\]>|&amp;|&lt;|&gt;|&nbsp;|\r|\n|[a-z ]){0,80}"
        ) {
            let once = sanitize(&raw);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn prop_length_is_bounded(raw in "(?s).{0,3000}") {
            prop_assert!(sanitize(&raw).chars().count() <= MAX_BODY_CHARS + ELLIPSIS.len());
        }
    }

    #[test]
    fn test_truncated_output_is_stable() {
        let raw = format!("<p>{}</p>", "word ".repeat(1000));
        let once = sanitize(&raw);
        assert!(once.ends_with(ELLIPSIS));
        assert_eq!(sanitize(&once), once);
    }
}
