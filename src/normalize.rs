//! Markdown/text normalization applied to every acquired page before
//! hashing, deduplication, and chunking.
//!
//! [`normalize`] is a pure, order-sensitive transform: no I/O, no
//! randomness, byte-identical output for identical input. The step order
//! matters; content hashes are computed over the result, so any change
//! here changes what counts as a duplicate page.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use url::Url;

static HTML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static NEWLINE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)").unwrap());

/// Lines matching any of these patterns are dropped wholesale.
static BOILERPLATE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^\s*(©|\(c\)\s|copyright\b)",
        r"(?i)all rights reserved",
        r"(?i)\b(cookie policy|cookie settings|privacy policy|terms of (service|use))\b",
    ])
    .unwrap()
});

/// Normalizes one page of acquired markdown/text.
///
/// Steps, in order:
/// 1. strip a leading BOM and a leading `---`…`---` front-matter block
/// 2. remove HTML comments and `<script>`/`<style>` blocks
/// 3. collapse 3+ consecutive newlines to 2, right-trim every line
/// 4. replace markdown images with their alt text
/// 5. strip tracking parameters (`utm_*`, `ref`, `fbclid`) from absolute
///    markdown link targets, then right-trim again; a target that fails
///    to parse is left as-is
/// 6. remove immediately-consecutive duplicate lines
/// 7. drop boilerplate lines (copyright / cookie / privacy / terms)
/// 8. trim the whole document
pub fn normalize(input: &str) -> String {
    let text = strip_front_matter(input.strip_prefix('\u{feff}').unwrap_or(input));

    let text = HTML_COMMENT_RE.replace_all(&text, "");
    let text = SCRIPT_RE.replace_all(&text, "");
    let text = STYLE_RE.replace_all(&text, "");

    let text = NEWLINE_RUN_RE.replace_all(&text, "\n\n");
    let text = right_trim_lines(&text);

    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = strip_tracking_params(&text);
    // An image with empty alt text can expose trailing whitespace on its
    // line, so the rewrites need a second trim pass.
    let text = right_trim_lines(&text);

    let text = drop_repeated_and_boilerplate_lines(&text);

    text.trim().to_string()
}

/// Removes a leading front-matter block delimited by `---` lines.
///
/// Only triggers when the very first line is `---`; without a closing
/// delimiter the document is left untouched.
fn strip_front_matter(input: &str) -> Cow<'_, str> {
    let Some(rest) = input.strip_prefix("---\n") else {
        return Cow::Borrowed(input);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Cow::Owned(rest[offset + line.len()..].to_string());
        }
        offset += line.len();
    }
    Cow::Borrowed(input)
}

fn right_trim_lines(input: &str) -> String {
    let mut out: String = input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    if input.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Rewrites absolute markdown link targets with tracking parameters removed.
///
/// Link text is never touched. Matches that fail URL parsing keep their
/// original form.
fn strip_tracking_params(input: &str) -> String {
    LINK_RE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let text = &caps[1];
            let target = &caps[2];
            match clean_link_target(target) {
                Some(cleaned) => format!("[{text}]({cleaned})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || key == "ref" || key == "fbclid"
}

fn clean_link_target(target: &str) -> Option<String> {
    let mut url = Url::parse(target).ok()?;
    if url.query().is_none() {
        return Some(target.to_string());
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&kept);
    }
    Some(url.to_string())
}

/// Single backward comparison: a line identical to the previously kept line
/// is dropped, as is any line matching the boilerplate set.
fn drop_repeated_and_boilerplate_lines(input: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in input.lines() {
        if BOILERPLATE.is_match(line) {
            continue;
        }
        if kept.last() == Some(&line) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 1. BOM and front matter are stripped together.
    #[test]
    fn strips_bom_and_front_matter() {
        let input = "\u{feff}---\ntitle: Page\ndraft: true\n---\nBody text";
        assert_eq!(normalize(input), "Body text");
    }

    // 2. A front-matter block with no closing delimiter stays put.
    #[test]
    fn unterminated_front_matter_is_kept() {
        let input = "---\ntitle: Page\nBody text";
        assert_eq!(normalize(input), "---\ntitle: Page\nBody text");
    }

    #[test]
    fn removes_comments_scripts_and_styles() {
        let input = "keep <!-- gone -->this\n<script type=\"text/javascript\">var x = 1;</script>\n<style>.a { color: red }</style>after";
        assert_eq!(normalize(input), "keep this\n\nafter");
    }

    #[test]
    fn collapses_newline_runs_to_two() {
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn right_trims_every_line() {
        assert_eq!(normalize("alpha   \nbeta\t"), "alpha\nbeta");
    }

    #[test]
    fn image_becomes_alt_text() {
        assert_eq!(normalize("see ![a diagram](img/x.png) here"), "see a diagram here");
    }

    // An empty-alt image at end of line must not leave trailing spaces
    // behind, or a second pass would produce different output.
    #[test]
    fn empty_alt_image_leaves_no_trailing_whitespace() {
        let input = "x ![](img/a.png)\ny";
        let once = normalize(input);
        assert_eq!(once, "x\ny");
        assert_eq!(normalize(&once), once);
    }

    // Scenario from the tracking-parameter contract: utm_* goes, id stays.
    #[test]
    fn strips_utm_but_keeps_other_params() {
        let input = "[x](https://a.com/p?utm_source=foo&id=1)";
        assert_eq!(normalize(input), "[x](https://a.com/p?id=1)");
    }

    #[test]
    fn strips_ref_and_fbclid_exactly() {
        assert_eq!(
            normalize("[x](https://a.com/p?ref=hn&fbclid=abc&refresh=1)"),
            "[x](https://a.com/p?refresh=1)"
        );
    }

    #[test]
    fn all_tracking_params_drops_query_entirely() {
        assert_eq!(
            normalize("[x](https://a.com/p?utm_source=foo&utm_medium=mail)"),
            "[x](https://a.com/p)"
        );
    }

    #[test]
    fn relative_links_are_untouched() {
        assert_eq!(normalize("[x](../other.md)"), "[x](../other.md)");
    }

    #[test]
    fn consecutive_duplicate_lines_collapse_once() {
        let input = "repeat\nrepeat\nrepeat\nother\nrepeat";
        assert_eq!(normalize(input), "repeat\nother\nrepeat");
    }

    #[test]
    fn boilerplate_lines_are_dropped() {
        let input = "Real content\nCopyright 2024 Example Corp\nAll Rights Reserved.\nWe use cookies — see our Cookie Policy\nMore content";
        assert_eq!(normalize(input), "Real content\nMore content");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
    }

    proptest! {
        // Idempotence over markdown-ish documents (word, heading, link,
        // and image lines, alt text possibly empty).
        #[test]
        fn normalize_is_idempotent(
            doc in proptest::collection::vec(
                prop_oneof![
                    "[a-z ]{0,20}",
                    "#{1,3} [a-z ]{1,12}",
                    r"\[[a-z]{1,6}\]\(https://example\.com/p\?utm_source=x&id=[0-9]\)",
                    r"[a-z ]{0,8}!\[[a-z ]{0,6}\]\(img/[a-z]{1,4}\.png\)",
                ],
                0..12,
            )
        ) {
            let input = doc.join("\n");
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
