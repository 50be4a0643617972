//! Text fix-ups applied around the markdown pass.

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::CodeRanges;

/// A line holding only a lone `*`, or a run of three or more, plus whitespace.
static LONE_ASTERISKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:\*{3,}|\*)[ \t\r]*$").unwrap());

static TABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<table\b.*?</table>").unwrap());

pub const TABLE_WRAPPER_CLASS: &str = "table-wrapper";

/// Backslash-escape asterisks on lines that consist only of asterisks, so a
/// quiz option such as `*` stays a literal character instead of becoming a
/// list bullet or a thematic break. Code is left untouched.
pub fn escape_lone_asterisks(text: &str) -> String {
    let code = CodeRanges::scan(text);
    LONE_ASTERISKS
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let line = &caps[0];
            let star = caps.get(0).map_or(0, |m| m.start()) + line.find('*').unwrap_or(0);
            if code.contains(star) {
                line.to_owned()
            } else {
                line.replace('*', "\\*")
            }
        })
        .into_owned()
}

/// Wrap every rendered `<table>` in a horizontally scrollable container.
pub fn wrap_tables(html: &str) -> String {
    TABLE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            format!(r#"<div class="{TABLE_WRAPPER_CLASS}">{}</div>"#, &caps[0])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_asterisk_lines_are_escaped() {
        assert_eq!(escape_lone_asterisks("*"), "\\*");
        assert_eq!(escape_lone_asterisks("a\n  *  \nb"), "a\n  \\*  \nb");
        assert_eq!(escape_lone_asterisks("***"), "\\*\\*\\*");
    }

    #[test]
    fn asterisks_in_prose_are_kept() {
        let text = "* item\n**bold**\n2 * 3\n**";
        assert_eq!(escape_lone_asterisks(text), text);
    }

    #[test]
    fn fenced_asterisks_are_kept() {
        let text = "```\n*\n```\n*";
        assert_eq!(escape_lone_asterisks(text), "```\n*\n```\n\\*");
    }

    #[test]
    fn asterisks_in_a_code_span_are_kept() {
        let text = "`a\n*\nb`";
        assert_eq!(escape_lone_asterisks(text), text);
    }

    #[test]
    fn tables_are_wrapped() {
        let html = "<p>x</p>\n<table>\n<tr><td>1</td></tr>\n</table>\n<table><tr></tr></table>";
        assert_eq!(
            wrap_tables(html),
            "<p>x</p>\n<div class=\"table-wrapper\"><table>\n<tr><td>1</td></tr>\n</table></div>\n\
             <div class=\"table-wrapper\"><table><tr></tr></table></div>"
        );
    }

    #[test]
    fn tablet_is_not_a_table() {
        assert_eq!(wrap_tables("<tablet></tablet>"), "<tablet></tablet>");
    }
}
