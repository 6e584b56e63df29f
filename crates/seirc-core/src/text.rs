//! Text translation between chat HTML and IRC formatting
//!
//! Everything here is deterministic and stateless apart from the chat
//! origin used to resolve relative links.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Marker for text removed from a diff or a truncated preview
pub const ELLIPSIS: &str = "…";

/// IRC formatting control characters
pub mod irc {
    pub const BOLD: char = '\x02';
    pub const ITALIC: char = '\x1D';
    pub const UNDERLINE: char = '\x1F';
    pub const STRIKE: char = '\x1E';
    pub const REVERSE: char = '\x16';
    pub const RESET: char = '\x0F';
    pub const CTCP: char = '\x01';
}

const FORMAT_TAGS: &[(&str, &str)] = &[
    ("<b>", "\x02"),
    ("</b>", "\x02"),
    ("<u>", "\x1F"),
    ("</u>", "\x1F"),
    ("<i>", "\x1F"),
    ("</i>", "\x1F"),
    ("<strike>", "\x1E"),
    ("</strike>", "\x1E"),
    ("<code>", "`"),
    ("</code>", "`"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<br />", "\n"),
];

static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*<img [^>]*src="([^"]+)"[^>]*>\s*"#).expect("valid regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*<a [^>]*href="([^"]+)"[^>]*>\s*"#).expect("valid regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(<[^>]+>)+").expect("valid regex"));

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x03(\d{1,2}(,\d{1,2})?)?").expect("valid regex"));

/// Converts chat-service HTML into IRC text
#[derive(Debug, Clone)]
pub struct TextTranslator {
    origin: Url,
}

impl TextTranslator {
    /// `origin` is the chat host that root- and protocol-relative links belong to
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Render chat HTML as a line (or lines) of IRC text.
    ///
    /// Formatting tags become IRC control codes, images and links become
    /// bracketed URLs (each URL shown once per message), other tags collapse
    /// to a single space and entities are decoded last.
    pub fn to_irc(&self, html: &str) -> String {
        let mut text = html.to_string();
        for (tag, replacement) in FORMAT_TAGS {
            text = text.replace(tag, replacement);
        }

        let mut seen = HashSet::new();
        let text = IMG_RE
            .replace_all(&text, |caps: &Captures| self.placeholder(&caps[1], "[img ", &mut seen))
            .into_owned();
        let text = LINK_RE
            .replace_all(&text, |caps: &Captures| self.placeholder(&caps[1], "[", &mut seen))
            .into_owned();
        let text = TAG_RE.replace_all(&text, " ");

        html_escape::decode_html_entities(&text).trim().to_string()
    }

    fn placeholder(&self, link: &str, open: &str, seen: &mut HashSet<String>) -> String {
        if !seen.insert(link.to_string()) {
            return String::new();
        }
        format!(" {}{}] ", open, self.resolve(link))
    }

    /// Resolve `//host/path` and `/path` against the chat origin
    pub fn resolve(&self, link: &str) -> String {
        if !link.starts_with('/') {
            return link.to_string();
        }
        self.origin
            .join(link)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| link.to_string())
    }
}

/// Convert IRC formatting to the chat service's markdown.
///
/// Bold becomes `**`, italics `*`, underline `_` (the chat has no
/// underline), strike `---`; colours are dropped and a CTCP ACTION is
/// rewritten as emphasis.
pub fn irc_to_chat(text: &str) -> String {
    let text = COLOR_RE.replace_all(text, "");
    let text: String = text
        .replace(irc::BOLD, "**")
        .replace(irc::UNDERLINE, "_")
        .replace(irc::ITALIC, "*")
        .replace(irc::STRIKE, "---")
        .chars()
        .filter(|c| *c != irc::RESET && *c != irc::REVERSE)
        .collect();

    match unwrap_action(&text) {
        Some(action) => format!("*{}*", action),
        None => text,
    }
}

/// Body of a CTCP ACTION line, if `text` is exactly one
pub fn unwrap_action(text: &str) -> Option<&str> {
    text.strip_prefix("\x01ACTION ")
        .and_then(|rest| rest.strip_suffix(irc::CTCP))
}

/// Wrap `text` as a CTCP ACTION
pub fn to_action(text: &str) -> String {
    format!("\x01ACTION {}\x01", text)
}

/// Derive an IRC nick from a chat display name.
///
/// Embedded `\uXXXX` escapes are decoded; whitespace and control
/// characters are removed.
pub fn to_nick(user_name: &str) -> String {
    decode_unicode_escapes(user_name)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect()
}

/// Derive an IRC channel name from a room display name.
///
/// Lowercases and replaces whitespace (and commas) with hyphens. Input that
/// already carries the `#` prefix is not prefixed again.
pub fn to_channel(room_name: &str) -> String {
    let body = room_name.strip_prefix('#').unwrap_or(room_name);
    let body: String = body
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == ',' { '-' } else { c })
        .collect();
    format!("#{}", body)
}

fn decode_unicode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("\\u") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let decoded = after
            .get(..4)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &after[4..];
            }
            None => {
                out.push_str("\\u");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Drop a leading `@mention` token
pub fn strip_leading_mention(text: &str) -> &str {
    if !text.starts_with('@') {
        return text;
    }
    match text.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim_start(),
        None => "",
    }
}

/// First `max_chars` characters of `text`, with an ellipsis if cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// The part of `new` that differs from `old`.
///
/// Strips the longest common prefix and suffix, keeping `context`
/// characters of unchanged text on each side. A side that was actually
/// stripped is marked with an ellipsis. Identical inputs yield "".
pub fn diffstr(old: &str, new: &str, context: usize) -> String {
    if old == new {
        return String::new();
    }

    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let common_suffix = |limit: usize| {
        old.iter()
            .rev()
            .zip(new.iter().rev())
            .take(limit)
            .take_while(|(a, b)| a == b)
            .count()
    };

    // Prefix and suffix may share characters unless that leaves nothing of `new`
    let mut suffix = common_suffix(usize::MAX);
    if new.len() - suffix <= prefix {
        suffix = common_suffix(old.len().min(new.len()) - prefix);
    }

    let start = prefix.saturating_sub(context);
    let stripped_tail = suffix.saturating_sub(context);
    let end = new.len() - stripped_tail;

    let mut out = String::new();
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.extend(&new[start..end]);
    if stripped_tail > 0 {
        out.push_str(ELLIPSIS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> TextTranslator {
        TextTranslator::new(Url::parse("https://chat.stackexchange.com").unwrap())
    }

    #[test]
    fn test_to_channel() {
        assert_eq!(to_channel("The Bridge"), "#the-bridge");
        assert_eq!(to_channel("Sandbox Room"), "#sandbox-room");
        assert_eq!(to_channel("a,b\tc"), "#a-b-c");
    }

    #[test]
    fn test_to_channel_idempotent() {
        let once = to_channel("The Bridge");
        assert_eq!(to_channel(&once), once);
    }

    #[test]
    fn test_to_nick() {
        assert_eq!(to_nick("Jon Skeet"), "JonSkeet");
        assert_eq!(to_nick("caf\\u00e9 bot"), "café bot".replace(' ', ""));
        assert_eq!(to_nick("bad\\uZZZZ"), "bad\\uZZZZ");
        assert_eq!(to_nick("evil\r\0nick"), "evilnick");
        assert_eq!(to_nick("x\\u000d:y"), "x:y");
    }

    #[test]
    fn test_formatting_tags() {
        let t = translator();
        assert_eq!(t.to_irc("<b>bold</b> <i>it</i>"), "\x02bold\x02 \x1Fit\x1F");
        assert_eq!(t.to_irc("run <code>ls -l</code>"), "run `ls -l`");
        assert_eq!(t.to_irc("<strike>no</strike>"), "\x1Eno\x1E");
    }

    #[test]
    fn test_links_and_images() {
        let t = translator();
        assert_eq!(
            t.to_irc(r#"see <a href="https://example.com/x">this</a>"#),
            "see [https://example.com/x] this"
        );
        assert_eq!(
            t.to_irc(r#"<img src="//i.stack.imgur.com/a.png">"#),
            "[img https://i.stack.imgur.com/a.png]"
        );
        assert_eq!(
            t.to_irc(r#"<a href="/users/1/bob">bob</a>"#),
            "[https://chat.stackexchange.com/users/1/bob] bob"
        );
    }

    #[test]
    fn test_repeated_link_suppressed() {
        let t = translator();
        let html = r#"<a href="http://a.io">one</a> and <a href="http://a.io">two</a>"#;
        let out = t.to_irc(html);
        assert_eq!(out.matches("[http://a.io]").count(), 1);
        assert!(out.contains("two"));
    }

    #[test]
    fn test_unknown_tags_collapse() {
        let t = translator();
        assert_eq!(t.to_irc("a<div><span>b</span></div>c"), "a b c");
    }

    #[test]
    fn test_entities_decoded_last() {
        let t = translator();
        assert_eq!(t.to_irc("1 &lt; 2 &amp;&amp; &quot;x&quot;"), "1 < 2 && \"x\"");
        assert_eq!(t.to_irc("&lt;b&gt;"), "<b>");
    }

    #[test]
    fn test_line_breaks() {
        let t = translator();
        assert_eq!(t.to_irc("one<br>two"), "one\ntwo");
    }

    #[test]
    fn test_irc_to_chat() {
        assert_eq!(irc_to_chat("\x02hi\x02"), "**hi**");
        assert_eq!(irc_to_chat("\x1Fhi\x1F \x1Dthere\x1D"), "_hi_ *there*");
        assert_eq!(irc_to_chat("\x0304red\x03 text\x0F"), "red text");
        assert_eq!(irc_to_chat("\x01ACTION waves\x01"), "*waves*");
        assert_eq!(irc_to_chat("plain"), "plain");
    }

    #[test]
    fn test_action_helpers() {
        assert_eq!(unwrap_action("\x01ACTION dances\x01"), Some("dances"));
        assert_eq!(unwrap_action("dances"), None);
        assert_eq!(to_action("dances"), "\x01ACTION dances\x01");
    }

    #[test]
    fn test_strip_leading_mention() {
        assert_eq!(strip_leading_mention("@bob hello there"), "hello there");
        assert_eq!(strip_leading_mention("hello @bob"), "hello @bob");
        assert_eq!(strip_leading_mention("@bob"), "");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 16), "short");
        assert_eq!(preview("exactly sixteen!", 16), "exactly sixteen!");
        assert_eq!(preview("this is rather longer", 16), "this is rather l…");
        assert_eq!(preview("ééééé", 2), "éé…");
    }

    #[test]
    fn test_diffstr_insertion() {
        assert_eq!(diffstr("hello world", "hello there world", 0), "…there…");
    }

    #[test]
    fn test_diffstr_repeated_chars() {
        assert_eq!(diffstr("aa", "aaa", 0), "…a");
        assert_eq!(diffstr("hello there world", "hello world", 0), "……");
    }

    #[test]
    fn test_diffstr_identical() {
        assert_eq!(diffstr("abc", "abc", 0), "");
    }

    #[test]
    fn test_diffstr_context() {
        assert_eq!(
            diffstr("the quick brown fox jumps", "the quick red fox jumps", 4),
            "…ick red fox…"
        );
        assert_eq!(diffstr("ab", "abc", 8), "abc");
    }

    #[test]
    fn test_diffstr_multibyte() {
        assert_eq!(diffstr("café au lait", "café noir", 0), "…noir");
    }
}
