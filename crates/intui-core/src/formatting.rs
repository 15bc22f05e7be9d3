//! Reply formatting for Telegram HTML parse mode.

use crate::session::Interaction;

/// Marker introducing the advice block in an interpretation.
pub const ADVICE_MARKER: &str = "Совет:";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Interpretation split at the first advice marker.
///
/// `main + ADVICE_MARKER + advice` is exactly the original text; trimming is a
/// rendering concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdviceSplit<'a> {
    pub main: &'a str,
    pub advice: &'a str,
}

/// Split only when both sides carry content; otherwise the caller keeps the
/// text untouched.
pub fn split_advice(text: &str) -> Option<AdviceSplit<'_>> {
    let idx = text.find(ADVICE_MARKER)?;
    let main = &text[..idx];
    let advice = &text[idx + ADVICE_MARKER.len()..];
    if main.trim().is_empty() || advice.trim().is_empty() {
        return None;
    }
    Some(AdviceSplit { main, advice })
}

pub fn render_interpretation(main: &str, advice: Option<&str>) -> String {
    let mut out = escape_html(main.trim());
    if let Some(advice) = advice {
        out.push_str("\n\n💡 <b>");
        out.push_str(ADVICE_MARKER);
        out.push_str("</b> <i>");
        out.push_str(&escape_html(advice.trim()));
        out.push_str("</i>");
    }
    out
}

/// Most-recent-first listing for `/history`.
pub fn render_history(history: &[Interaction]) -> String {
    if history.is_empty() {
        return "📭 История пока пуста. Расскажи мне свой сон!".to_string();
    }

    let mut out = String::from("📜 <b>Последние толкования</b>");
    for (n, it) in history.iter().rev().enumerate() {
        out.push_str(&format!(
            "\n\n<b>{}.</b> <i>{}</i>\n🌙 {}\n🔮 {}",
            n + 1,
            escape_html(&it.style),
            escape_html(&truncate_text(&it.input, 200)),
            escape_html(&truncate_text(&it.output, 600)),
        ));
    }
    out
}

/// Split rendered HTML into chunks of at most `limit` chars.
///
/// Breaks fall on whitespace where possible and never inside a tag or an
/// entity. Tags still open at a break are closed and reopened in the next chunk.
pub fn split_html(html: &str, limit: usize) -> Vec<String> {
    if html.chars().count() <= limit {
        return vec![html.to_string()];
    }

    let mut chunker = HtmlChunker::new(limit);
    let mut rest = html;
    while !rest.is_empty() {
        let (text, tag) = match rest.find('<') {
            Some(start) => match rest[start..].find('>') {
                Some(end) => (&rest[..start], Some(&rest[start..=start + end])),
                None => (rest, None),
            },
            None => (rest, None),
        };
        for word in text.split_inclusive(char::is_whitespace) {
            chunker.push_word(word);
        }
        match tag {
            Some(tag) => {
                chunker.push_tag(tag);
                rest = &rest[text.len() + tag.len()..];
            }
            None => rest = "",
        }
    }
    chunker.finish()
}

struct OpenTag {
    open: String,
    close: String,
}

struct HtmlChunker {
    limit: usize,
    out: Vec<String>,
    cur: String,
    cur_len: usize,
    has_text: bool,
    open: Vec<OpenTag>,
}

impl HtmlChunker {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            out: Vec::new(),
            cur: String::new(),
            cur_len: 0,
            has_text: false,
            open: Vec::new(),
        }
    }

    fn closing_len(&self) -> usize {
        self.open.iter().map(|t| t.close.chars().count()).sum()
    }

    fn fits(&self, len: usize) -> bool {
        self.cur_len + len + self.closing_len() <= self.limit
    }

    fn append(&mut self, s: &str) {
        self.cur.push_str(s);
        self.cur_len += s.chars().count();
    }

    fn push_tag(&mut self, tag: &str) {
        let name: String = tag
            .trim_start_matches('<')
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let close = format!("</{name}>");

        if tag.starts_with("</") {
            if let Some(pos) = self.open.iter().rposition(|t| t.close == close) {
                self.open.remove(pos);
            }
            self.append(tag);
            return;
        }

        if self.has_text && !self.fits(tag.chars().count() + close.chars().count()) {
            self.flush();
        }
        self.append(tag);
        self.open.push(OpenTag {
            open: tag.to_string(),
            close,
        });
    }

    fn push_word(&mut self, word: &str) {
        let len = word.chars().count();
        if self.fits(len) {
            self.append(word);
            self.has_text = true;
            return;
        }
        if self.has_text {
            self.flush();
            if self.fits(len) {
                self.append(word);
                self.has_text = true;
                return;
            }
        }

        // Longer than a whole chunk: fall back to entity-safe pieces.
        for piece in entity_safe_pieces(word) {
            if self.has_text && !self.fits(piece.chars().count()) {
                self.flush();
            }
            self.append(piece);
            self.has_text = true;
        }
    }

    fn flush(&mut self) {
        let mut done = std::mem::take(&mut self.cur);
        for tag in self.open.iter().rev() {
            done.push_str(&tag.close);
        }
        self.out.push(done);

        self.cur_len = 0;
        self.has_text = false;
        let reopen: String = self.open.iter().map(|t| t.open.as_str()).collect();
        self.append(&reopen);
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_text || self.out.is_empty() {
            for tag in self.open.iter().rev() {
                self.cur.push_str(&tag.close);
            }
            self.out.push(self.cur);
        }
        self.out
    }
}

/// Single chars, except that `&...;` entities stay whole.
fn entity_safe_pieces(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = s.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let mut end = i + c.len_utf8();
        if c == '&' {
            if let Some(semi) = s[i..].find(';').filter(|&n| n <= 8) {
                end = i + semi + 1;
                while iter.peek().is_some_and(|&(j, _)| j < end) {
                    iter.next();
                }
            }
        }
        out.push(&s[i..end]);
    }
    out
}

/// Char-safe truncation with an ellipsis.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_reconstructs_original() {
        let text = "Ты паришь... Совет: доверяй интуиции.";
        let s = split_advice(text).unwrap();
        assert_eq!(s.main.trim(), "Ты паришь...");
        assert_eq!(s.advice.trim(), "доверяй интуиции.");
        assert_eq!(format!("{}{}{}", s.main, ADVICE_MARKER, s.advice), text);
    }

    #[test]
    fn splits_at_first_marker_only() {
        let text = "А. Совет: б. Совет: в.";
        let s = split_advice(text).unwrap();
        assert_eq!(s.main, "А. ");
        assert_eq!(s.advice, " б. Совет: в.");
    }

    #[test]
    fn no_split_without_marker_or_content() {
        assert_eq!(split_advice("Просто сон."), None);
        assert_eq!(split_advice("Совет: только совет"), None);
        assert_eq!(split_advice("Только текст. Совет:   "), None);
    }

    #[test]
    fn renders_two_segments_escaped() {
        let html = render_interpretation("Сон <о> море ", Some(" плыви & дыши"));
        assert_eq!(
            html,
            "Сон &lt;о&gt; море\n\n💡 <b>Совет:</b> <i>плыви &amp; дыши</i>"
        );
        assert_eq!(render_interpretation("a & b", None), "a &amp; b");
    }

    #[test]
    fn history_is_most_recent_first() {
        let h = vec![
            Interaction::new("первый", "o1", "Интуи"),
            Interaction::new("второй", "o2", "Поэт"),
        ];
        let html = render_history(&h);
        let first = html.find("второй").unwrap();
        let second = html.find("первый").unwrap();
        assert!(first < second);
        assert!(render_history(&[]).contains("пуста"));
    }

    #[test]
    fn short_html_is_one_chunk() {
        let html = render_interpretation("Сон", Some("спи"));
        assert_eq!(split_html(&html, 4096), vec![html]);
    }

    #[test]
    fn long_reply_is_split_within_limit() {
        let main = "сон ".repeat(1500);
        let advice = "дыши & плыви ".repeat(400);
        let html = render_interpretation(&main, Some(&advice));
        assert!(html.chars().count() > 4096);

        let chunks = split_html(&html, 4096);
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(c.chars().count() <= 4096, "{}", c.chars().count());
            assert_eq!(c.matches("<i>").count(), c.matches("</i>").count());
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count());
        }
        // Advice continues in italics after a break.
        assert!(chunks.last().unwrap().starts_with("<i>"));

        let joined: String = chunks.concat().replace("</i><i>", "");
        assert_eq!(joined, html);
    }

    #[test]
    fn unbroken_text_never_cuts_an_entity() {
        let html = "&amp;".repeat(10);
        let chunks = split_html(&html, 12);
        assert_eq!(chunks.concat(), html);
        for c in &chunks {
            assert!(c.chars().count() <= 12);
            assert!(c.starts_with('&') && c.ends_with(';'));
        }
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_text("сонсон", 3), "сон...");
        assert_eq!(truncate_text("сон", 3), "сон");
    }
}
