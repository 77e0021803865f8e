//! Character-window truncation utilities.
//!
//! History and context-blob caps are defined in characters, not bytes, and
//! retain the *tail* of the text (oldest content drops first). Slicing a
//! `&str` at a byte offset panics inside a multi-byte character, so these
//! helpers count chars and cut at a char boundary.

/// Keep at most the last `max_chars` characters of `s`.
///
/// Returns `s` unchanged when it already fits. The cut never splits a
/// multi-byte character.
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    let total = s.chars().count();
    if total <= max_chars {
        return s;
    }
    let skip = total - max_chars;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

/// Number of characters in `s`. Companion to [`tail_chars`] so cap checks
/// and cap application count the same way.
#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── tail_chars ───────────────────────────────────────────────────────

    #[test]
    fn within_limit() {
        assert_eq!(tail_chars("hello", 10), "hello");
    }

    #[test]
    fn exact_limit() {
        assert_eq!(tail_chars("hello", 5), "hello");
    }

    #[test]
    fn keeps_tail_not_head() {
        assert_eq!(tail_chars("hello world", 5), "world");
    }

    #[test]
    fn empty_string() {
        assert_eq!(tail_chars("", 5), "");
    }

    #[test]
    fn zero_max() {
        assert_eq!(tail_chars("hello", 0), "");
    }

    #[test]
    fn multibyte_counted_as_one_char() {
        // '—' (U+2014) is 3 bytes but one char
        let s = "ab—cd";
        assert_eq!(tail_chars(s, 3), "—cd");
        assert_eq!(tail_chars(s, 4), "b—cd");
        assert_eq!(tail_chars(s, 5), "ab—cd");
    }

    #[test]
    fn emoji_4_byte() {
        // '🦀' (U+1F980) is 4 bytes, one char
        let s = "hi🦀bye";
        assert_eq!(tail_chars(s, 3), "bye");
        assert_eq!(tail_chars(s, 4), "🦀bye");
        assert_eq!(tail_chars(s, 6), "hi🦀bye");
    }

    #[test]
    fn all_multibyte() {
        let s = "———";
        assert_eq!(tail_chars(s, 0), "");
        assert_eq!(tail_chars(s, 1), "—");
        assert_eq!(tail_chars(s, 2), "——");
        assert_eq!(tail_chars(s, 3), "———");
        assert_eq!(tail_chars(s, 9), "———");
    }

    #[test]
    fn window_slides_as_text_grows() {
        let mut s = String::new();
        for i in 0..10 {
            s.push_str(&format!("line{i}\n"));
            s = tail_chars(&s, 12).to_string();
        }
        // Each entry is 6 chars, so the 12-char window holds the last two.
        assert_eq!(s, "line8\nline9\n");
    }

    // ── char_len ─────────────────────────────────────────────────────────

    #[test]
    fn char_len_counts_chars_not_bytes() {
        assert_eq!(char_len("abc"), 3);
        assert_eq!(char_len("ab—"), 3);
        assert_eq!(char_len("🦀"), 1);
        assert_eq!(char_len(""), 0);
    }
}
