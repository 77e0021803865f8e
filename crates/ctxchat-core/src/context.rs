use serde::{Deserialize, Serialize};

use crate::text::{char_len, tail_chars};

/// History keeps at most this many trailing characters after a chat turn.
pub const HISTORY_MAX_CHARS: usize = 3000;
/// The context blob keeps at most this many trailing characters.
pub const BLOB_MAX_CHARS: usize = 5000;
/// Default cap on URLs per user; configurable at the server layer.
pub const DEFAULT_MAX_URLS: usize = 3;

/// Everything the server knows about one user. Created lazily on first
/// mutation, lives for the process lifetime, removed entirely on reset.
///
/// `context_blob` is derived from `urls` + `documents`: incrementally
/// appended on add, recomputed from scratch on remove. It is never patched
/// in place on removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub history: String,
    pub urls: Vec<String>,
    pub documents: Vec<Document>,
    pub context_blob: String,
}

/// An uploaded document: caller-supplied name (unique per user) and its
/// already-extracted plain text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub text: String,
}

/// Rendered blob block for a URL source. The leading newline is part of the
/// format: blocks concatenate directly with no other separator.
pub fn url_block(url: &str, text: &str) -> String {
    format!("\nContext from {url}:\n{text}")
}

/// Rendered blob block for a document source.
pub fn document_block(name: &str, text: &str) -> String {
    format!("\nContext from document ({name}):\n{text}")
}

impl UserContext {
    pub fn has_url(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    pub fn has_document(&self, name: &str) -> bool {
        self.documents.iter().any(|d| d.name == name)
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    /// Full prompt for one chat turn.
    pub fn prompt(&self, message: &str) -> String {
        format!(
            "{}\n{}\nUser: {message}\nAI:",
            self.context_blob, self.history
        )
    }

    /// Record a completed chat turn, then drop the oldest characters beyond
    /// the history window.
    pub fn append_turn(&mut self, message: &str, reply: &str) {
        self.history.push_str(&format!("\nUser: {message}\nAI: {reply}"));
        if char_len(&self.history) > HISTORY_MAX_CHARS {
            self.history = tail_chars(&self.history, HISTORY_MAX_CHARS).to_string();
        }
    }

    /// Incremental add: append one rendered block to the existing blob and
    /// re-apply the blob cap.
    pub fn append_context_block(&mut self, block: &str) {
        self.context_blob.push_str(block);
        if char_len(&self.context_blob) > BLOB_MAX_CHARS {
            self.context_blob = tail_chars(&self.context_blob, BLOB_MAX_CHARS).to_string();
        }
    }

    /// Replace the blob wholesale (removal rebuild). The cap applies here
    /// too, so both mutation paths leave the same bound.
    pub fn replace_context_blob(&mut self, blob: String) {
        self.context_blob = blob;
        if char_len(&self.context_blob) > BLOB_MAX_CHARS {
            self.context_blob = tail_chars(&self.context_blob, BLOB_MAX_CHARS).to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        let ctx = UserContext::default();
        assert_eq!(ctx.history, "");
        assert!(ctx.urls.is_empty());
        assert!(ctx.documents.is_empty());
        assert_eq!(ctx.context_blob, "");
    }

    #[test]
    fn url_block_format() {
        assert_eq!(
            url_block("http://a", "A-text"),
            "\nContext from http://a:\nA-text"
        );
    }

    #[test]
    fn document_block_format() {
        assert_eq!(
            document_block("notes.txt", "body"),
            "\nContext from document (notes.txt):\nbody"
        );
    }

    #[test]
    fn prompt_composition() {
        let ctx = UserContext {
            history: "\nUser: a\nAI: b".into(),
            context_blob: "\nContext from http://a:\nA-text".into(),
            ..Default::default()
        };
        assert_eq!(
            ctx.prompt("hi"),
            "\nContext from http://a:\nA-text\n\nUser: a\nAI: b\nUser: hi\nAI:"
        );
    }

    #[test]
    fn prompt_for_fresh_user() {
        let ctx = UserContext::default();
        assert_eq!(ctx.prompt("hi"), "\n\nUser: hi\nAI:");
    }

    #[test]
    fn append_turn_builds_transcript() {
        let mut ctx = UserContext::default();
        ctx.append_turn("hi", "Hello");
        assert_eq!(ctx.history, "\nUser: hi\nAI: Hello");
        ctx.append_turn("more", "Sure");
        assert_eq!(ctx.history, "\nUser: hi\nAI: Hello\nUser: more\nAI: Sure");
    }

    #[test]
    fn append_turn_keeps_trailing_window() {
        let mut ctx = UserContext::default();
        let long_reply = "x".repeat(HISTORY_MAX_CHARS);
        ctx.append_turn("first", &long_reply);
        ctx.append_turn("second", "tail");
        assert_eq!(ctx.history.chars().count(), HISTORY_MAX_CHARS);
        assert!(ctx.history.ends_with("\nUser: second\nAI: tail"));
        // The window is the exact trailing slice of the logical transcript.
        let logical = format!(
            "\nUser: first\nAI: {long_reply}\nUser: second\nAI: tail"
        );
        let tail: String = logical
            .chars()
            .skip(logical.chars().count() - HISTORY_MAX_CHARS)
            .collect();
        assert_eq!(ctx.history, tail);
    }

    #[test]
    fn append_turn_window_is_char_based() {
        let mut ctx = UserContext::default();
        ctx.append_turn("q", &"é".repeat(HISTORY_MAX_CHARS + 50));
        assert_eq!(ctx.history.chars().count(), HISTORY_MAX_CHARS);
        assert!(ctx.history.chars().all(|c| c == 'é'));
    }

    #[test]
    fn append_context_block_concatenates() {
        let mut ctx = UserContext::default();
        ctx.append_context_block(&url_block("http://a", "A"));
        ctx.append_context_block(&url_block("http://b", "B"));
        assert_eq!(
            ctx.context_blob,
            "\nContext from http://a:\nA\nContext from http://b:\nB"
        );
    }

    #[test]
    fn append_context_block_caps_blob() {
        let mut ctx = UserContext::default();
        ctx.append_context_block(&url_block("http://a", &"a".repeat(BLOB_MAX_CHARS)));
        ctx.append_context_block(&url_block("http://b", "end"));
        assert_eq!(ctx.context_blob.chars().count(), BLOB_MAX_CHARS);
        assert!(ctx.context_blob.ends_with("\nContext from http://b:\nend"));
    }

    #[test]
    fn replace_context_blob_caps_too() {
        let mut ctx = UserContext::default();
        ctx.replace_context_blob("y".repeat(BLOB_MAX_CHARS + 10));
        assert_eq!(ctx.context_blob.chars().count(), BLOB_MAX_CHARS);
    }

    #[test]
    fn membership_checks() {
        let ctx = UserContext {
            urls: vec!["http://a".into()],
            documents: vec![Document { name: "d1".into(), text: "t".into() }],
            ..Default::default()
        };
        assert!(ctx.has_url("http://a"));
        assert!(!ctx.has_url("http://b"));
        assert!(ctx.has_document("d1"));
        assert!(!ctx.has_document("d2"));
    }

    #[test]
    fn document_names_preserve_order() {
        let ctx = UserContext {
            documents: vec![
                Document { name: "b".into(), text: String::new() },
                Document { name: "a".into(), text: String::new() },
            ],
            ..Default::default()
        };
        assert_eq!(ctx.document_names(), vec!["b".to_string(), "a".to_string()]);
    }
}
