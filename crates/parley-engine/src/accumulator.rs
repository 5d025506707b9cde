// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded accumulation of generated text.

/// Appended to a reply that hit the length limit.
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Response truncated: the maximum response length was reached.]";

/// Collects chunks for one response and enforces the character limit.
///
/// Lengths are counted in `char`s. The accumulated text never exceeds
/// `max_chars`; the chunk that would cross the limit is cut to the remaining
/// allowance and every later append is a no-op.
#[derive(Debug, Clone)]
pub struct ResponseAccumulator {
    max_chars: usize,
    char_count: usize,
    text: String,
    truncated: bool,
}

impl ResponseAccumulator {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            char_count: 0,
            text: String::new(),
            truncated: false,
        }
    }

    /// Accepts a chunk and returns the part to emit plus the truncation flag.
    pub fn append(&mut self, chunk: &str) -> (String, bool) {
        if self.truncated {
            return (String::new(), true);
        }

        let incoming = chunk.chars().count();
        let remaining = self.max_chars - self.char_count;
        if incoming <= remaining {
            self.text.push_str(chunk);
            self.char_count += incoming;
            return (chunk.to_string(), false);
        }

        let cut = chunk
            .char_indices()
            .nth(remaining)
            .map_or(chunk.len(), |(idx, _)| idx);
        let emitted = &chunk[..cut];
        self.text.push_str(emitted);
        self.char_count += remaining;
        self.truncated = true;
        (emitted.to_string(), true)
    }

    /// Accumulated text without any notice.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// True when nothing but whitespace has been accepted.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Text to persist: the accumulated text, plus the notice when truncated.
    pub fn final_text(&self) -> String {
        if self.truncated {
            format!("{}{TRUNCATION_NOTICE}", self.text)
        } else {
            self.text.clone()
        }
    }

    /// Discards everything accepted so far.
    pub fn reset(&mut self) {
        self.char_count = 0;
        self.text.clear();
        self.truncated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn passes_chunks_under_the_limit() {
        let mut acc = ResponseAccumulator::new(10);
        assert_eq!(acc.append("hello"), ("hello".to_string(), false));
        assert_eq!(acc.append("world"), ("world".to_string(), false));
        assert_eq!(acc.char_count(), 10);
        assert!(!acc.is_truncated());
        assert_eq!(acc.final_text(), "helloworld");
    }

    #[test]
    fn cuts_the_crossing_chunk() {
        let mut acc = ResponseAccumulator::new(8);
        acc.append("hello");
        assert_eq!(acc.append("world"), ("wor".to_string(), true));
        assert_eq!(acc.append("more"), (String::new(), true));
        assert_eq!(acc.text(), "hellowor");
        assert_eq!(acc.final_text(), format!("hellowor{TRUNCATION_NOTICE}"));
    }

    #[test]
    fn chunk_at_exact_boundary_truncates_to_empty() {
        let mut acc = ResponseAccumulator::new(5);
        assert_eq!(acc.append("hello"), ("hello".to_string(), false));
        assert_eq!(acc.append("!"), (String::new(), true));
        assert!(acc.is_truncated());
    }

    #[test]
    fn counts_chars_not_bytes() {
        let mut acc = ResponseAccumulator::new(3);
        assert_eq!(acc.append("héllo"), ("hél".to_string(), true));
        assert_eq!(acc.char_count(), 3);
    }

    #[test]
    fn reset_clears_state() {
        let mut acc = ResponseAccumulator::new(2);
        acc.append("abc");
        acc.reset();
        assert!(acc.is_blank());
        assert!(!acc.is_truncated());
        assert_eq!(acc.append("ab"), ("ab".to_string(), false));
    }

    proptest! {
        #[test]
        fn never_exceeds_the_limit(
            max in 1usize..64,
            chunks in proptest::collection::vec(".{0,12}", 0..16),
        ) {
            let mut acc = ResponseAccumulator::new(max);
            let mut emitted = String::new();
            for chunk in &chunks {
                let (piece, truncated) = acc.append(chunk);
                emitted.push_str(&piece);
                prop_assert!(acc.char_count() <= max);
                if truncated {
                    prop_assert!(acc.is_truncated());
                }
            }
            prop_assert_eq!(emitted.as_str(), acc.text());
            prop_assert_eq!(acc.text().chars().count(), acc.char_count());

            let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
            prop_assert_eq!(acc.is_truncated(), total > max);
        }
    }
}
