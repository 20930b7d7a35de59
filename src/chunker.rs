//! Splits transcripts into overlapping, sentence-boundary-aware chunks.
//!
//! Windows are measured in characters, not bytes, so multi-byte text can
//! never be cut inside a codepoint. Consecutive windows share `overlap`
//! characters of context so a concept spanning a boundary is still captured
//! whole in at least one chunk.

use crate::types::{RecallError, Result};

/// Default window length in characters.
pub const DEFAULT_TARGET_SIZE: usize = 500;

/// Default number of characters shared between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 100;

/// Parameters controlling how transcripts are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Window length in characters. Must be positive.
    pub target_size: usize,
    /// Characters shared between consecutive windows. Must be smaller than
    /// `target_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Creates a validated configuration.
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            target_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects parameter combinations that could never terminate or produce
    /// useful windows.
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(RecallError::Configuration(
                "chunker target_size must be positive".into(),
            ));
        }
        if self.overlap >= self.target_size {
            return Err(RecallError::Configuration(format!(
                "chunker overlap ({}) must be smaller than target_size ({})",
                self.overlap, self.target_size
            )));
        }
        Ok(())
    }

    /// Splits `text` into trimmed, non-empty chunks.
    ///
    /// Text shorter than `target_size` yields at most one chunk. Longer text
    /// is carved into windows of `target_size` characters, preferring to cut
    /// just after the sentence delimiter nearest the window end when that
    /// point lies at or past the window midpoint; otherwise the window is
    /// hard-cut, which may split a word.
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        self.validate()?;

        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }
        if chars.len() < self.target_size {
            let trimmed = text.trim();
            return Ok(if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            });
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = start + self.target_size;
            if end < chars.len() {
                let midpoint = start + self.target_size / 2;
                if let Some(cut) = nearest_boundary(&chars, start, end, midpoint) {
                    end = cut;
                }
            } else {
                end = chars.len();
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end < chars.len() {
                let next = end.saturating_sub(self.overlap);
                // A boundary cut landing closer to the window start than the
                // overlap width would move the cursor backwards; clamp so the
                // loop always advances.
                start = if next > start { next } else { end };
            } else {
                start = chars.len();
            }
        }

        Ok(chunks)
    }
}

/// Finds the cut position just after the sentence delimiter nearest to the
/// window end, provided that position lies at or past `midpoint`.
///
/// Delimiters are `.`/`!`/`?` followed by a space, or a bare newline. The cut
/// keeps the punctuation in the current chunk.
fn nearest_boundary(chars: &[char], start: usize, end: usize, midpoint: usize) -> Option<usize> {
    let mut idx = end;
    while idx > start {
        idx -= 1;
        let cut = match chars[idx] {
            '\n' => idx + 1,
            '.' | '!' | '?' if idx + 1 < end && chars[idx + 1] == ' ' => idx + 1,
            _ => continue,
        };
        if cut >= midpoint {
            return Some(cut);
        }
        // Every remaining candidate sits further left and would produce an
        // even shorter chunk.
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let config = ChunkerConfig::default();
        assert!(config.split("").unwrap().is_empty());
    }

    #[test]
    fn whitespace_only_text_yields_no_chunks() {
        let config = ChunkerConfig::default();
        assert!(config.split("   \n\t  ").unwrap().is_empty());
    }

    #[test]
    fn short_text_yields_single_trimmed_chunk() {
        let config = ChunkerConfig::default();
        let chunks = config.split("  a brief remark about the meeting  ").unwrap();
        assert_eq!(chunks, vec!["a brief remark about the meeting".to_string()]);
    }

    #[test]
    fn splits_on_sentence_boundaries() {
        let config = ChunkerConfig {
            target_size: 4,
            overlap: 1,
        };
        let chunks = config.split("A. B. C.").unwrap();
        assert!(chunks.len() >= 2, "expected multiple chunks, got {chunks:?}");
        for chunk in &chunks {
            let last = chunk.chars().last().unwrap();
            assert!(
                matches!(last, '.' | '!' | '?'),
                "chunk {chunk:?} does not end at a sentence delimiter"
            );
        }
    }

    #[test]
    fn hard_cut_when_no_delimiter_exists() {
        let config = ChunkerConfig {
            target_size: 500,
            overlap: 100,
        };
        let text = "x".repeat(1000);
        let chunks = config.split(&text).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[1].len(), 500);
        assert_eq!(chunks[2].len(), 200);
    }

    #[test]
    fn hard_cut_windows_leave_no_gaps() {
        let config = ChunkerConfig {
            target_size: 100,
            overlap: 20,
        };
        // Distinct characters let us verify coverage positionally.
        let text: String = (0..400).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = config.split(&text).unwrap();

        // Windows start every target_size - overlap characters, so stitching
        // the first 80 characters of each chunk (plus the final tail)
        // reconstructs the input exactly.
        let stride = config.target_size - config.overlap;
        let mut reconstructed = String::new();
        for chunk in &chunks[..chunks.len() - 1] {
            reconstructed.push_str(&chunk[..stride]);
        }
        reconstructed.push_str(chunks.last().unwrap());
        assert_eq!(reconstructed, text);
    }

    #[test]
    fn multibyte_text_never_splits_a_codepoint() {
        let config = ChunkerConfig {
            target_size: 50,
            overlap: 10,
        };
        let text = "é".repeat(180);
        let chunks = config.split(&text).unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].chars().count(), 50);
    }

    #[test]
    fn pathological_overlap_still_terminates() {
        let config = ChunkerConfig {
            target_size: 10,
            overlap: 9,
        };
        let text = "aaaa. aaaa. aaaa. aaaa. aaaa. aaaa.";
        let chunks = config.split(text).unwrap();
        assert!(!chunks.is_empty());
    }

    #[test]
    fn rejects_zero_target_size() {
        assert!(matches!(
            ChunkerConfig::new(0, 0),
            Err(RecallError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_target() {
        assert!(matches!(
            ChunkerConfig::new(100, 100),
            Err(RecallError::Configuration(_))
        ));
        assert!(matches!(
            ChunkerConfig::new(100, 150),
            Err(RecallError::Configuration(_))
        ));
    }

    #[test]
    fn exact_target_length_text_is_a_single_chunk() {
        let config = ChunkerConfig {
            target_size: 12,
            overlap: 3,
        };
        let text = "abcdefghijkl";
        assert_eq!(config.split(text).unwrap(), vec![text.to_string()]);
    }
}
