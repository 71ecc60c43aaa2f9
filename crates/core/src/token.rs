//! Token counting.
//!
//! The history budget is expressed in model tokens. An exact BPE tokenizer is
//! an external collaborator, so everything here goes through [`TokenCounter`];
//! [`HeuristicTokenCounter`] is the default and estimates ~4 characters per
//! token, which is within ~10% for GPT-family tokenizers on English text.

/// Tokens charged for any image, whatever its size.
pub const IMAGE_BASE_TOKENS: usize = 85;

/// Tokens charged per 512×512 tile of a large image.
pub const IMAGE_TILE_TOKENS: usize = 170;

const IMAGE_TILE_PX: u32 = 512;

/// Deterministic text → token count mapping.
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Return the longest prefix of `text` that fits in `max_tokens`.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;
}

/// Character-based estimate: 1 token ≈ 4 characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl HeuristicTokenCounter {
    const CHARS_PER_TOKEN: usize = 4;
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(Self::CHARS_PER_TOKEN)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        text.chars()
            .take(max_tokens.saturating_mul(Self::CHARS_PER_TOKEN))
            .collect()
    }
}

/// Token cost of an image of the given size.
///
/// Small images (both sides ≤ 512px) cost the base rate; larger ones add a
/// per-tile charge for every full 512px tile.
pub fn image_tokens(width_px: u32, height_px: u32) -> usize {
    if width_px <= IMAGE_TILE_PX && height_px <= IMAGE_TILE_PX {
        return IMAGE_BASE_TOKENS;
    }
    let tiles = (width_px / IMAGE_TILE_PX) as usize * (height_px / IMAGE_TILE_PX) as usize;
    IMAGE_BASE_TOKENS + IMAGE_TILE_TOKENS * tiles
}

/// Cap `text` at `limit` tokens, appending `suffix` when anything was cut.
pub fn trim_to_token_budget(
    counter: &dyn TokenCounter,
    text: &str,
    limit: usize,
    suffix: &str,
) -> String {
    if counter.count(text) <= limit {
        return text.to_string();
    }
    let mut trimmed = counter.truncate(text, limit);
    trimmed.push_str(suffix);
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(HeuristicTokenCounter.count(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(HeuristicTokenCounter.count("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(HeuristicTokenCounter.count("hello"), 2);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 8 Cyrillic chars, 16 bytes
        assert_eq!(HeuristicTokenCounter.count("привет!!"), 2);
    }

    #[test]
    fn small_image_costs_base_rate() {
        assert_eq!(image_tokens(512, 512), 85);
        assert_eq!(image_tokens(100, 40), 85);
    }

    #[test]
    fn large_image_costs_tiles() {
        assert_eq!(image_tokens(1024, 1024), 85 + 170 * 4);
        assert_eq!(image_tokens(1280, 720), 85 + 170 * 2);
        // One side over the limit but less than a full tile on the other
        assert_eq!(image_tokens(2048, 300), 85);
    }

    #[test]
    fn trim_leaves_short_text_alone() {
        let out = trim_to_token_budget(&HeuristicTokenCounter, "short", 10, "...TRUNCATED");
        assert_eq!(out, "short");
    }

    #[test]
    fn trim_cuts_and_marks_long_text() {
        let text = "a".repeat(100);
        let out = trim_to_token_budget(&HeuristicTokenCounter, &text, 5, "...TRUNCATED");
        assert_eq!(out, format!("{}...TRUNCATED", "a".repeat(20)));
    }
}
