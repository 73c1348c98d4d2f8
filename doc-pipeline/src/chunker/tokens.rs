//! Token counting (spec §4.B common token counter). Tokenisation used for
//! slicing windows is always whitespace-split; the `TokenCounter` only
//! governs how a *count* is estimated for threshold comparisons.

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// `max(1, round(1.3 * whitespace_tokens))` — used when no BPE tokeniser is
/// available (spec §4.B default).
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        let whitespace_tokens = text.split_whitespace().count();
        ((whitespace_tokens as f64) * 1.3).round().max(1.0) as usize
    }
}

#[cfg(feature = "bpe")]
pub struct BpeTokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "bpe")]
impl BpeTokenCounter {
    pub fn cl100k() -> Result<Self, anyhow::Error> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
        })
    }
}

#[cfg(feature = "bpe")]
impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len().max(1)
    }
}

/// Whitespace-split tokens, used for window slicing by every chunker.
pub fn whitespace_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_counter_scales_by_1_3() {
        let counter = ApproxTokenCounter;
        assert_eq!(counter.count("one two three four"), 5);
        assert_eq!(counter.count(""), 1);
    }
}
