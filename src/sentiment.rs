use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Largest absolute word score in the lexicon; used to normalize into [-1, 1].
const MAX_WORD_SCORE: f32 = 5.0;

/// Source of a sentiment polarity score in [-1, 1].
///
/// The rule engine only needs the number; an external scorer can be injected
/// in place of the bundled lexicon.
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f32;
}

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (raw score, number of lexicon hits, number of tokens).
    /// Negation: a negator within the previous 1..=3 tokens flips the sign of
    /// the word's lexicon score.
    pub fn score_text(&self, text: &str) -> (i32, usize, usize) {
        // collect so we can look back for negators
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits: usize = 0;

        for i in 0..tokens.len() {
            let w = tokens[i].as_str();
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));

            let base = self.word_score(w);
            if base != 0 {
                hits += 1;
                score += if negated { -base } else { base };
            }
        }

        (score, hits, tokens.len())
    }
}

impl PolarityScorer for LexiconScorer {
    /// Mean lexicon score of the matched words, scaled into [-1, 1].
    /// Text without any lexicon word is neutral (0.0).
    fn polarity(&self, text: &str) -> f32 {
        let (score, hits, _) = self.score_text(text);
        if hits == 0 {
            return 0.0;
        }
        (score as f32 / (MAX_WORD_SCORE * hits as f32)).clamp(-1.0, 1.0)
    }
}

/// Alphanumeric tokens (apostrophes kept so "isn't" survives), lower-case.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_text_scores_above_zero() {
        let p = LexiconScorer::new().polarity("Great kettle, we are very pleased");
        assert!(p > 0.1, "got {p}");
    }

    #[test]
    fn negation_flips_sign() {
        let s = LexiconScorer::new();
        assert!(s.polarity("good") > 0.0);
        assert!(s.polarity("not good") < 0.0);
        assert!(s.polarity("this isn't good at all") < 0.0);
    }

    #[test]
    fn neutral_text_is_zero() {
        assert_eq!(LexiconScorer::new().polarity("the box arrived on tuesday"), 0.0);
    }

    #[test]
    fn polarity_stays_in_range() {
        let s = LexiconScorer::new();
        for t in ["awful terrible horrible", "amazing amazing amazing", ""] {
            let p = s.polarity(t);
            assert!((-1.0..=1.0).contains(&p), "{t}: {p}");
        }
    }
}
