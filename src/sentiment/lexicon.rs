use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{Label, SentimentClassifier};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Deterministic word-weight scorer (Turkish + English).
#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator within the previous 1..=3 tokens, or a Turkish `değil`/`yok`
    /// right after the word, flips the sign of that word's weight.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        // Lower-casing `İ` leaves a combining dot (U+0307) behind; drop it so
        // "İyi" still matches "iyi".
        let folded = text.replace('\u{307}', "");
        let tokens: Vec<String> = tokenize(&folded).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated_before = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let negated_after = tokens
                .get(i + 1)
                .is_some_and(|t| is_postfix_negator(t.as_str()));
            score += if negated_before || negated_after {
                -base
            } else {
                base
            };
        }

        (score, tokens.len())
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, clean: &str) -> Result<Label> {
        if clean.trim().is_empty() {
            return Ok(Label::Neutral);
        }
        let (score, _) = self.score_text(clean);
        Ok(match score {
            s if s > 0 => Label::Positive,
            s if s < 0 => Label::Negative,
            _ => Label::Neutral,
        })
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens, lower-cased (Unicode aware, so `ç`, `ğ`, `ş` survive).
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isnt" | "wasnt" | "arent" | "wont" | "cant" | "cannot"
            | "without" | "asla"
    )
}

/// Turkish negation follows the word it negates ("güzel değil").
fn is_postfix_negator(tok: &str) -> bool {
    matches!(tok, "değil" | "degil" | "yok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turkish_positive_phrase() {
        let c = LexiconClassifier::new();
        assert_eq!(c.classify("çok güzel bir gün").unwrap(), Label::Positive);
        // Same input, same answer.
        assert_eq!(c.classify("çok güzel bir gün").unwrap(), Label::Positive);
    }

    #[test]
    fn turkish_negation_flips() {
        let c = LexiconClassifier::new();
        assert_eq!(c.classify("hiç güzel değil").unwrap(), Label::Negative);
        assert_eq!(c.classify("güzel değil").unwrap(), Label::Negative);
    }

    #[test]
    fn english_negation_within_three_tokens() {
        let c = LexiconClassifier::new();
        assert_eq!(c.classify("this is not good").unwrap(), Label::Negative);
        assert_eq!(c.classify("good").unwrap(), Label::Positive);
    }

    #[test]
    fn empty_and_unknown_are_neutral() {
        let c = LexiconClassifier::new();
        assert_eq!(c.classify("").unwrap(), Label::Neutral);
        assert_eq!(c.classify("   ").unwrap(), Label::Neutral);
        assert_eq!(c.classify("masa sandalye").unwrap(), Label::Neutral);
    }

    #[test]
    fn dotted_capital_i_is_folded() {
        let c = LexiconClassifier::new();
        let lowered = "İYİ".to_lowercase();
        assert_eq!(c.classify(&lowered).unwrap(), Label::Positive);
    }

    #[test]
    fn negative_words() {
        let c = LexiconClassifier::new();
        assert_eq!(c.classify("berbat bir hizmet").unwrap(), Label::Negative);
    }
}
