//! Text normalizer applied before classification.
//!
//! Lower-cases the input and removes URLs, @mentions, hashtag markers, digits,
//! punctuation and emoji, then collapses whitespace. The function is total:
//! missing input yields an empty string.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?|www\.)\S*").expect("url regex"));
static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention regex"));
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit regex"));
static RE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{P}[:punct:]]").expect("punctuation regex"));
static RE_EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\p{Extended_Pictographic}\p{Emoji_Modifier}\u{1F1E6}-\u{1F1FF}\u{FE0E}\u{FE0F}\u{200D}\u{20E3}\u{E0020}-\u{E007F}]",
    )
    .expect("emoji regex")
});
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Upper bound on cleaning passes; each pass only removes characters so the
/// loop settles after one or two iterations in practice.
const MAX_PASSES: usize = 4;

/// Normalize optional input. `None` maps to an empty string.
pub fn normalize(input: Option<&str>) -> String {
    input.map(normalize_text).unwrap_or_default()
}

/// Normalize text for the classifier.
///
/// Passes repeat until the output stops changing, so removing a `#` that sat
/// inside `ht#tp://…` cannot leave a URL behind for a second call to find.
pub fn normalize_text(input: &str) -> String {
    let mut current = clean_once(input);
    for _ in 1..MAX_PASSES {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn clean_once(input: &str) -> String {
    let mut out = input.to_lowercase();
    out = RE_URL.replace_all(&out, " ").into_owned();
    out = RE_MENTION.replace_all(&out, " ").into_owned();
    out = out.replace('#', "");
    out = RE_DIGITS.replace_all(&out, "").into_owned();
    out = RE_PUNCT.replace_all(&out, "").into_owned();
    out = RE_EMOJI.replace_all(&out, "").into_owned();
    RE_WS.replace_all(&out, " ").trim().to_string()
}
