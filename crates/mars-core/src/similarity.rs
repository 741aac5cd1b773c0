//! Character-level sequence matching and sentence extraction.
//!
//! `ratio` implements the canonical longest-matching-block similarity:
//! blocks are found by repeatedly taking the longest contiguous match
//! (earliest in the first input, then earliest in the second), and the
//! score is `2 * M / T` where M is the total matched length and T the
//! sum of the input lengths. Equal strings score 1.0, disjoint strings
//! 0.0.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Match {
    a: usize,
    b: usize,
    size: usize,
}

/// Longest contiguous match of `a[alo..ahi]` within `b[blo..bhi]`.
fn find_longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> Match {
    let mut best = Match { a: alo, b: blo, size: 0 };
    // j2len[j] = length of the match ending at a[i], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(indices) = b2j.get(ch) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j == 0 { 1 } else { j2len.get(&(j - 1)).copied().unwrap_or(0) + 1 };
                new_j2len.insert(j, k);
                if k > best.size {
                    best = Match { a: i + 1 - k, b: j + 1 - k, size: k };
                }
            }
        }
        j2len = new_j2len;
    }
    best
}

fn matching_blocks(a: &[char], b: &[char]) -> Vec<Match> {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, ch) in b.iter().enumerate() {
        b2j.entry(*ch).or_default().push(j);
    }

    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = find_longest_match(a, &b2j, alo, ahi, blo, bhi);
        if m.size == 0 {
            continue;
        }
        if alo < m.a && blo < m.b {
            queue.push((alo, m.a, blo, m.b));
        }
        if m.a + m.size < ahi && m.b + m.size < bhi {
            queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
        }
        blocks.push(m);
    }
    blocks
}

/// Similarity of two strings in [0, 1].
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = matching_blocks(&a, &b).iter().map(|m| m.size).sum();
    2.0 * matched as f64 / total as f64
}

/// Case-insensitive `ratio`, used for sentence-level matching.
pub fn sentence_ratio(a: &str, b: &str) -> f64 {
    ratio(&a.to_lowercase(), &b.to_lowercase())
}

/// Minimum sentence length kept by `split_sentences`; shorter
/// fragments are noise for attribution.
pub const MIN_SENTENCE_LEN: usize = 20;

/// Split text into sentences for attribution.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or end of
/// input, or at a newline run. Fragments are trimmed and kept only if
/// they are at least [`MIN_SENTENCE_LEN`] characters long.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    let mut flush = |buf: &mut String, out: &mut Vec<String>| {
        let trimmed = buf.trim();
        if trimmed.chars().count() >= MIN_SENTENCE_LEN {
            out.push(trimmed.to_string());
        }
        buf.clear();
    };

    while let Some(c) = chars.next() {
        if c == '\n' {
            flush(&mut current, &mut sentences);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                None => flush(&mut current, &mut sentences),
                Some(next) if next.is_whitespace() => {
                    while chars.peek().is_some_and(|n| n.is_whitespace()) {
                        chars.next();
                    }
                    flush(&mut current, &mut sentences);
                }
                _ => {}
            }
        }
    }
    flush(&mut current, &mut sentences);
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_strings_score_one() {
        assert_eq!(ratio("hello world", "hello world"), 1.0);
    }

    #[test]
    fn test_empty_strings_score_one() {
        assert_eq!(ratio("", ""), 1.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_one_empty_scores_zero() {
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_known_ratios() {
        // blocks "ab" + "cd" -> 2*4 / 9
        let r = ratio("abxcd", "abcd");
        assert!((r - 8.0 / 9.0).abs() < 1e-12);

        // blocks "bcd" -> 2*3 / 8
        let r = ratio("abcd", "bcde");
        assert!((r - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_symmetry_on_near_match() {
        let a = "The sky is blue today.";
        let b = "The sky is blue today!";
        let r = ratio(a, b);
        assert!(r > 0.9 && r < 1.0);
    }

    #[test]
    fn test_sentence_ratio_ignores_case() {
        assert_eq!(sentence_ratio("The Sky Is Blue", "the sky is blue"), 1.0);
    }

    #[test]
    fn test_split_basic() {
        let text = "The sky is blue today. The grass is green this morning.";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "The sky is blue today.".to_string(),
                "The grass is green this morning.".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_drops_short_fragments() {
        let text = "Yes. The answer depends on atmospheric scattering.";
        let sentences = split_sentences(text);
        assert_eq!(sentences, vec!["The answer depends on atmospheric scattering.".to_string()]);
    }

    #[test]
    fn test_split_on_newlines() {
        let text = "A markdown heading without terminator\nAnother full line of prose here";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_split_terminator_at_end() {
        let sentences = split_sentences("Rayleigh scattering favours short wavelengths!");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_split_question_then_exclamation() {
        let text = "Why does the sky look blue at noon? Because short wavelengths scatter the most!";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_decimal_point_does_not_split() {
        let sentences = split_sentences("The threshold value is 0.85 for this entire run.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n  ").is_empty());
    }
}
