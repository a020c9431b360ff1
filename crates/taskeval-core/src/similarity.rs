use std::collections::HashMap;

/// Case-insensitive Ratcliff/Obershelp similarity in [0, 1].
///
/// The ratio is `2 * M / T`, where `T` is the total character count of both
/// strings and `M` the number of characters in matching blocks: the longest
/// common substring, then recursively the longest common substrings to its
/// left and right. 1.0 exactly when both strings are equal after
/// lower-casing, 0.0 when they share no character.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    // Tie-breaking between equally long blocks depends on argument order;
    // a canonical order keeps the score symmetric.
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Sequences at least this long drop "popular" characters from the match
/// index, the way `autojunk` heuristics do for long inputs.
const AUTOJUNK_MIN_LEN: usize = 200;

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }
    if b.len() >= AUTOJUNK_MIN_LEN {
        let limit = b.len() / 100 + 1;
        b2j.retain(|_, positions| positions.len() <= limit);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given window. Ties go to
/// the earliest start in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // j2len[j] = length of the match ending at a[i - 1] and b[j].
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        for &j in b2j.get(c).map(Vec::as_slice).unwrap_or_default() {
            if j < blo {
                continue;
            }
            if j >= bhi {
                break;
            }
            let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
            next.insert(j, k);
            if k > best_k {
                (best_i, best_j, best_k) = (i + 1 - k, j + 1 - k, k);
            }
        }
        j2len = next;
    }

    // Popular characters are missing from the index; grow the block over
    // them on both sides.
    while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
        best_i -= 1;
        best_j -= 1;
        best_k += 1;
    }
    while best_i + best_k < ahi && best_j + best_k < bhi && a[best_i + best_k] == b[best_j + best_k] {
        best_k += 1;
    }
    (best_i, best_j, best_k)
}

/// Lower-cased whitespace-separated word set.
pub fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_one() {
        assert_eq!(text_similarity("I went to the store.", "I went to the store."), 1.0);
        assert_eq!(text_similarity("", ""), 1.0);
    }

    #[test]
    fn test_case_invariant() {
        assert_eq!(text_similarity("Hello World", "hello world"), 1.0);
        assert_eq!(
            text_similarity("The Answer", "the answr"),
            text_similarity("the answer", "THE ANSWR")
        );
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("kitten", "sitting"),
            ("这个产品真的很棒", "这个产品很差"),
            ("abc", ""),
            ("I have went", "I went"),
            ("ab", "ba"),
            ("I went home", "went home I"),
            ("abcabc", "cbacba"),
        ];
        for (a, b) in pairs {
            assert_eq!(text_similarity(a, b), text_similarity(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn test_disjoint_is_zero() {
        assert_eq!(text_similarity("abc", "xyz"), 0.0);
        assert_eq!(text_similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_ratio_over_matching_blocks() {
        assert_eq!(text_similarity("ab", "ba"), 0.5);
        assert!((text_similarity("abc", "abcdef") - 2.0 / 3.0).abs() < 1e-9);
        // "went home" is the only block: 2 * 9 / 22
        assert!((text_similarity("I went home", "went home I") - 9.0 / 11.0).abs() < 1e-9);
        // "i " + "e" + " home": 2 * 8 / 22
        assert!((text_similarity("I goed home", "I went home") - 8.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_keeps_one_block() {
        assert_eq!(text_similarity("abcdefgh", "efghabcd"), 0.5);
    }

    #[test]
    fn test_long_inputs_are_symmetric() {
        let a = "the quick brown fox jumps over the lazy dog ".repeat(8);
        let b = "the lazy dog sleeps while the quick brown fox runs ".repeat(8);
        let s = text_similarity(&a, &b);
        assert_eq!(s, text_similarity(&b, &a));
        assert!(s > 0.0 && s < 1.0, "{s}");
    }

    #[test]
    fn test_partial_overlap_is_between() {
        let s = text_similarity("I have went to the store", "I went to the store");
        assert!(s > 0.5 && s < 1.0, "{s}");
    }

    #[test]
    fn test_word_set_lowercases() {
        let words = word_set("Rust is FAST  rust");
        assert_eq!(words.len(), 3);
        assert!(words.contains("fast"));
    }
}
