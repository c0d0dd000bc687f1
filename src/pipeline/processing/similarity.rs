//! Name normalization and string similarity used by cross-source matching.

/// Case, punctuation and whitespace-insensitive form of a name
pub fn normalize_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .replace('&', " and ")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in [0, 1] of two names after normalization (1 - levenshtein / longest length)
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}

/// Levenshtein distance between two strings
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();

    // single rolling row
    let mut row: Vec<usize> = (0..=chars2.len()).collect();
    for i in 1..=chars1.len() {
        let mut diagonal = row[0];
        row[0] = i;
        for j in 1..=chars2.len() {
            let cost = if chars1[i - 1] == chars2[j - 1] { 0 } else { 1 };
            let next = (row[j] + 1).min(row[j - 1] + 1).min(diagonal + cost);
            diagonal = row[j];
            row[j] = next;
        }
    }
    row[chars2.len()]
}

/// Free-text equality used for agreement checks
pub fn texts_agree(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}
