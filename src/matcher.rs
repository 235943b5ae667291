//! Fuzzy Matcher
//!
//! Decides whether a query matches a stored search string under an edit
//! distance budget. Pure functions, no state.
//!
//! Distance is classic Levenshtein over Unicode scalar values: single
//! character insertions, deletions and substitutions each cost one.

/// Whether `query` matches `candidate`.
///
/// - `fuzziness == 0`: exact equality (after case folding if `ignore_case`)
/// - `fuzziness > 0`: edit distance `<= fuzziness`
pub fn matches(query: &str, candidate: &str, fuzziness: u32, ignore_case: bool) -> bool {
    Matcher::new(query, fuzziness, ignore_case).is_match(candidate)
}

/// Levenshtein distance between `a` and `b`
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance_within(&a, &b, usize::MAX).unwrap_or(usize::MAX)
}

/// A query prepared once and tested against many candidates
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Query as given, or lowercased when ignoring case
    query: String,
    /// Same, split into characters for the distance computation
    chars: Vec<char>,
    fuzziness: usize,
    ignore_case: bool,
}

impl Matcher {
    pub fn new(query: &str, fuzziness: u32, ignore_case: bool) -> Self {
        let query = fold(query, ignore_case);
        let chars = query.chars().collect();
        Self {
            query,
            chars,
            fuzziness: fuzziness as usize,
            ignore_case,
        }
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        if self.fuzziness == 0 {
            return if self.ignore_case {
                fold(candidate, true) == self.query
            } else {
                candidate == self.query
            };
        }

        let candidate: Vec<char> = fold(candidate, self.ignore_case).chars().collect();
        distance_within(&self.chars, &candidate, self.fuzziness).is_some()
    }

    pub fn fuzziness(&self) -> u32 {
        self.fuzziness as u32
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

fn fold(s: &str, ignore_case: bool) -> String {
    if ignore_case {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

/// Edit distance if it is at most `bound`, `None` otherwise.
///
/// Two-row dynamic programming; bails out as soon as every cell of a row
/// exceeds the bound, since row minima never decrease.
fn distance_within(a: &[char], b: &[char], bound: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > bound {
        return None;
    }

    // Keep the inner loop over the shorter string
    let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };

    if b.is_empty() {
        return Some(a.len());
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let cell = substitution.min(deletion).min(insertion);
            curr[j + 1] = cell;
            row_min = row_min.min(cell);
        }

        if row_min > bound {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    (distance <= bound).then_some(distance)
}
