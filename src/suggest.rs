// ==============================================================================
// String Similarity Utilities
// ==============================================================================
//
// Edit-distance helpers behind the linker's "did you mean?" suggestions for
// unresolvable type names. Candidates are the registered fully-qualified
// names; a written name is compared against both the full name and its simple
// (post-dot) part so that `Circl` still suggests `squareup.curves.Circle`.

/// Compute the Levenshtein edit distance between two strings.
///
/// Uses the standard dynamic programming algorithm with a two-row buffer.
/// This is sufficient for identifiers and type names, which are short.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Identifiers are ASCII, so the distance is computed over bytes.
    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row = vec![0; b_len + 1];

    for (i, ca) in a.bytes().enumerate() {
        curr_row[0] = i + 1;
        for (j, cb) in b.bytes().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j] + cost) // substitution
                .min(prev_row[j + 1] + 1) // deletion
                .min(curr_row[j] + 1); // insertion
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }
    prev_row[b_len]
}

/// Maximum edit distance for a suggestion to be considered "close enough."
///
/// For short names (length <= 4), we require distance <= 1 to avoid noisy
/// suggestions. For longer names, we allow distance <= 2.
pub(crate) fn max_edit_distance(name_len: usize) -> usize {
    if name_len <= 4 { 1 } else { 2 }
}

/// Pick the registered name closest to `written`, if any is close enough.
///
/// A candidate's distance is the smaller of the distance to its full name and
/// the distance to its simple name; ties keep the earliest candidate, which
/// is registration order for the symbol table.
pub(crate) fn closest<'a>(
    written: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    let threshold = max_edit_distance(written.len());
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let simple = candidate.rsplit('.').next().unwrap_or(candidate);
        let distance = levenshtein(written, candidate).min(levenshtein(written, simple));
        if distance > threshold {
            continue;
        }
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Levenshtein edit distance
    // =========================================================================

    #[test]
    fn identical_strings() {
        assert_eq!(levenshtein("message", "message"), 0);
        assert_eq!(levenshtein("string", "string"), 0);
    }

    #[test]
    fn empty_strings() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "xyz"), 3);
    }

    #[test]
    fn single_substitution() {
        assert_eq!(levenshtein("Circle", "Circla"), 1);
    }

    #[test]
    fn single_insertion() {
        assert_eq!(levenshtein("Circl", "Circle"), 1);
        assert_eq!(levenshtein("Trianglee", "Triangle"), 1);
    }

    #[test]
    fn single_deletion() {
        assert_eq!(levenshtein("Rectangle", "Rectangl"), 1);
        assert_eq!(levenshtein("Polygn", "Polygon"), 1);
    }

    #[test]
    fn transposition_counts_as_two_edits() {
        // Swapping adjacent characters requires a deletion + insertion.
        assert_eq!(levenshtein("Cricle", "Circle"), 2);
    }

    #[test]
    fn case_difference() {
        assert_eq!(levenshtein("circle", "Circle"), 1);
    }

    // =========================================================================
    // max_edit_distance threshold
    // =========================================================================

    #[test]
    fn short_names_allow_distance_one() {
        assert_eq!(max_edit_distance(1), 1);
        assert_eq!(max_edit_distance(3), 1);
        assert_eq!(max_edit_distance(4), 1);
    }

    #[test]
    fn longer_names_allow_distance_two() {
        assert_eq!(max_edit_distance(5), 2);
        assert_eq!(max_edit_distance(10), 2);
    }

    // =========================================================================
    // closest-candidate selection
    // =========================================================================

    #[test]
    fn suggests_by_simple_name() {
        let candidates = ["squareup.curves.Circle", "squareup.curves.Oval"];
        assert_eq!(
            closest("Circl", candidates),
            Some("squareup.curves.Circle")
        );
    }

    #[test]
    fn suggests_by_full_name() {
        let candidates = ["squareup.curves.Circle"];
        assert_eq!(
            closest("squareup.curves.Circl", candidates),
            Some("squareup.curves.Circle")
        );
    }

    #[test]
    fn distant_names_are_not_suggested() {
        let candidates = ["squareup.curves.Circle"];
        assert_eq!(closest("Hexagon", candidates), None);
    }

    #[test]
    fn closest_candidate_wins() {
        let candidates = ["squareup.Ovall", "squareup.Oval"];
        assert_eq!(closest("Oval", candidates), Some("squareup.Oval"));
    }

    #[test]
    fn ties_keep_registration_order() {
        let candidates = ["squareup.Ovel", "squareup.Ovil"];
        assert_eq!(closest("Oval", candidates), Some("squareup.Ovel"));
    }
}
