//! Query complexity classification.
//!
//! A purely syntactic heuristic: word count, question/conjunction markers and
//! comparison vocabulary. The thresholds are fixed so the same query always
//! lands in the same class.

use rag_core::ComplexityClass;

/// Queries with at most this many words may be simple.
pub const SIMPLE_MAX_WORDS: usize = 5;

/// Queries with more than this many words are complex.
pub const COMPLEX_MIN_WORDS: usize = 15;

/// Words that signal a comparison between several subjects.
pub const COMPARISON_TERMS: &[&str] = &[
    "compare",
    "comparison",
    "difference",
    "differences",
    "versus",
    "vs",
    "best",
];

/// Conjunctions that join several questions into one.
const CONJUNCTIONS: &[&str] = &[" and ", " or "];

/// Classify a query by syntactic complexity.
pub fn classify(query: &str) -> ComplexityClass {
    let word_count = query.split_whitespace().count();
    let multi_question = has_multiple_questions(query);

    if word_count <= SIMPLE_MAX_WORDS && !multi_question {
        ComplexityClass::Simple
    } else if word_count > COMPLEX_MIN_WORDS || multi_question || has_comparison(query) {
        ComplexityClass::Complex
    } else {
        ComplexityClass::Medium
    }
}

/// More than one question mark, or an "and"/"or" between two words.
fn has_multiple_questions(query: &str) -> bool {
    if query.matches('?').count() > 1 {
        return true;
    }
    let lowered = query.to_lowercase();
    CONJUNCTIONS.iter().any(|c| lowered.contains(c))
}

/// Comparison terms anywhere in the query, including inside longer words.
fn has_comparison(query: &str) -> bool {
    let lowered = query.to_lowercase();
    COMPARISON_TERMS.iter().any(|term| lowered.contains(term))
}

/// Variant budget for a query of the given class.
///
/// Simple queries need fewer variations; complex ones benefit from more.
pub fn adaptive_budget(class: ComplexityClass, requested: usize) -> usize {
    match class {
        ComplexityClass::Simple => requested.min(2),
        ComplexityClass::Medium => requested,
        ComplexityClass::Complex => requested.max(3).min(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_query_is_simple() {
        assert_eq!(classify("What is AI?"), ComplexityClass::Simple);
        assert_eq!(classify("rust borrow checker"), ComplexityClass::Simple);
        assert_eq!(classify("one two three four five"), ComplexityClass::Simple);
    }

    #[test]
    fn test_short_query_with_conjunction_is_complex() {
        assert_eq!(classify("cats and dogs"), ComplexityClass::Complex);
        assert_eq!(classify("tea or coffee"), ComplexityClass::Complex);
        assert_eq!(classify("why? how?"), ComplexityClass::Complex);
    }

    #[test]
    fn test_long_query_is_complex() {
        let query = "how do I configure the connection pool size for the postgres driver when running many small services";
        assert!(query.split_whitespace().count() > COMPLEX_MIN_WORDS);
        assert_eq!(classify(query), ComplexityClass::Complex);
    }

    #[test]
    fn test_comparison_vocabulary_is_complex() {
        assert_eq!(
            classify("which database is best for time series"),
            ComplexityClass::Complex
        );
        assert_eq!(
            classify("tokio vs async-std for network services"),
            ComplexityClass::Complex
        );
    }

    #[test]
    fn test_comparison_terms_match_inside_words() {
        assert_eq!(
            classify("which bestseller novels about sailing ships"),
            ComplexityClass::Complex
        );
        assert_eq!(
            classify("why did the king bestow canvas gifts"),
            ComplexityClass::Complex
        );
    }

    #[test]
    fn test_leading_or_trailing_conjunction_ignored() {
        assert_eq!(classify("and then what?"), ComplexityClass::Simple);
        assert_eq!(classify("salt and"), ComplexityClass::Simple);
        assert_eq!(classify("or else"), ComplexityClass::Simple);
    }

    #[test]
    fn test_medium_query() {
        assert_eq!(
            classify("how does the garbage collector handle cycles"),
            ComplexityClass::Medium
        );
    }

    #[test]
    fn test_conjunction_needs_word_boundaries() {
        // "android" contains "and" but is not a conjunction
        assert_eq!(classify("android sandbox"), ComplexityClass::Simple);
    }

    #[test]
    fn test_twenty_word_comparison_scenario() {
        let query = "please compare postgres versus mysql for a write heavy workload \
                     with many concurrent writers and strict durability needs overall today";
        assert_eq!(query.split_whitespace().count(), 20);
        assert_eq!(classify(query), ComplexityClass::Complex);
    }

    #[test]
    fn test_adaptive_budget() {
        assert_eq!(adaptive_budget(ComplexityClass::Simple, 3), 2);
        assert_eq!(adaptive_budget(ComplexityClass::Simple, 1), 1);
        assert_eq!(adaptive_budget(ComplexityClass::Medium, 3), 3);
        assert_eq!(adaptive_budget(ComplexityClass::Complex, 1), 3);
        assert_eq!(adaptive_budget(ComplexityClass::Complex, 4), 4);
        assert_eq!(adaptive_budget(ComplexityClass::Complex, 9), 5);
    }
}
