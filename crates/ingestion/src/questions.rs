//! Question extraction
//!
//! Turns the text of one page into typed question candidates. A page is
//! either an exercise section (numbered items are collected line by line) or
//! ordinary prose (questions are picked out by an ordered pattern table and
//! filtered by a precision heuristic).

use quizforge_common::db::models::QuestionType;
use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Characters of page text kept on each side of a question
pub const CONTEXT_CHARS: usize = 200;

/// Prefix length used to detect duplicate questions on a page
pub const DEDUP_PREFIX_CHARS: usize = 50;

const MIN_QUESTION_CHARS: usize = 10;

/// Exercise items opening with one of these are kept without a `?`
const DIRECTIVE_VERBS: [&str; 6] = ["explain", "describe", "discuss", "analyze", "compare", "contrast"];

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"exercises?|problems?|review\s+questions?|practice\s+problems?|homework|assignments?|study\s+questions?|discussion\s+questions?",
    )
    .unwrap()
});

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)").unwrap());

/// Scattered-question patterns in discovery order.
///
/// Patterns with a capture group yield the group, the bare-sentence pattern
/// yields the whole match.
static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?mi)\b\d+\.\s+(.+?\?)",
        r"(?mi)\b\d+\)\s+(.+?\?)",
        r"(?mi)^Q\d*[:.]?\s+(.+?\?)",
        r"(?mi)^Question\s+\d*[:.]?\s+(.+?\?)",
        r"(?mi)^\d+\.\d+\s+(.+?\?)",
        r"(?mi)^[A-Z][^.!?]*\?$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const EDUCATIONAL_KEYWORDS: [&str; 15] = [
    "chapter", "section", "exercise", "problem", "question",
    "review", "practice", "homework", "assignment", "study",
    "discuss", "explain", "describe", "analyze", "compare",
];

const QUESTION_WORDS: [&str; 14] = [
    "what", "how", "why", "when", "where", "which", "who",
    "does", "is", "are", "can", "will", "would", "should",
];

/// Type indicators in classification priority
const TYPE_RULES: [(QuestionType, &[&str]); 3] = [
    (QuestionType::MultipleChoice, &["a)", "b)", "c)", "d)", "choose", "select"]),
    (QuestionType::TrueFalse, &["true or false", "t/f", "true/false"]),
    (QuestionType::Essay, &["explain", "describe", "discuss", "analyze", "compare", "contrast"]),
];

/// A question found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionCandidate {
    pub text: String,
    pub kind: QuestionType,
    pub source_page: u32,
    pub context: String,
    pub answer: Option<String>,
}

/// Extract question candidates from one page of text
pub fn extract_questions(page_text: &str, page_number: u32) -> Vec<QuestionCandidate> {
    let texts = if is_exercise_section(page_text) {
        extract_exercise_items(page_text)
    } else {
        dedup_by_prefix(extract_scattered(page_text))
    };

    texts
        .into_iter()
        .map(|text| QuestionCandidate {
            context: context_for(&text, page_text),
            kind: classify(&text),
            source_page: page_number,
            answer: None,
            text,
        })
        .collect()
}

/// Whether the page reads like a dedicated exercise/problem section
pub fn is_exercise_section(text: &str) -> bool {
    if SECTION_HEADER.is_match(&text.to_lowercase()) {
        return true;
    }

    let question_marks = text.matches('?').count();
    let words = text.split_whitespace().count();

    question_marks >= 3 && words > 0 && (question_marks as f64 / words as f64) > 0.05
}

/// Collect numbered items; an item may continue over following lines.
/// Directive items count only on a page that asks at least one question.
fn extract_exercise_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let allow_directives = text.contains('?');

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = NUMBERED_ITEM.captures(line) {
            flush_item(&mut current, &mut items, allow_directives);
            current.push_str(&caps[2]);
        } else if !current.is_empty() {
            current.push(' ');
            current.push_str(line);
        }
    }

    flush_item(&mut current, &mut items, allow_directives);
    items
}

fn flush_item(current: &mut String, items: &mut Vec<String>, allow_directives: bool) {
    let item = std::mem::take(current);
    if item.contains('?') || (allow_directives && opens_with_directive(&item)) {
        items.push(item.trim().to_string());
    }
}

fn opens_with_directive(item: &str) -> bool {
    item.split_whitespace()
        .next()
        .map(|word| word.trim_end_matches(|c: char| !c.is_alphabetic()).to_lowercase())
        .is_some_and(|word| DIRECTIVE_VERBS.contains(&word.as_str()))
}

/// Every valid match of every question pattern, in pattern then match order
fn extract_scattered(text: &str) -> Vec<String> {
    let mut found = Vec::new();

    for pattern in QUESTION_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };

            let candidate = m.as_str().trim();
            if is_valid_question(candidate) {
                found.push(candidate.to_string());
            }
        }
    }

    found
}

/// Precision filter for scattered matches
pub fn is_valid_question(text: &str) -> bool {
    if text.chars().count() < MIN_QUESTION_CHARS || !text.ends_with('?') {
        return false;
    }

    let lower = text.to_lowercase();

    EDUCATIONAL_KEYWORDS.iter().any(|k| lower.contains(k))
        || QUESTION_WORDS.iter().any(|w| lower.starts_with(w))
}

/// Drop questions whose lower-cased 50-character prefix was already seen
pub fn dedup_by_prefix(texts: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();

    texts
        .into_iter()
        .filter(|text| {
            let key: String = text.chars().take(DEDUP_PREFIX_CHARS).collect::<String>().to_lowercase();
            seen.insert(key)
        })
        .collect()
}

/// Classify a question by fixed indicator priority
pub fn classify(text: &str) -> QuestionType {
    let lower = text.to_lowercase();

    TYPE_RULES
        .iter()
        .find(|(_, indicators)| indicators.iter().any(|i| lower.contains(i)))
        .map(|(kind, _)| *kind)
        .unwrap_or(QuestionType::ShortAnswer)
}

/// Page text around the first occurrence of `question`, empty if absent
pub fn context_for(question: &str, page_text: &str) -> String {
    let Some(start) = page_text.find(question) else {
        return String::new();
    };
    let end = start + question.len();

    let from = page_text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let to = page_text[end..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(page_text.len());

    page_text[from..to].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(candidates: &[QuestionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_exercise_page_keeps_questions_and_directives() {
        let page = "Exercises\n1. What is gravity?\n2. Explain inertia in detail.";
        let found = extract_questions(page, 12);

        assert_eq!(texts(&found), vec!["What is gravity?", "Explain inertia in detail."]);
        assert_eq!(found[0].kind, QuestionType::ShortAnswer);
        assert_eq!(found[1].kind, QuestionType::Essay);
        assert!(found.iter().all(|c| c.source_page == 12));
        assert_eq!(found[0].context, page);
    }

    #[test]
    fn test_exercise_items_without_question_or_directive_dropped() {
        let page = "Exercises\n1. Inertia keeps bodies moving.\n2. Describe: mass and weight\n3. Explanations vary.\n4. Why do bodies fall?";
        assert_eq!(
            texts(&extract_questions(page, 1)),
            vec!["Describe: mass and weight", "Why do bodies fall?"]
        );
    }

    #[test]
    fn test_directive_only_exercise_page_yields_nothing() {
        let page = "Exercises\n1. Explain inertia in detail.\n2. Describe the motion of a pendulum.";
        assert!(extract_questions(page, 1).is_empty());
    }

    #[test]
    fn test_exercise_items_span_lines() {
        let page = "Problems\n1. A ball is thrown upward.\nWhat is its max height?\n\n2) Which force acts\non the ball?\nText before any number";
        let found = extract_questions(page, 3);

        assert_eq!(
            texts(&found),
            vec![
                "A ball is thrown upward. What is its max height?",
                "Which force acts on the ball? Text before any number",
            ]
        );
        // joined items do not appear verbatim in the page
        assert!(found.iter().all(|c| c.context.is_empty()));
    }

    #[test]
    fn test_lines_before_first_number_are_ignored() {
        let page = "Homework\nWhy is this line ignored?\n3. Why does ice float?";
        assert_eq!(texts(&extract_questions(page, 1)), vec!["Why does ice float?"]);
    }

    #[test]
    fn test_page_without_question_marks() {
        assert!(extract_questions("The cat sat. Random sentence.", 1).is_empty());
        assert!(extract_questions("Exercises\n1. Inertia keeps bodies moving.\n2. Mass resists force.", 1).is_empty());
        assert!(extract_questions("", 1).is_empty());
    }

    #[test]
    fn test_exercise_detection() {
        assert!(is_exercise_section("REVIEW QUESTIONS"));
        assert!(is_exercise_section("see the Practice Problems below"));
        assert!(is_exercise_section("Why?\nHow?\nWhen?"));

        let prose = format!("{} Why? How? When?", "word ".repeat(100));
        assert!(!is_exercise_section(&prose));
        assert!(!is_exercise_section("Only two? Questions here?"));
    }

    #[test]
    fn test_bare_question_sentence() {
        let page = "Light travels fast.\nWhy is the sky blue?\nRayleigh scattering accounts for it.";
        let found = extract_questions(page, 8);

        assert_eq!(texts(&found), vec!["Why is the sky blue?"]);
        assert_eq!(found[0].kind, QuestionType::ShortAnswer);
        assert_eq!(found[0].context, page);
    }

    #[test]
    fn test_numbered_question_in_prose() {
        let page = "Consider the following.\n1. What is the unit of force?\nThe newton is defined later.";
        assert_eq!(texts(&extract_questions(page, 2)), vec!["What is the unit of force?"]);
    }

    #[test]
    fn test_dotted_sub_numbered_question() {
        let page = "Worked notes\n1.1 What is the work done by gravity?";
        assert_eq!(
            texts(&extract_questions(page, 2)),
            vec!["What is the work done by gravity?"]
        );
    }

    #[test]
    fn test_repeated_question_kept_once() {
        let page = "Why do objects fall?\nGravity pulls them.\nWhy do objects fall?";
        assert_eq!(texts(&extract_questions(page, 4)), vec!["Why do objects fall?"]);
    }

    #[test]
    fn test_prefix_dedup_first_wins() {
        let a = "What is the relationship between pressure and volume in a gas at constant temperature?";
        let b = "What is the relationship between pressure and volume in a sealed container?";
        let out = dedup_by_prefix(vec![a.to_string(), b.to_string(), "Why now?".to_string()]);
        assert_eq!(out, vec![a.to_string(), "Why now?".to_string()]);
    }

    #[test]
    fn test_dedup_is_a_fixed_point() {
        let page = "Why do objects fall?\nQ: What is a vector quantity?\nWhy do objects fall?\n2) How fast is light?";
        let once: Vec<String> = extract_questions(page, 1).into_iter().map(|c| c.text).collect();
        assert_eq!(dedup_by_prefix(once.clone()), once);
    }

    #[test]
    fn test_validation_filter() {
        assert!(is_valid_question("What is a vector?"));
        assert!(is_valid_question("Summarize the chapter in one line?"));
        assert!(!is_valid_question("Random thing here?"));
        assert!(!is_valid_question("Why this?".trim_end_matches('?')));
        assert!(!is_valid_question("Why not?"));
        assert!(extract_questions("Random thing here?", 1).is_empty());
    }

    #[test]
    fn test_validated_candidates_end_with_question_mark() {
        let page = "Q1: What is energy?\nQuestion 2: How is energy conserved in collisions?\nNot a question.";
        let found = extract_questions(page, 9);
        assert_eq!(
            texts(&found),
            vec![
                "What is energy?",
                "How is energy conserved in collisions?",
                "Question 2: How is energy conserved in collisions?",
            ]
        );
        for candidate in &found {
            assert!(candidate.text.ends_with('?'));
            assert!(candidate.text.chars().count() >= 10);
        }
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(classify("Pick one: a) yes b) no c) maybe"), QuestionType::MultipleChoice);
        assert_eq!(classify("Select the true or false statement?"), QuestionType::MultipleChoice);
        assert_eq!(classify("True or false: heat rises?"), QuestionType::TrueFalse);
        assert_eq!(classify("T/F: sound travels in vacuum?"), QuestionType::TrueFalse);
        assert_eq!(classify("Compare and contrast mitosis and meiosis?"), QuestionType::Essay);
        assert_eq!(classify("What is 2 + 2?"), QuestionType::ShortAnswer);
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let page = format!("{}\nWhy is the sky so very blue?\n{}", "é".repeat(300), "ü".repeat(300));
        let found = extract_questions(&page, 5);
        assert_eq!(found.len(), 1);

        let context = &found[0].context;
        assert_eq!(context.chars().filter(|c| *c == 'é').count(), 199);
        assert_eq!(context.chars().filter(|c| *c == 'ü').count(), 199);
        assert!(context.contains("Why is the sky so very blue?"));
    }

    #[test]
    fn test_context_missing_text() {
        assert_eq!(context_for("not here?", "some page"), "");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let page = "Chapter review\n1. What is mass?\n2. How is weight measured?\nWhy? Because.";
        assert_eq!(extract_questions(page, 1), extract_questions(page, 1));

        let prose = "Is energy conserved?\nWhat happens to friction heat?\nQ: Does mass change?";
        assert_eq!(extract_questions(prose, 2), extract_questions(prose, 2));
    }
}
