//! Reference resolution for follow-up questions.
//!
//! Rewrites pronouns and implicit references in a question using the
//! narrative of the previous turn's answer — never the trace. The resolver
//! is best-effort and never fails: when no pattern matches, the question
//! passes through verbatim. Rules run in a fixed order; the implicit-context
//! rule only fires when no pronoun rule rewrote anything.

use std::sync::LazyLock;

use regex::Regex;

use crate::store::Turn;

/// Questions at or under this many words count as "short" for the
/// implicit-context rule.
const SHORT_QUESTION_WORDS: usize = 4;

static COLLECTIVE_PRONOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(they|them|their|theirs)\b").unwrap());

static OBJECT_PRONOUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bit\b").unwrap());

static DEMONSTRATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(this one|that one|this|that)\b").unwrap());

/// `the Sales department` / `Sales department` in a narrative.
static DEPARTMENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:the )?([A-Za-z][A-Za-z&/ -]*?) department\b").unwrap());

static GENUS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgenus ([A-Za-z]+)\b").unwrap());

static SAMPLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsample ([A-Za-z0-9_-]+)\b").unwrap());

static PERIOD_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(cambrian|ordovician|silurian|devonian|carboniferous|permian|triassic|jurassic|cretaceous|paleogene|neogene|quaternary)\b",
    )
    .unwrap()
});

static INTERROGATIVES: &[&str] = &["what", "which", "who", "when", "where", "how"];

/// Does the raw question carry any reference the resolver knows about?
/// The planner's contextual tier keys off this.
pub fn has_reference(question: &str) -> bool {
    COLLECTIVE_PRONOUN.is_match(question)
        || OBJECT_PRONOUN.is_match(question)
        || DEMONSTRATIVE.is_match(question)
        || is_implicit(question)
}

fn is_implicit(question: &str) -> bool {
    let words: Vec<&str> = question.split_whitespace().collect();
    if words.is_empty() || words.len() > SHORT_QUESTION_WORDS {
        return false;
    }
    let norm = |w: &str| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    let starts = INTERROGATIVES.contains(&norm(words[0]).as_str());
    let contains = words.iter().any(|w| INTERROGATIVES.contains(&norm(w).as_str()));
    starts || contains
}

/// Resolve `question` against prior turns. Returns the question unchanged
/// when there is no history.
pub fn resolve(question: &str, turns: &[Turn]) -> String {
    let Some(last) = turns.last() else {
        return question.to_string();
    };
    let narrative = &last.narrative;
    let prev_question = &last.question;

    let mut resolved = question.to_string();

    // (a) collective pronoun → department token from the last narrative, or
    // the fixed superlative phrase.
    if COLLECTIVE_PRONOUN.is_match(&resolved) {
        if let Some(dept) = department_phrase(narrative) {
            resolved = COLLECTIVE_PRONOUN.replace(&resolved, dept.as_str()).into_owned();
        }
    }

    // (b) generic object pronoun → first entity shape found in the narrative,
    // in priority order: genus, sample, period, fossil.
    if OBJECT_PRONOUN.is_match(&resolved) {
        if let Some(entity) = entity_phrase(narrative) {
            resolved = OBJECT_PRONOUN.replace(&resolved, entity.as_str()).into_owned();
        }
    }

    // (c) demonstrative → topic of the previous *question*.
    if DEMONSTRATIVE.is_match(&resolved) {
        let prev = prev_question.to_lowercase();
        let topic = if prev.contains("department") {
            Some("the department")
        } else if prev.contains("sample") {
            Some("the sample")
        } else if prev.contains("fossil") || prev.contains("genus") || prev.contains("genera") {
            Some("the fossil")
        } else {
            None
        };
        if let Some(topic) = topic {
            resolved = DEMONSTRATIVE.replace(&resolved, topic).into_owned();
        }
    }

    // (d) implicit short question with no explicit pronoun rewritten above →
    // prefix the entity the last narrative was about.
    if resolved == question && is_implicit(question) {
        if let Some(entity) = department_phrase(narrative).or_else(|| entity_phrase(narrative)) {
            resolved = format!("For {entity}, {question}");
        }
    }

    resolved
}

/// Department-like phrase from a narrative: a captured `X department`
/// token, else the fixed phrase when the narrative talks about the
/// highest-average department.
fn department_phrase(narrative: &str) -> Option<String> {
    if let Some(caps) = DEPARTMENT_TOKEN.captures(narrative) {
        return Some(format!("the {} department", &caps[1]));
    }
    if narrative.to_lowercase().contains("highest average") {
        return Some("the department with the highest average".to_string());
    }
    None
}

/// First domain entity mentioned in a narrative, in priority order.
fn entity_phrase(narrative: &str) -> Option<String> {
    if let Some(caps) = GENUS_TOKEN.captures(narrative) {
        return Some(format!("the genus {}", &caps[1]));
    }
    if let Some(caps) = SAMPLE_TOKEN.captures(narrative) {
        return Some(format!("sample {}", &caps[1]));
    }
    if let Some(caps) = PERIOD_TOKEN.captures(narrative) {
        return Some(format!("the {} period", &caps[1]));
    }
    if narrative.to_lowercase().contains("fossil") {
        return Some("the fossil".to_string());
    }
    None
}
