//! Human-readable rationale for a similar pair.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::categorize::keyword_pattern;
use crate::similarity::SimilarityBand;
use crate::text::normalize;

const TECHNOLOGY_TERMS: &[&str] = &[
    "python", "java", "javascript", "typescript", "react", "angular", "vue", "flutter",
    "kotlin", "swift", "django", "flask", "nodejs", "firebase", "mongodb", "mysql",
    "postgresql", "tensorflow", "pytorch", "opencv", "unity", "arduino", "raspberry pi",
    "docker", "kubernetes", "aws", "azure", "blockchain", "ethereum", "android", "ios",
];

const FEATURE_TERMS: &[&str] = &[
    "chatbot", "dashboard", "authentication", "notification", "recommendation", "tracking",
    "booking", "payment", "search", "chat", "real-time", "mobile app", "web portal",
    "reporting", "scheduling", "attendance", "inventory", "alerts", "voice",
];

const METHODOLOGY_TERMS: &[&str] = &[
    "machine learning", "deep learning", "neural network", "natural language processing",
    "computer vision", "data mining", "classification", "clustering", "regression",
    "image processing", "sentiment analysis", "reinforcement learning", "simulation",
    "optimization", "encryption", "object detection",
];

const APPLICATION_TERMS: &[&str] = &[
    "healthcare", "hospital", "education", "agriculture", "finance", "banking", "retail",
    "transport", "traffic", "tourism", "sports", "security", "e-commerce", "smart home",
    "smart city", "environment", "energy", "manufacturing", "university", "students",
];

const OBJECTIVE_TERMS: &[&str] = &[
    "automate", "automation", "detect", "detection", "predict", "prediction", "monitor",
    "monitoring", "improve", "optimize", "manage", "management", "analyze", "analysis",
    "recommend", "assist", "secure", "visualize",
];

const CONTENT_STOPLIST: &[&str] = &["that", "this", "with", "from", "they", "were", "been"];

/// Meaningful-word examples shown in the content-overlap bullet.
const CONTENT_EXAMPLES: usize = 3;

struct TermFamily {
    label: &'static str,
    terms: Vec<(&'static str, Regex)>,
}

impl TermFamily {
    fn new(label: &'static str, terms: &[&'static str]) -> Self {
        Self {
            label,
            terms: terms
                .iter()
                .filter_map(|term| keyword_pattern(term).ok().map(|pattern| (*term, pattern)))
                .collect(),
        }
    }

    fn shared(&self, text1: &str, text2: &str) -> Vec<&'static str> {
        self.terms
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text1) && pattern.is_match(text2))
            .map(|(term, _)| *term)
            .collect()
    }
}

static FAMILIES: Lazy<Vec<TermFamily>> = Lazy::new(|| {
    vec![
        TermFamily::new("Shared technologies", TECHNOLOGY_TERMS),
        TermFamily::new("Shared functional features", FEATURE_TERMS),
        TermFamily::new("Shared methodology", METHODOLOGY_TERMS),
        TermFamily::new("Shared application areas", APPLICATION_TERMS),
        TermFamily::new("Shared objectives", OBJECTIVE_TERMS),
    ]
});

fn content_words(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !CONTENT_STOPLIST.contains(word))
        .map(str::to_string)
        .collect()
}

fn interpretation(band: SimilarityBand) -> &'static str {
    match band {
        SimilarityBand::VeryHigh => {
            "These projects describe very similar objectives and methodologies. \
             Review them together for possible duplication."
        }
        SimilarityBand::High => {
            "These projects follow a similar approach with noticeable methodological \
             overlap. Their scopes should be clearly differentiated."
        }
        SimilarityBand::Medium => {
            "These projects share some conceptual ground but differ in focus or \
             implementation."
        }
        SimilarityBand::Low => "These projects are only loosely related.",
    }
}

/// Builds the explanation for one pair. Pure: identical inputs give an
/// identical string.
pub fn explain_pair(
    text1: &str,
    text2: &str,
    score: f64,
    overlapping_domains: &[String],
) -> String {
    let band = SimilarityBand::from_score(score);
    let lower1 = text1.to_lowercase();
    let lower2 = text2.to_lowercase();

    let mut reasons = Vec::new();
    if !overlapping_domains.is_empty() {
        reasons.push(format!(
            "Both projects belong to: {}",
            overlapping_domains.join(", ")
        ));
    }
    for family in FAMILIES.iter() {
        let shared = family.shared(&lower1, &lower2);
        if !shared.is_empty() {
            reasons.push(format!("{}: {}", family.label, shared.join(", ")));
        }
    }

    let common: Vec<String> = content_words(&lower1)
        .intersection(&content_words(&lower2))
        .cloned()
        .collect();
    if !common.is_empty() {
        let examples = common
            .iter()
            .take(CONTENT_EXAMPLES)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        reasons.push(format!(
            "{} meaningful shared content word{} (e.g. {examples})",
            common.len(),
            if common.len() == 1 { "" } else { "s" }
        ));
    }

    let mut explanation = format!(
        "Similarity: {:.1}% ({})",
        score * 100.0,
        band.label()
    );
    if !reasons.is_empty() {
        explanation.push_str("\n\nReasons:");
        for reason in &reasons {
            explanation.push_str("\n• ");
            explanation.push_str(reason);
        }
    }
    explanation.push_str("\n\nInterpretation: ");
    explanation.push_str(interpretation(band));
    explanation
}
