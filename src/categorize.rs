//! Domain categorization.
//!
//! The keyword table is always available. An external categorizer can be
//! plugged in through [`DomainCategorizer`]; any per-record failure falls back
//! to the keyword path for that record only.

use std::time::Duration;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::{CategorizerError, Result};
use crate::model::Project;

pub const OTHER_DOMAIN: &str = "Other";

/// Minimum confidence an externally reported domain needs to be kept.
pub const EXTERNAL_MIN_CONFIDENCE: i64 = 6;
/// Score given to an external primary domain missing from its own list.
pub const EXTERNAL_PRIMARY_SCORE: i64 = 8;

pub const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Artificial Intelligence & Machine Learning",
        &[
            "ai", "artificial intelligence", "machine learning", "ml", "deep learning",
            "neural network", "nlp", "natural language processing", "computer vision",
            "recommendation system", "classification", "prediction", "clustering",
            "generative ai", "llm", "large language model",
        ],
    ),
    (
        "Web Development",
        &[
            "web", "website", "web application", "frontend", "backend", "html", "css",
            "javascript", "react", "angular", "vue", "nodejs", "django", "flask", "api", "rest",
            "graphql", "responsive",
        ],
    ),
    (
        "Mobile Development",
        &[
            "mobile", "android", "ios", "flutter", "react native", "kotlin", "swift",
            "mobile app", "smartphone", "tablet", "cross-platform",
        ],
    ),
    (
        "Cybersecurity",
        &[
            "security", "cybersecurity", "encryption", "authentication", "penetration testing",
            "vulnerability", "firewall", "intrusion detection", "malware", "forensics",
            "risk assessment", "compliance", "iso 27001", "gdpr",
        ],
    ),
    (
        "Data Science & Analytics",
        &[
            "data science", "analytics", "big data", "data mining", "statistics",
            "visualization", "dashboard", "business intelligence", "etl", "data warehouse",
            "pandas", "numpy", "matplotlib", "tableau", "power bi",
        ],
    ),
    (
        "Internet of Things (IoT)",
        &[
            "iot", "internet of things", "sensor", "embedded", "arduino", "raspberry pi",
            "microcontroller", "smart home", "automation", "monitoring", "rfid", "bluetooth",
        ],
    ),
    (
        "Blockchain & Cryptocurrency",
        &[
            "blockchain", "cryptocurrency", "bitcoin", "ethereum", "smart contract",
            "decentralized", "crypto", "nft", "defi", "web3",
        ],
    ),
    (
        "Game Development",
        &[
            "game", "gaming", "unity", "unreal", "game development", "vr", "ar",
            "virtual reality", "augmented reality", "3d", "simulation",
        ],
    ),
    (
        "Healthcare & Medical",
        &[
            "health", "healthcare", "medical", "patient", "diagnosis", "telemedicine",
            "electronic health record", "ehr", "medical imaging", "drug", "pharmacy",
        ],
    ),
    (
        "E-commerce & Business",
        &[
            "ecommerce", "e-commerce", "online shop", "marketplace", "inventory",
            "supply chain", "crm", "erp", "business process", "payment",
        ],
    ),
    (
        "Education & E-learning",
        &[
            "education", "learning", "e-learning", "lms", "student", "teacher", "course",
            "quiz", "examination", "classroom", "school", "university",
        ],
    ),
    (
        "Social Media & Communication",
        &[
            "social media", "chat", "messaging", "communication", "social network", "forum",
            "blog", "community", "collaboration",
        ],
    ),
    (
        "Cloud Computing",
        &[
            "cloud", "aws", "azure", "google cloud", "docker", "kubernetes", "microservices",
            "serverless", "saas", "paas", "iaas",
        ],
    ),
    (
        "Computer Vision",
        &[
            "computer vision", "image processing", "object detection", "face recognition",
            "ocr", "image classification", "video analysis", "opencv",
        ],
    ),
    (
        "Sports & Fitness",
        &[
            "sports", "fitness", "exercise", "training", "coaching", "athlete", "performance",
            "cricket", "football", "basketball", "workout",
        ],
    ),
];

/// Whole-word, case-insensitive matcher for a keyword phrase.
pub fn keyword_pattern(keyword: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
}

struct CompiledDomain {
    name: &'static str,
    keywords: Vec<(&'static str, Regex)>,
}

static COMPILED_DOMAINS: Lazy<Vec<CompiledDomain>> = Lazy::new(|| {
    DOMAIN_KEYWORDS
        .iter()
        .map(|(name, keywords)| CompiledDomain {
            name,
            keywords: keywords
                .iter()
                .filter_map(|keyword| match keyword_pattern(keyword) {
                    Ok(pattern) => Some((*keyword, pattern)),
                    Err(err) => {
                        warn!(%keyword, "skipping keyword that does not compile: {err}");
                        None
                    }
                })
                .collect(),
        })
        .collect()
});

pub fn domain_names() -> Vec<&'static str> {
    DOMAIN_KEYWORDS.iter().map(|(name, _)| *name).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorizationMethod {
    Keyword,
    External,
    Default,
}

impl CategorizationMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::External => "external",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfidence {
    pub score: i64,
    pub matched_terms: Vec<String>,
    pub method: CategorizationMethod,
}

/// Domain label record for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainLabels {
    pub project_id: String,
    pub domains: Vec<String>,
    pub primary_domain: String,
    pub confidence_scores: IndexMap<String, DomainConfidence>,
}

impl DomainLabels {
    fn other(project_id: &str) -> Self {
        let mut confidence_scores = IndexMap::new();
        confidence_scores.insert(
            OTHER_DOMAIN.to_string(),
            DomainConfidence {
                score: 1,
                matched_terms: Vec::new(),
                method: CategorizationMethod::Default,
            },
        );
        Self {
            project_id: project_id.to_string(),
            domains: vec![OTHER_DOMAIN.to_string()],
            primary_domain: OTHER_DOMAIN.to_string(),
            confidence_scores,
        }
    }

    /// Method of the primary domain's record.
    pub fn method(&self) -> CategorizationMethod {
        self.confidence_scores
            .get(&self.primary_domain)
            .map_or(CategorizationMethod::Default, |confidence| confidence.method)
    }

    pub fn max_confidence(&self) -> i64 {
        self.confidence_scores
            .values()
            .map(|confidence| confidence.score)
            .max()
            .unwrap_or(0)
    }
}

/// Keyword categorization of a single project.
///
/// `primary_domain` is the first matched domain in table order, not the
/// highest-scoring one.
pub fn categorize_by_keywords(project: &Project) -> DomainLabels {
    let text = project.combined_text().to_lowercase();
    let mut domains = Vec::new();
    let mut confidence_scores = IndexMap::new();

    for domain in COMPILED_DOMAINS.iter() {
        let mut score = 0i64;
        let mut matched_terms = Vec::new();
        for (keyword, pattern) in &domain.keywords {
            let count = pattern.find_iter(&text).count() as i64;
            if count > 0 {
                score += count;
                matched_terms.push((*keyword).to_string());
            }
        }
        if score > 0 {
            domains.push(domain.name.to_string());
            confidence_scores.insert(
                domain.name.to_string(),
                DomainConfidence {
                    score,
                    matched_terms,
                    method: CategorizationMethod::Keyword,
                },
            );
        }
    }

    if domains.is_empty() {
        return DomainLabels::other(&project.project_id);
    }

    DomainLabels {
        project_id: project.project_id.clone(),
        primary_domain: domains[0].clone(),
        domains,
        confidence_scores,
    }
}

/// One domain as reported by an external categorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDomain {
    pub name: String,
    pub confidence: i64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLabels {
    #[serde(default)]
    pub domains: Vec<ExternalDomain>,
    #[serde(default)]
    pub primary_domain: Option<String>,
}

/// Pluggable categorization capability (e.g. a language-model service).
pub trait DomainCategorizer {
    fn categorize(&mut self, project: &Project) -> Result<ExternalLabels, CategorizerError>;
}

/// Applies the acceptance rules to an external result. `None` means the
/// result contributed nothing and the keyword path should be used.
pub fn accept_external(project_id: &str, labels: ExternalLabels) -> Option<DomainLabels> {
    let mut domains = Vec::new();
    let mut confidence_scores = IndexMap::new();

    for domain in labels.domains {
        let name = domain.name.trim().to_string();
        if name.is_empty() || domain.confidence < EXTERNAL_MIN_CONFIDENCE {
            continue;
        }
        if confidence_scores.contains_key(&name) {
            continue;
        }
        domains.push(name.clone());
        confidence_scores.insert(
            name,
            DomainConfidence {
                score: domain.confidence,
                matched_terms: if domain.reasoning.is_empty() {
                    Vec::new()
                } else {
                    vec![domain.reasoning]
                },
                method: CategorizationMethod::External,
            },
        );
    }

    if let Some(primary) = labels.primary_domain.map(|name| name.trim().to_string()) {
        if !primary.is_empty() && !confidence_scores.contains_key(&primary) {
            domains.insert(0, primary.clone());
            confidence_scores.insert(
                primary,
                DomainConfidence {
                    score: EXTERNAL_PRIMARY_SCORE,
                    matched_terms: Vec::new(),
                    method: CategorizationMethod::External,
                },
            );
        }
    }

    if domains.is_empty() {
        return None;
    }

    Some(DomainLabels {
        project_id: project_id.to_string(),
        primary_domain: domains[0].clone(),
        domains,
        confidence_scores,
    })
}

/// Spaces external requests: the delay follows each request actually sent.
#[derive(Debug)]
struct RequestPacer {
    delay: Duration,
    sent: bool,
}

impl RequestPacer {
    fn new(delay: Duration) -> Self {
        Self { delay, sent: false }
    }

    /// Wait owed before the next request.
    fn pending(&self) -> Option<Duration> {
        (self.sent && !self.delay.is_zero()).then_some(self.delay)
    }

    fn before_request(&mut self) {
        if let Some(delay) = self.pending() {
            std::thread::sleep(delay);
        }
        self.sent = true;
    }
}

/// Categorizes every project in input order.
///
/// External requests are dispatched one at a time with `request_delay`
/// between them. Projects with an empty title or scope are not sent and
/// do not incur the delay.
pub fn categorize_projects(
    projects: &[Project],
    mut external: Option<&mut dyn DomainCategorizer>,
    request_delay: Duration,
    cancel: &CancelToken,
) -> Result<Vec<DomainLabels>> {
    let mut results = Vec::with_capacity(projects.len());
    let mut fallbacks = 0usize;
    let mut pacer = RequestPacer::new(request_delay);

    for project in projects {
        cancel.check()?;

        let mut labels = None;
        if let Some(categorizer) = external.as_deref_mut() {
            if !project.title.trim().is_empty() && !project.scope.trim().is_empty() {
                pacer.before_request();
                match categorizer.categorize(project) {
                    Ok(result) => labels = accept_external(&project.project_id, result),
                    Err(err) => {
                        fallbacks += 1;
                        warn!(
                            project = %project.project_id,
                            "external categorizer failed, using keywords: {err}"
                        );
                    }
                }
            }
        }

        results.push(labels.unwrap_or_else(|| categorize_by_keywords(project)));
    }

    info!(
        projects = results.len(),
        external_fallbacks = fallbacks,
        "categorized projects by domain"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Scripted {
        responses: Vec<Result<ExternalLabels, CategorizerError>>,
    }

    impl DomainCategorizer for Scripted {
        fn categorize(&mut self, _: &Project) -> Result<ExternalLabels, CategorizerError> {
            self.responses.remove(0)
        }
    }

    #[test]
    fn default_is_other() {
        let labels = categorize_by_keywords(&Project::new("P1", "xyz"));
        assert_eq!(labels.domains, vec!["Other"]);
        assert_eq!(labels.primary_domain, "Other");
        assert_eq!(labels.method(), CategorizationMethod::Default);
        assert_eq!(labels.max_confidence(), 1);
    }

    #[test]
    fn whole_word_matches_only() {
        // "ai" must not match inside "maintain", "ar" not inside "smart".
        let labels = categorize_by_keywords(&Project::new("P1", "maintain smart records"));
        assert_eq!(labels.primary_domain, "Other");
    }

    #[test]
    fn primary_is_first_in_table_order_not_highest_score() {
        let project = Project::new("P1", "Mobile app")
            .with_scope("Android mobile game with a mobile leaderboard driven by a neural network");
        let labels = categorize_by_keywords(&project);
        assert_eq!(
            labels.domains,
            vec![
                "Artificial Intelligence & Machine Learning",
                "Mobile Development",
                "Game Development"
            ]
        );
        assert_eq!(labels.primary_domain, "Artificial Intelligence & Machine Learning");
        let mobile = &labels.confidence_scores["Mobile Development"];
        assert!(mobile.score > labels.confidence_scores[&labels.primary_domain].score);
        assert_eq!(mobile.matched_terms, vec!["mobile", "android", "mobile app"]);
    }

    #[test]
    fn external_low_confidence_dropped_and_primary_inserted() {
        let labels = accept_external(
            "P1",
            ExternalLabels {
                domains: vec![
                    ExternalDomain {
                        name: "Cloud Computing".into(),
                        confidence: 7,
                        reasoning: "uses kubernetes".into(),
                    },
                    ExternalDomain {
                        name: "Web Development".into(),
                        confidence: 5,
                        reasoning: String::new(),
                    },
                ],
                primary_domain: Some("Cybersecurity".into()),
            },
        )
        .unwrap();
        assert_eq!(labels.domains, vec!["Cybersecurity", "Cloud Computing"]);
        assert_eq!(labels.confidence_scores["Cybersecurity"].score, 8);
        assert_eq!(labels.method(), CategorizationMethod::External);
    }

    #[test]
    fn failures_fall_back_per_record() {
        let projects = vec![
            Project::new("P1", "Chat app").with_scope("messaging platform"),
            Project::new("P2", "Shop").with_scope("online shop with payment"),
        ];
        let mut scripted = Scripted {
            responses: vec![
                Err(CategorizerError::Remote("rate limited".into())),
                Ok(ExternalLabels {
                    domains: vec![ExternalDomain {
                        name: "E-commerce & Business".into(),
                        confidence: 9,
                        reasoning: String::new(),
                    }],
                    primary_domain: None,
                }),
            ],
        };
        let results = categorize_projects(
            &projects,
            Some(&mut scripted),
            Duration::ZERO,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(results[0], categorize_by_keywords(&projects[0]));
        assert_eq!(results[1].method(), CategorizationMethod::External);
    }

    #[test]
    fn empty_scope_is_not_sent_externally() {
        let projects = vec![Project::new("P1", "Chat app")];
        let mut scripted = Scripted { responses: Vec::new() };
        let results = categorize_projects(
            &projects,
            Some(&mut scripted),
            Duration::ZERO,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(results[0].method(), CategorizationMethod::Keyword);
    }

    #[test]
    fn every_table_keyword_compiles() {
        let compiled: usize = COMPILED_DOMAINS.iter().map(|d| d.keywords.len()).sum();
        let listed: usize = DOMAIN_KEYWORDS.iter().map(|(_, keywords)| keywords.len()).sum();
        assert_eq!(compiled, listed);
        let pattern = keyword_pattern("machine learning").unwrap();
        assert!(pattern.is_match("Applied Machine Learning models"));
        assert!(!pattern.is_match("machine learnings"));
    }

    #[test]
    fn pacer_waits_only_after_a_request_was_sent() {
        let mut pacer = RequestPacer::new(Duration::from_secs(5));
        assert_eq!(pacer.pending(), None);
        pacer.before_request();
        assert_eq!(pacer.pending(), Some(Duration::from_secs(5)));

        let idle = RequestPacer::new(Duration::ZERO);
        assert_eq!(idle.pending(), None);
    }

    #[test]
    fn unsent_project_does_not_delay_the_first_request() {
        let projects = vec![
            Project::new("P1", "Chat app"),
            Project::new("P2", "Shop").with_scope("online shop with payment"),
        ];
        categorize_by_keywords(&projects[0]);
        let mut scripted = Scripted {
            responses: vec![Err(CategorizerError::Remote("offline".into()))],
        };
        let started = std::time::Instant::now();
        categorize_projects(
            &projects,
            Some(&mut scripted),
            Duration::from_secs(5),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(scripted.responses.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
