//! Projects, instructors and supervision groups.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub const GROUP_PREFIX: &str = "GROUP_";
pub const INDIVIDUAL_PREFIX: &str = "INDIVIDUAL_";

const HONORIFICS: &[&str] = &["dr", "prof", "mr", "ms", "mrs"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub title: String,
    pub scope: String,
    pub supervisor: Option<String>,
    pub co_supervisor: Option<String>,
}

impl Project {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            scope: String::new(),
            supervisor: None,
            co_supervisor: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_supervisor(mut self, supervisor: impl Into<String>) -> Self {
        self.supervisor = Some(supervisor.into());
        self
    }

    pub fn with_co_supervisor(mut self, co_supervisor: impl Into<String>) -> Self {
        self.co_supervisor = Some(co_supervisor.into());
        self
    }

    /// Title and scope joined, the text both the vectorizer and the
    /// categorizers look at.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title.trim(), self.scope.trim())
    }

    pub fn supervisor_key(&self) -> Option<String> {
        self.supervisor.as_deref().and_then(non_empty_key)
    }

    /// Supervisor then co-supervisor keys, without duplicates.
    pub fn supervision_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for name in [self.supervisor.as_deref(), self.co_supervisor.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(key) = non_empty_key(name) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

fn non_empty_key(name: &str) -> Option<String> {
    let key = normalized_key(name);
    (!key.is_empty()).then_some(key)
}

pub fn is_honorific(token: &str) -> bool {
    let bare = token.trim_end_matches('.').to_lowercase();
    HONORIFICS.contains(&bare.as_str())
}

/// Splits a title glued to the name (`Dr.Ali`) into `(Some("Dr"), "Ali")`.
pub fn split_glued_honorific(token: &str) -> (Option<&str>, &str) {
    match token.split_once('.') {
        Some((title, rest)) if !rest.is_empty() && is_honorific(title) => (Some(title), rest),
        _ => (None, token),
    }
}

/// Whitespace-separated name tokens, with glued titles split into their own token.
pub fn name_tokens(name: &str) -> impl Iterator<Item = &str> + '_ {
    name.split_whitespace().flat_map(|token| {
        let (title, rest) = split_glued_honorific(token);
        title.into_iter().chain(std::iter::once(rest))
    })
}

/// Lowercased name with honorifics, whitespace and punctuation removed.
pub fn normalized_key(name: &str) -> String {
    name_tokens(name)
        .filter(|token| !is_honorific(token))
        .flat_map(str::chars)
        .filter(|ch| ch.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// `Title. First Last` form: title-cased words, honorifics with a trailing dot.
pub fn canonical_name(raw: &str) -> String {
    name_tokens(raw)
        .map(|token| {
            if is_honorific(token) {
                format!("{}.", title_case(token.trim_end_matches('.')))
            } else {
                title_case(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub name: String,
    pub normalized_key: String,
}

impl Instructor {
    pub fn new(raw_name: &str) -> Self {
        Self {
            name: canonical_name(raw_name),
            normalized_key: normalized_key(raw_name),
        }
    }
}

/// Atomic unit moved by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionGroup {
    pub id: String,
    pub projects: Vec<String>,
    pub supervisors: BTreeSet<String>,
    pub primary_supervisor: Option<String>,
}

impl SupervisionGroup {
    /// Group id without its `GROUP_` / `INDIVIDUAL_` prefix.
    pub fn display_id(&self) -> &str {
        self.id
            .strip_prefix(GROUP_PREFIX)
            .or_else(|| self.id.strip_prefix(INDIVIDUAL_PREFIX))
            .unwrap_or(&self.id)
    }
}

/// Builds supervision groups in order of first project appearance.
///
/// Projects whose primary supervisor supervises two or more projects are
/// grouped under `GROUP_<key>`; every other project becomes
/// `INDIVIDUAL_<project_id>`. Co-supervisors join the group's supervisor set
/// but never decide grouping.
pub fn build_supervision_groups(projects: &[Project]) -> Vec<SupervisionGroup> {
    let mut supervised: HashMap<String, usize> = HashMap::new();
    for project in projects {
        if let Some(key) = project.supervisor_key() {
            *supervised.entry(key).or_insert(0) += 1;
        }
    }

    let mut groups: Vec<SupervisionGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for project in projects {
        let shared_key = project
            .supervisor_key()
            .filter(|key| supervised.get(key).copied().unwrap_or(0) >= 2);

        let id = match &shared_key {
            Some(key) => format!("{GROUP_PREFIX}{key}"),
            None => format!("{INDIVIDUAL_PREFIX}{}", project.project_id),
        };

        let index = *group_index.entry(id.clone()).or_insert_with(|| {
            groups.push(SupervisionGroup {
                id,
                projects: Vec::new(),
                supervisors: BTreeSet::new(),
                primary_supervisor: project.supervisor_key(),
            });
            groups.len() - 1
        });

        let group = &mut groups[index];
        group.projects.push(project.project_id.clone());
        group.supervisors.extend(project.supervision_keys());
    }

    groups
}
