//! Free-form instructor roster parsing and reconciliation with the project table.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{PlannerError, Result};
use crate::model::{is_honorific, name_tokens, Instructor, Project};

/// Roster entry reconciled against the project table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedInstructor {
    pub instructor: Instructor,
    pub supervised_projects: Vec<String>,
}

impl ResolvedInstructor {
    pub fn is_supervisor(&self) -> bool {
        !self.supervised_projects.is_empty()
    }
}

/// Splits one roster line on honorific tokens, including titles glued to a name.
fn split_line(line: &str, line_number: usize) -> Result<Vec<String>> {
    let mut entries: Vec<Vec<&str>> = Vec::new();
    for token in name_tokens(line) {
        if is_honorific(token) || entries.is_empty() {
            entries.push(vec![token]);
        } else if let Some(current) = entries.last_mut() {
            current.push(token);
        }
    }

    entries
        .into_iter()
        .map(|tokens| {
            if tokens.iter().all(|token| is_honorific(token)) {
                Err(PlannerError::validation(
                    format!("roster line {line_number}"),
                    format!("honorific '{}' is not followed by a name", tokens.join(" ")),
                ))
            } else {
                Ok(tokens.join(" "))
            }
        })
        .collect()
}

/// Parses roster text: one instructor per entry, `#` comments, honorific split.
pub fn parse_roster(text: &str) -> Result<Vec<Instructor>> {
    let mut instructors = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for entry in split_line(line, index + 1)? {
            let instructor = Instructor::new(&entry);
            if instructor.normalized_key.is_empty() {
                return Err(PlannerError::validation(
                    format!("roster line {}", index + 1),
                    format!("'{entry}' does not contain a usable name"),
                ));
            }
            instructors.push(instructor);
        }
    }
    Ok(instructors)
}

/// A missing or unreadable roster file is an input-validation failure.
pub fn read_roster(path: &Path) -> Result<Vec<Instructor>> {
    let text = fs::read_to_string(path).map_err(|err| {
        PlannerError::validation(
            format!("roster {}", path.display()),
            format!("Unable to read the roster: {err}"),
        )
    })?;
    parse_roster(&text)
}

/// Harvests each instructor's projects by supervisor or co-supervisor key.
/// Entries without matches stay as non-supervising instructors.
pub fn resolve_roster(roster: &[Instructor], projects: &[Project]) -> Vec<ResolvedInstructor> {
    let resolved: Vec<ResolvedInstructor> = roster
        .iter()
        .map(|instructor| ResolvedInstructor {
            instructor: instructor.clone(),
            supervised_projects: projects
                .iter()
                .filter(|project| {
                    project
                        .supervision_keys()
                        .contains(&instructor.normalized_key)
                })
                .map(|project| project.project_id.clone())
                .collect(),
        })
        .collect();

    info!(
        instructors = resolved.len(),
        supervisors = resolved.iter().filter(|r| r.is_supervisor()).count(),
        "resolved instructor roster"
    );
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_concatenated_instructors_on_honorifics() {
        let roster = parse_roster("Dr Muhammad Asim Mr Saad Salman Prof Ahmed Ali").unwrap();
        let names: Vec<&str> = roster.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Muhammad Asim", "Mr. Saad Salman", "Prof. Ahmed Ali"]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let roster = parse_roster("# faculty\n\n  dr. sana khan\nAli Raza\n").unwrap();
        let names: Vec<&str> = roster.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Sana Khan", "Ali Raza"]);
    }

    #[test]
    fn dangling_honorific_is_a_validation_error() {
        let err = parse_roster("Dr. Ali\nProf.\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("roster line 2"));
    }

    #[test]
    fn resolves_projects_case_and_title_insensitively() {
        let projects = vec![
            Project::new("P1", "t").with_supervisor("MUHAMMAD ASIM"),
            Project::new("P2", "t")
                .with_supervisor("Dr. Sana")
                .with_co_supervisor("dr muhammad asim"),
        ];
        let roster = parse_roster("Dr. Muhammad Asim\nMs. Hina").unwrap();
        let resolved = resolve_roster(&roster, &projects);
        assert_eq!(resolved[0].supervised_projects, vec!["P1", "P2"]);
        assert!(!resolved[1].is_supervisor());
    }

    #[test]
    fn glued_title_supervisor_matches_spaced_roster_entry() {
        let projects = vec![Project::new("P1", "t").with_supervisor("Dr.Ali Raza")];
        let roster = parse_roster("Dr. Ali Raza").unwrap();
        let resolved = resolve_roster(&roster, &projects);
        assert_eq!(resolved[0].supervised_projects, vec!["P1"]);

        let glued = parse_roster("Dr.Ali Raza Prof.Hina Khan").unwrap();
        let names: Vec<&str> = glued.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Ali Raza", "Prof. Hina Khan"]);
    }

    #[test]
    fn missing_roster_file_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_roster(&dir.path().join("missing.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("missing.txt"), "{err}");
    }
}
