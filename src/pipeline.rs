//! End-to-end analysis: categorize, vectorize, mine pairs, explain, group,
//! allocate panels and assemble the report.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, info};

use crate::allocate::{allocate_panels, AllocationRequest};
use crate::cancel::CancelToken;
use crate::categorize::{categorize_projects, DomainCategorizer, DomainLabels, OTHER_DOMAIN};
use crate::config::{AllocationConstraints, AnalysisConfig};
use crate::error::{PlannerError, Result};
use crate::explain::explain_pair;
use crate::model::{build_supervision_groups, Instructor, Project};
use crate::overlap::build_overlap_components;
use crate::report::{
    utilization, AnalysisReport, AnalysisSummary, DomainRow, GroupView, PanelRow, SimilarityRow,
};
use crate::roster::resolve_roster;
use crate::similarity::mine_similar_pairs;
use crate::tfidf::TfidfModel;

pub struct AnalysisRequest<'a> {
    pub projects: &'a [Project],
    /// Parsed roster; may be empty.
    pub roster: &'a [Instructor],
    pub config: &'a AnalysisConfig,
    pub constraints: &'a AllocationConstraints,
}

fn validate_projects(projects: &[Project]) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, project) in projects.iter().enumerate() {
        if project.project_id.trim().is_empty() {
            return Err(PlannerError::validation(
                format!("project {}", index + 1),
                "project_id is empty",
            ));
        }
        if !seen.insert(project.project_id.as_str()) {
            return Err(PlannerError::validation(
                format!("project {}", index + 1),
                format!("duplicate project_id '{}'", project.project_id),
            ));
        }
    }
    Ok(())
}

/// Domains both records carry, in the first record's order. `Other` is
/// never reported as shared.
fn overlapping_domains(a: &DomainLabels, b: &DomainLabels) -> Vec<String> {
    a.domains
        .iter()
        .filter(|domain| domain.as_str() != OTHER_DOMAIN && b.domains.contains(domain))
        .cloned()
        .collect()
}

/// Runs the full analysis. Nothing is written; on cancellation the partial
/// state is dropped and `PlannerError::Cancelled` is returned.
pub fn analyze(
    request: &AnalysisRequest<'_>,
    external: Option<&mut dyn DomainCategorizer>,
    cancel: &CancelToken,
) -> Result<AnalysisReport> {
    let AnalysisRequest {
        projects,
        roster,
        config,
        constraints,
    } = *request;

    config.validate()?;
    constraints.validate()?;
    validate_projects(projects)?;
    info!(
        projects = projects.len(),
        roster = roster.len(),
        external = external.is_some(),
        "starting analysis"
    );

    let labels = categorize_projects(
        projects,
        external,
        Duration::from_millis(config.categorizer.request_delay_ms),
        cancel,
    )?;

    let documents: Vec<String> = projects.iter().map(Project::combined_text).collect();
    let model = TfidfModel::fit(&documents, &config.vectorizer, cancel)?;
    let vectors = model.transform(&documents, cancel)?;
    info!(
        vocabulary = model.vocabulary().len(),
        documents = model.document_count(),
        "vectorized project texts"
    );

    let ids: Vec<String> = projects.iter().map(|p| p.project_id.clone()).collect();
    let pairs = mine_similar_pairs(&ids, &vectors, config.similarity_threshold, cancel)?;

    let similarities: Vec<SimilarityRow> = pairs
        .iter()
        .map(|pair| {
            let shared = overlapping_domains(&labels[pair.index1], &labels[pair.index2]);
            SimilarityRow {
                project1_id: pair.project1_id.clone(),
                project1_title: projects[pair.index1].title.clone(),
                project2_id: pair.project2_id.clone(),
                project2_title: projects[pair.index2].title.clone(),
                score: pair.score,
                band: pair.band(),
                explanation: explain_pair(
                    &documents[pair.index1],
                    &documents[pair.index2],
                    pair.score,
                    &shared,
                ),
                overlapping_domains: shared,
            }
        })
        .collect();

    let resolved = resolve_roster(roster, projects);
    for entry in resolved.iter().filter(|entry| !entry.is_supervisor()) {
        debug!(instructor = %entry.instructor.name, "roster entry supervises no project");
    }

    let groups = build_supervision_groups(projects);
    let components = build_overlap_components(
        &groups,
        Some(&pairs),
        config.overlap_similarity_cutoff,
    );
    info!(
        groups = groups.len(),
        clusters = components.clusters.len(),
        singletons = components.singletons.len(),
        "built supervision groups"
    );

    let primary_domains: HashMap<String, String> = labels
        .iter()
        .map(|record| (record.project_id.clone(), record.primary_domain.clone()))
        .collect();
    let allocation_request = AllocationRequest {
        projects,
        groups: &groups,
        components: &components,
        constraints,
        instructors: roster,
        primary_domains: Some(&primary_domains),
    };
    let allocation = allocate_panels(&allocation_request)?;

    let names: HashMap<&str, &str> = allocation
        .assignments
        .iter()
        .map(|a| (a.normalized_key.as_str(), a.instructor_name.as_str()))
        .collect();
    let panels: Vec<PanelRow> = allocation
        .panels
        .iter()
        .map(|panel| PanelRow {
            panel_number: panel.panel_number,
            groups: panel
                .groups
                .iter()
                .map(|group| GroupView {
                    id: group.display_id().to_string(),
                    projects: group.projects.clone(),
                })
                .collect(),
            instructors: panel
                .instructors
                .iter()
                .map(|key| names.get(key.as_str()).copied().unwrap_or(key).to_string())
                .collect(),
            actual_groups: panel.constraint_view.actual_groups,
            total_projects: panel.total_projects,
            max_instructors: panel.constraint_view.max_instructors,
            desired_projects: panel.constraint_view.desired_projects,
            utilization: utilization(panel.total_projects, panel.constraint_view.desired_projects),
        })
        .collect();

    let domains: Vec<DomainRow> = projects
        .iter()
        .zip(&labels)
        .map(|(project, record)| DomainRow::from_labels(&project.title, record))
        .collect();

    let summary = AnalysisSummary::build(
        &domains,
        &similarities,
        resolved.len(),
        resolved.iter().filter(|entry| entry.is_supervisor()).count(),
    );
    info!(
        projects = summary.total_projects,
        pairs = summary.similar_pairs,
        success = allocation.is_success(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        constraints: *constraints,
        summary,
        domains,
        similarities,
        panels,
        instructors: allocation.assignments,
        diagnostics: allocation.diagnostics,
    })
}
