//! Output artifacts: row records, the analysis summary and their JSON and
//! workbook serializations.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::allocate::{AllocationDiagnostics, InstructorAssignment};
use crate::categorize::{CategorizationMethod, DomainLabels};
use crate::config::{AllocationConstraints, OutputConfig};
use crate::error::{PlannerError, Result};
use crate::similarity::SimilarityBand;

const SHEET_NAME_LIMIT: usize = 31;
const TOP_DOMAIN_COUNT: usize = 5;

const DOMAIN_SHEET: &str = "Project_Domains";
const SIMILARITY_SHEET: &str = "Project_Similarities";
const PANELS_SHEET: &str = "Panels";
const ASSIGNMENTS_SHEET: &str = "Instructor Assignments";
const DIAGNOSTICS_SHEET: &str = "Diagnostics";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRow {
    pub project_id: String,
    pub title: String,
    pub primary_domain: String,
    pub domains: Vec<String>,
    pub method: CategorizationMethod,
    pub max_confidence: i64,
}

impl DomainRow {
    pub fn from_labels(title: &str, labels: &DomainLabels) -> Self {
        Self {
            project_id: labels.project_id.clone(),
            title: title.to_string(),
            primary_domain: labels.primary_domain.clone(),
            domains: labels.domains.clone(),
            method: labels.method(),
            max_confidence: labels.max_confidence(),
        }
    }

    pub fn all_domains(&self) -> String {
        self.domains.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityRow {
    pub project1_id: String,
    pub project1_title: String,
    pub project2_id: String,
    pub project2_title: String,
    pub score: f64,
    pub band: SimilarityBand,
    pub overlapping_domains: Vec<String>,
    pub explanation: String,
}

/// A supervision group as shown in reports: id without its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: String,
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRow {
    pub panel_number: usize,
    pub groups: Vec<GroupView>,
    pub instructors: Vec<String>,
    pub actual_groups: usize,
    pub total_projects: usize,
    pub max_instructors: usize,
    pub desired_projects: usize,
    /// `total_projects / desired_projects`.
    pub utilization: f64,
}

pub fn utilization(total_projects: usize, desired_projects: usize) -> f64 {
    if desired_projects == 0 {
        0.0
    } else {
        total_projects as f64 / desired_projects as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCount {
    pub domain: String,
    pub projects: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_projects: usize,
    pub top_domains: Vec<DomainCount>,
    pub similar_pairs: usize,
    /// Every band, in band order.
    pub band_counts: IndexMap<String, usize>,
    /// Every categorization method, keyword first.
    pub method_counts: IndexMap<String, usize>,
    pub roster_instructors: usize,
    pub roster_supervisors: usize,
}

impl AnalysisSummary {
    pub fn build(
        domains: &[DomainRow],
        similarities: &[SimilarityRow],
        roster_instructors: usize,
        roster_supervisors: usize,
    ) -> Self {
        let mut domain_counts: IndexMap<&str, usize> = IndexMap::new();
        for row in domains {
            for domain in &row.domains {
                *domain_counts.entry(domain.as_str()).or_insert(0) += 1;
            }
        }
        let mut top_domains: Vec<DomainCount> = domain_counts
            .into_iter()
            .map(|(domain, projects)| DomainCount {
                domain: domain.to_string(),
                projects,
            })
            .collect();
        top_domains.sort_by(|a, b| {
            b.projects
                .cmp(&a.projects)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        top_domains.truncate(TOP_DOMAIN_COUNT);

        let band_counts = SimilarityBand::ALL
            .iter()
            .map(|band| {
                let count = similarities.iter().filter(|row| row.band == *band).count();
                (band.label().to_string(), count)
            })
            .collect();

        let method_counts = [
            CategorizationMethod::Keyword,
            CategorizationMethod::External,
            CategorizationMethod::Default,
        ]
        .into_iter()
        .map(|method| {
            let count = domains.iter().filter(|row| row.method == method).count();
            (method.label().to_string(), count)
        })
        .collect();

        Self {
            total_projects: domains.len(),
            top_domains,
            similar_pairs: similarities.len(),
            band_counts,
            method_counts,
            roster_instructors,
            roster_supervisors,
        }
    }
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Projects analyzed: {}", self.total_projects)?;
        writeln!(f, "Top domains:")?;
        for entry in &self.top_domains {
            writeln!(f, "  {}: {}", entry.domain, entry.projects)?;
        }
        writeln!(f, "Similar pairs: {}", self.similar_pairs)?;
        for (band, count) in &self.band_counts {
            writeln!(f, "  {band}: {count}")?;
        }
        let methods = self
            .method_counts
            .iter()
            .map(|(method, count)| format!("{method} {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Categorization methods: {methods}")?;
        write!(
            f,
            "Roster: {} instructors, {} supervising",
            self.roster_instructors, self.roster_supervisors
        )
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub constraints: AllocationConstraints,
    pub summary: AnalysisSummary,
    pub domains: Vec<DomainRow>,
    pub similarities: Vec<SimilarityRow>,
    pub panels: Vec<PanelRow>,
    pub instructors: Vec<InstructorAssignment>,
    pub diagnostics: AllocationDiagnostics,
}

impl AnalysisReport {
    pub fn is_success(&self) -> bool {
        self.diagnostics.failed.is_empty()
    }
}

pub fn default_output_dir_name() -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    format!("fyp_analysis_{timestamp}")
}

/// Excel sheet name: word characters, spaces and `-` only, at most 31
/// characters, unique (case-insensitively) within the workbook.
fn sanitize_sheet_name(raw: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '_' | ' ' | '-'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let base = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    };

    let mut candidate: String = base.chars().take(SHEET_NAME_LIMIT).collect();
    let mut suffix = 2;
    while !used.insert(candidate.to_lowercase()) {
        let tail = format!(" ({suffix})");
        let room = SHEET_NAME_LIMIT - tail.chars().count();
        candidate = base.chars().take(room).collect::<String>() + &tail;
        suffix += 1;
    }
    candidate
}

enum Cell {
    Text(String),
    Number(f64),
    Percent(f64),
}

struct Formats {
    header: Format,
    percent: Format,
    wrap: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            percent: Format::new().set_num_format("0.0%"),
            wrap: Format::new().set_text_wrap(),
        }
    }
}

fn write_table(
    sheet: &mut Worksheet,
    formats: &Formats,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<Cell>>,
) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }
    for (index, cells) in rows.into_iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, cell) in cells.into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(value) if value.contains('\n') => {
                    sheet.write_string_with_format(row, col, value, &formats.wrap)?;
                }
                Cell::Text(value) => {
                    sheet.write_string(row, col, value)?;
                }
                Cell::Number(value) => {
                    sheet.write_number(row, col, value)?;
                }
                Cell::Percent(value) => {
                    sheet.write_number_with_format(row, col, value, &formats.percent)?;
                }
            }
        }
    }
    Ok(())
}

fn add_named_sheet<'w>(workbook: &'w mut Workbook, name: &str) -> Result<&'w mut Worksheet> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    Ok(sheet)
}

fn domain_cells(row: &DomainRow) -> Vec<Cell> {
    vec![
        Cell::Text(row.project_id.clone()),
        Cell::Text(row.title.clone()),
        Cell::Text(row.primary_domain.clone()),
        Cell::Text(row.all_domains()),
        Cell::Text(row.method.label().to_string()),
        Cell::Number(row.max_confidence as f64),
    ]
}

pub fn write_domain_workbook(path: &Path, rows: &[DomainRow]) -> Result<()> {
    const HEADERS: &[&str] = &[
        "Project ID",
        "Title",
        "Primary Domain",
        "All Domains",
        "Method",
        "Max Confidence",
    ];
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let mut used = HashSet::new();

    let name = sanitize_sheet_name(DOMAIN_SHEET, &mut used);
    let sheet = add_named_sheet(&mut workbook, &name)?;
    write_table(sheet, &formats, HEADERS, rows.iter().map(domain_cells))?;
    sheet.set_column_width(1, 48)?;
    sheet.set_column_width(3, 40)?;

    let mut domains: Vec<&str> = Vec::new();
    for row in rows {
        for domain in &row.domains {
            if !domains.contains(&domain.as_str()) {
                domains.push(domain);
            }
        }
    }
    for domain in domains {
        let name = sanitize_sheet_name(domain, &mut used);
        let sheet = add_named_sheet(&mut workbook, &name)?;
        write_table(
            sheet,
            &formats,
            HEADERS,
            rows.iter()
                .filter(|row| row.domains.iter().any(|d| d == domain))
                .map(domain_cells),
        )?;
        sheet.set_column_width(1, 48)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn similarity_cells(row: &SimilarityRow) -> Vec<Cell> {
    vec![
        Cell::Text(row.project1_id.clone()),
        Cell::Text(row.project1_title.clone()),
        Cell::Text(row.project2_id.clone()),
        Cell::Text(row.project2_title.clone()),
        Cell::Percent(row.score),
        Cell::Text(row.band.label().to_string()),
        Cell::Text(row.overlapping_domains.join(", ")),
        Cell::Text(row.explanation.clone()),
    ]
}

pub fn write_similarity_workbook(path: &Path, rows: &[SimilarityRow]) -> Result<()> {
    const HEADERS: &[&str] = &[
        "Project 1 ID",
        "Project 1 Title",
        "Project 2 ID",
        "Project 2 Title",
        "Similarity",
        "Band",
        "Overlapping Domains",
        "Explanation",
    ];
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let mut used = HashSet::new();

    let name = sanitize_sheet_name(SIMILARITY_SHEET, &mut used);
    let sheet = add_named_sheet(&mut workbook, &name)?;
    write_table(sheet, &formats, HEADERS, rows.iter().map(similarity_cells))?;
    sheet.set_column_width(7, 80)?;

    for band in SimilarityBand::ALL {
        if !rows.iter().any(|row| row.band == band) {
            continue;
        }
        let name = sanitize_sheet_name(&format!("{}_Similarity", band.label()), &mut used);
        let sheet = add_named_sheet(&mut workbook, &name)?;
        write_table(
            sheet,
            &formats,
            HEADERS,
            rows.iter()
                .filter(|row| row.band == band)
                .map(similarity_cells),
        )?;
        sheet.set_column_width(7, 80)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn describe_groups(groups: &[GroupView]) -> String {
    groups
        .iter()
        .map(|group| {
            if group.projects.len() == 1 && group.projects[0] == group.id {
                group.id.clone()
            } else {
                format!("{} ({})", group.id, group.projects.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn write_panel_workbook(
    path: &Path,
    panels: &[PanelRow],
    instructors: &[InstructorAssignment],
    diagnostics: &AllocationDiagnostics,
) -> Result<()> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    let sheet = add_named_sheet(&mut workbook, PANELS_SHEET)?;
    write_table(
        sheet,
        &formats,
        &[
            "Panel",
            "Groups",
            "Instructors",
            "Actual Groups",
            "Total Projects",
            "Max Instructors",
            "Desired Projects",
            "Utilization",
        ],
        panels.iter().map(|panel| {
            vec![
                Cell::Number(panel.panel_number as f64),
                Cell::Text(describe_groups(&panel.groups)),
                Cell::Text(panel.instructors.join(", ")),
                Cell::Number(panel.actual_groups as f64),
                Cell::Number(panel.total_projects as f64),
                Cell::Number(panel.max_instructors as f64),
                Cell::Number(panel.desired_projects as f64),
                Cell::Percent(panel.utilization),
            ]
        }),
    )?;
    sheet.set_column_width(1, 60)?;
    sheet.set_column_width(2, 40)?;

    let sheet = add_named_sheet(&mut workbook, ASSIGNMENTS_SHEET)?;
    write_table(
        sheet,
        &formats,
        &["Instructor", "Panel", "Supervised Projects", "Project Count", "Status"],
        instructors.iter().map(|assignment| {
            vec![
                Cell::Text(assignment.instructor_name.clone()),
                match assignment.panel_number {
                    Some(panel) => Cell::Number(panel as f64),
                    None => Cell::Text(String::new()),
                },
                Cell::Text(assignment.supervised_projects.join(", ")),
                Cell::Number(assignment.project_count as f64),
                Cell::Text(assignment.status.label().to_string()),
            ]
        }),
    )?;
    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(2, 40)?;

    let categories: [(&str, &[String]); 5] = [
        ("successful", &diagnostics.successful),
        ("failed", &diagnostics.failed),
        ("warning", &diagnostics.warnings),
        ("constraint_violation", &diagnostics.constraint_violations),
        ("balance", &diagnostics.balance_summary),
    ];
    let sheet = add_named_sheet(&mut workbook, DIAGNOSTICS_SHEET)?;
    write_table(
        sheet,
        &formats,
        &["Category", "Message"],
        categories.iter().flat_map(|(category, messages)| {
            messages.iter().map(move |message| {
                vec![
                    Cell::Text(category.to_string()),
                    Cell::Text(message.clone()),
                ]
            })
        }),
    )?;
    sheet.set_column_width(1, 100)?;

    workbook.save(path)?;
    Ok(())
}

pub fn write_report_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(report)?;
    data.push(b'\n');
    fs::write(path, data).map_err(|err| PlannerError::io(path, err))
}

/// Writes all four artifacts into `dir`, creating it if needed.
pub fn write_outputs(
    report: &AnalysisReport,
    dir: &Path,
    names: &OutputConfig,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|err| PlannerError::io(dir, err))?;

    let domain_path = dir.join(&names.domain_workbook);
    write_domain_workbook(&domain_path, &report.domains)?;

    let similarity_path = dir.join(&names.similarity_workbook);
    write_similarity_workbook(&similarity_path, &report.similarities)?;

    let panel_path = dir.join(&names.panel_workbook);
    write_panel_workbook(&panel_path, &report.panels, &report.instructors, &report.diagnostics)?;

    let json_path = dir.join(&names.report_json);
    write_report_json(&json_path, report)?;

    info!(dir = %dir.display(), "wrote analysis artifacts");
    Ok(vec![domain_path, similarity_path, panel_path, json_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn domain_row(id: &str, domains: &[&str], method: CategorizationMethod) -> DomainRow {
        DomainRow {
            project_id: id.into(),
            title: format!("{id} title"),
            primary_domain: domains[0].into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            method,
            max_confidence: 1,
        }
    }

    fn similarity_row(score: f64) -> SimilarityRow {
        SimilarityRow {
            project1_id: "A".into(),
            project1_title: "a".into(),
            project2_id: "B".into(),
            project2_title: "b".into(),
            score,
            band: SimilarityBand::from_score(score),
            overlapping_domains: Vec::new(),
            explanation: "Similarity".into(),
        }
    }

    #[test]
    fn sheet_names_are_cleaned_truncated_and_unique() {
        let mut used = HashSet::new();
        assert_eq!(sanitize_sheet_name("Healthcare & Medical", &mut used), "Healthcare Medical");
        let long = "Artificial Intelligence & Machine Learning Systems";
        let first = sanitize_sheet_name(long, &mut used);
        let second = sanitize_sheet_name(long, &mut used);
        assert_eq!(first.chars().count(), 31);
        assert_eq!(second.chars().count(), 31);
        assert!(second.ends_with(" (2)"));
        assert_ne!(first, second);
        assert_eq!(sanitize_sheet_name("***", &mut used), "Sheet");
    }

    #[test]
    fn summary_ranks_domains_and_counts_bands() {
        let domains = vec![
            domain_row(
                "P1",
                &["Web Development", "Cloud Computing"],
                CategorizationMethod::Keyword,
            ),
            domain_row("P2", &["Cloud Computing"], CategorizationMethod::Keyword),
            domain_row("P3", &["Other"], CategorizationMethod::Default),
        ];
        let similarities = vec![similarity_row(0.9), similarity_row(0.4), similarity_row(0.35)];
        let summary = AnalysisSummary::build(&domains, &similarities, 4, 2);

        assert_eq!(summary.top_domains[0].domain, "Cloud Computing");
        assert_eq!(summary.top_domains[0].projects, 2);
        assert_eq!(summary.top_domains[1].domain, "Other");
        assert_eq!(summary.band_counts["Very High"], 1);
        assert_eq!(summary.band_counts["Medium"], 2);
        assert_eq!(summary.band_counts["Low"], 0);
        assert_eq!(summary.method_counts["keyword"], 2);
        assert_eq!(summary.method_counts["default"], 1);
        assert!(summary.to_string().contains("Similar pairs: 3"));
    }

    #[test]
    fn workbooks_and_json_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let domains = vec![domain_row(
            "P1",
            &["Healthcare & Medical"],
            CategorizationMethod::Keyword,
        )];
        let similarities = vec![similarity_row(0.8)];
        let report = AnalysisReport {
            constraints: AllocationConstraints::default(),
            summary: AnalysisSummary::build(&domains, &similarities, 0, 0),
            domains,
            similarities,
            panels: vec![PanelRow {
                panel_number: 1,
                groups: vec![GroupView {
                    id: "P1".into(),
                    projects: vec!["P1".into()],
                }],
                instructors: vec!["Dr. Ali".into()],
                actual_groups: 1,
                total_projects: 1,
                max_instructors: 5,
                desired_projects: 10,
                utilization: utilization(1, 10),
            }],
            instructors: Vec::new(),
            diagnostics: AllocationDiagnostics::default(),
        };

        let written = write_outputs(&report, dir.path(), &OutputConfig::default()).unwrap();
        assert_eq!(written.len(), 4);
        for path in &written {
            assert!(path.exists(), "{}", path.display());
        }
        let json = fs::read_to_string(&written[3]).unwrap();
        let parsed: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn group_descriptions_hide_redundant_ids() {
        let groups = vec![
            GroupView {
                id: "P3".into(),
                projects: vec!["P3".into()],
            },
            GroupView {
                id: "ali".into(),
                projects: vec!["P1".into(), "P2".into()],
            },
        ];
        assert_eq!(describe_groups(&groups), "P3; ali (P1, P2)");
    }
}
