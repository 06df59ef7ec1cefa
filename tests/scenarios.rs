use std::fs;
use std::io::Write;

use fyp_panel_planner_lib::categorize::{
    categorize_by_keywords, CategorizationMethod, DomainCategorizer, ExternalDomain, ExternalLabels,
};
use fyp_panel_planner_lib::model::Project;
use fyp_panel_planner_lib::report::AnalysisReport;
use fyp_panel_planner_lib::roster::parse_roster;
use fyp_panel_planner_lib::similarity::{cosine_similarity, SimilarityBand};
use fyp_panel_planner_lib::tfidf::TfidfModel;
use fyp_panel_planner_lib::{
    analyze, roster, spreadsheet, write_outputs, AllocationConstraints, AnalysisConfig,
    AnalysisRequest, CancelToken, CategorizerError,
};
use pretty_assertions::assert_eq;

fn run(projects: &[Project], constraints: AllocationConstraints) -> AnalysisReport {
    let config = AnalysisConfig::default();
    let request = AnalysisRequest {
        projects,
        roster: &[],
        config: &config,
        constraints: &constraints,
    };
    analyze(&request, None, &CancelToken::new()).unwrap()
}

fn panel_of<'r>(report: &'r AnalysisReport, project: &str) -> usize {
    report
        .panels
        .iter()
        .find(|panel| {
            panel
                .groups
                .iter()
                .any(|group| group.projects.iter().any(|p| p == project))
        })
        .map(|panel| panel.panel_number)
        .unwrap()
}

#[test]
fn trivial_disjoint_projects_get_one_panel_each() {
    let projects = vec![
        Project::new("P1", "Glacier meltwater telemetry").with_supervisor("S1"),
        Project::new("P2", "Saxophone reed acoustics").with_supervisor("S2"),
        Project::new("P3", "Medieval pottery catalogue").with_supervisor("S3"),
    ];
    let report = run(&projects, AllocationConstraints::new(3, 2, 1));

    assert!(report.similarities.is_empty());
    for panel in &report.panels {
        assert_eq!(panel.total_projects, 1);
        assert_eq!(panel.instructors.len(), 1);
    }
    assert!(report.diagnostics.warnings.is_empty(), "{:?}", report.diagnostics.warnings);
    assert!(report.is_success());
}

#[test]
fn empty_corpus_succeeds_with_empty_panels() {
    let report = run(&[], AllocationConstraints::new(2, 3, 4));

    assert!(report.similarities.is_empty());
    assert!(report.domains.is_empty());
    assert_eq!(report.panels.len(), 2);
    assert!(report.panels.iter().all(|panel| panel.total_projects == 0));
    assert!(report.diagnostics.failed.is_empty());
    assert!(report.is_success());
}

#[test]
fn shared_supervisor_cluster_is_co_located() {
    let projects = vec![
        Project::new("P1", "Glacier meltwater telemetry").with_supervisor("S1"),
        Project::new("P2", "Volcano ash dispersion").with_supervisor("S1"),
        Project::new("P3", "Medieval pottery catalogue").with_supervisor("S2"),
    ];
    let report = run(&projects, AllocationConstraints::new(2, 2, 2));

    assert_eq!(panel_of(&report, "P1"), panel_of(&report, "P2"));
    assert_ne!(panel_of(&report, "P1"), panel_of(&report, "P3"));
    let s1 = report.instructors.iter().find(|a| a.normalized_key == "s1").unwrap();
    let s2 = report.instructors.iter().find(|a| a.normalized_key == "s2").unwrap();
    assert_eq!(s1.panel_number, Some(panel_of(&report, "P1")));
    assert_eq!(s2.panel_number, Some(panel_of(&report, "P3")));
    assert!(report.diagnostics.failed.is_empty());
}

#[test]
fn soft_limit_is_exceeded_only_as_needed() {
    let words = [
        "alpha", "bravo", "charlie", "delta", "foxtrot", "golf", "hotel", "juliet", "kilo",
    ];
    let projects: Vec<Project> = words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            Project::new(format!("P{}", i + 1), *word).with_supervisor(format!("S{i}"))
        })
        .collect();
    let report = run(&projects, AllocationConstraints::new(2, 10, 3));

    let mut totals: Vec<usize> = report.panels.iter().map(|p| p.total_projects).collect();
    totals.sort_unstable();
    assert_eq!(totals, vec![4, 5]);
    assert!(!report.diagnostics.constraint_violations.is_empty());
    assert!(report.panels.iter().all(|p| p.instructors.len() <= 10));
    assert!(report.is_success());
}

fn similarity(documents: &[&str], a: usize, b: usize) -> f64 {
    let cancel = CancelToken::new();
    let model = TfidfModel::fit(documents, &Default::default(), &cancel).unwrap();
    let vectors = model.transform(documents, &cancel).unwrap();
    cosine_similarity(&vectors[a], &vectors[b])
}

#[test]
fn identical_scopes_band_very_high() {
    let score = similarity(
        &[
            "smart irrigation sensors",
            "smart irrigation sensors",
            "medieval pottery catalogue",
        ],
        0,
        1,
    );
    assert!((score - 1.0).abs() < 1e-9);
    assert_eq!(SimilarityBand::from_score(score), SimilarityBand::VeryHigh);
}

#[test]
fn partially_shared_scopes_land_between_bands() {
    let score = similarity(
        &[
            "robotics vision navigation",
            "robotics vision planning",
            "glacier",
            "saxophone",
            "pottery",
            "volcano",
            "cathedral",
            "lantern",
            "meadow",
            "orchard",
        ],
        0,
        1,
    );
    assert!(score > 0.3 && score < 0.7, "score {score}");
}

#[test]
fn unmatched_project_defaults_to_other() {
    let labels = categorize_by_keywords(&Project::new("X1", "xyz"));
    assert_eq!(labels.domains, vec!["Other"]);
    assert_eq!(labels.primary_domain, "Other");
    assert_eq!(labels.method(), CategorizationMethod::Default);
    assert_eq!(labels.confidence_scores["Other"].score, 1);
}

#[test]
fn honorifics_split_a_concatenated_roster_line() {
    let roster = parse_roster("Dr Muhammad Asim Mr Saad Salman Prof Ahmed Ali").unwrap();
    let names: Vec<&str> = roster.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Dr. Muhammad Asim", "Mr. Saad Salman", "Prof. Ahmed Ali"]);
}

/// Answers for ids in `known`, fails for everything else.
struct Partial {
    known: Vec<&'static str>,
}

impl DomainCategorizer for Partial {
    fn categorize(&mut self, project: &Project) -> Result<ExternalLabels, CategorizerError> {
        if self.known.contains(&project.project_id.as_str()) {
            Ok(ExternalLabels {
                domains: vec![ExternalDomain {
                    name: "Robotics & Automation".into(),
                    confidence: 9,
                    reasoning: "robot arm".into(),
                }],
                primary_domain: None,
            })
        } else {
            Err(CategorizerError::Remote("rate limited".into()))
        }
    }
}

#[test]
fn failed_external_records_match_the_keyword_path() {
    let projects = vec![
        Project::new("P1", "Hospital booking app").with_scope("Patients book appointments"),
        Project::new("P2", "Robot arm control").with_scope("Servo control for a robot arm"),
        Project::new("P3", "Crop monitoring").with_scope("Soil sensors for agriculture"),
    ];
    let mut config = AnalysisConfig::default();
    config.categorizer.request_delay_ms = 0;
    let constraints = AllocationConstraints::new(2, 3, 2);
    let request = AnalysisRequest {
        projects: &projects,
        roster: &[],
        config: &config,
        constraints: &constraints,
    };

    let mut partial = Partial { known: vec!["P2"] };
    let mixed = analyze(&request, Some(&mut partial), &CancelToken::new()).unwrap();

    assert_eq!(mixed.domains[1].method, CategorizationMethod::External);
    for index in [0, 2] {
        let keyword = categorize_by_keywords(&projects[index]);
        assert_eq!(mixed.domains[index].domains, keyword.domains);
        assert_eq!(mixed.domains[index].method, keyword.method());
    }
}

#[test]
fn end_to_end_run_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("projects.csv");
    fs::write(
        &table,
        "Short_Title,Project Title,Project Scope,Supervisor,Co-Supervisor\n\
         MedBook,Hospital appointment booking,Mobile app for patients to book hospital appointments,Dr. Ali,\n\
         ClinicBook,Clinic appointment booking,Web portal for patients to book clinic appointments,Dr. Ali,\n\
         CropAI,Crop yield prediction,Machine learning on soil sensor data,Dr. Sana,Dr. Ali\n\
         ChainVote,Blockchain voting,Secure voting with smart contracts,Mr. Saad,\n",
    )
    .unwrap();
    let roster_path = dir.path().join("roster.txt");
    let mut roster_file = fs::File::create(&roster_path).unwrap();
    writeln!(roster_file, "# faculty\nDr. Ali Dr. Sana\nMr Saad\nMs. Hina Khan").unwrap();

    let projects = spreadsheet::load_projects(&table).unwrap();
    let roster = roster::read_roster(&roster_path).unwrap();
    let config = AnalysisConfig::default();
    let constraints = AllocationConstraints::new(2, 3, 2);
    let request = AnalysisRequest {
        projects: &projects,
        roster: &roster,
        config: &config,
        constraints: &constraints,
    };

    let first = analyze(&request, None, &CancelToken::new()).unwrap();
    let second = analyze(&request, None, &CancelToken::new()).unwrap();

    let out1 = dir.path().join("run1");
    let out2 = dir.path().join("run2");
    let written1 = write_outputs(&first, &out1, &config.output).unwrap();
    let written2 = write_outputs(&second, &out2, &config.output).unwrap();
    assert_eq!(
        fs::read(&written1[3]).unwrap(),
        fs::read(&written2[3]).unwrap()
    );

    assert_eq!(first.summary.total_projects, 4);
    assert_eq!(first.summary.roster_instructors, 4);
    assert_eq!(first.summary.roster_supervisors, 3);
    let hina = first
        .instructors
        .iter()
        .find(|a| a.instructor_name == "Ms. Hina Khan")
        .unwrap();
    assert!(hina.panel_number.is_some());
    assert!(hina.supervised_projects.is_empty());
    assert!(first.is_success());

    let names: Vec<&str> = first.instructors.iter().map(|a| a.instructor_name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}
