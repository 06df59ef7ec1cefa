//! Evaluation panel allocation.
//!
//! Phases run in a fixed order:
//!
//! * **A**: multi-group overlap clusters, largest first, each onto one panel.
//! * **B**: remaining singleton groups in group order.
//! * **C**: every supervisor is re-seated on the panel where they supervise
//!   the most projects.
//! * **D**: roster instructors without projects fill the emptiest panels.
//! * **E**: utilization, soft-constraint and balance diagnostics.
//!
//! Every ranking breaks ties towards the lowest panel number. Cluster order
//! ties keep first-seen order; supervisor-majority ties go to the lowest
//! panel number.
//!
//! Placement is greedy in phase order and never revisits a panel choice, so
//! the desired-projects limit can be exceeded even when a different packing
//! would have stayed within it. Exceedances are reported, not prevented.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AllocationConstraints;
use crate::error::{PlannerError, Result};
use crate::model::{canonical_name, Instructor, Project, SupervisionGroup};
use crate::overlap::OverlapComponents;

const SAME_DOMAIN_LIMIT: usize = 4;

pub struct AllocationRequest<'a> {
    pub projects: &'a [Project],
    pub groups: &'a [SupervisionGroup],
    pub components: &'a OverlapComponents,
    pub constraints: &'a AllocationConstraints,
    /// Roster; may be empty, supervisors are always included.
    pub instructors: &'a [Instructor],
    /// Primary domain per project id, used for the diversity bonus.
    pub primary_domains: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintView {
    pub max_instructors: usize,
    pub desired_projects: usize,
    pub actual_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel<'a> {
    pub panel_number: usize,
    pub groups: Vec<&'a SupervisionGroup>,
    /// Instructor keys.
    pub instructors: BTreeSet<String>,
    pub total_projects: usize,
    pub constraint_view: ConstraintView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructorStatus {
    Supervisor,
    #[serde(rename = "Panel Member")]
    PanelMember,
    Unassigned,
}

impl InstructorStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Supervisor => "Supervisor",
            Self::PanelMember => "Panel Member",
            Self::Unassigned => "Unassigned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorAssignment {
    pub instructor_name: String,
    pub normalized_key: String,
    pub panel_number: Option<usize>,
    pub supervised_projects: Vec<String>,
    pub project_count: usize,
    pub status: InstructorStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDiagnostics {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
    pub constraint_violations: Vec<String>,
    pub balance_summary: Vec<String>,
    pub project_spread: usize,
    pub instructor_spread: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelAllocation<'a> {
    pub panels: Vec<Panel<'a>>,
    pub assignments: Vec<InstructorAssignment>,
    pub diagnostics: AllocationDiagnostics,
}

impl PanelAllocation<'_> {
    /// No group failed to place.
    pub fn is_success(&self) -> bool {
        self.diagnostics.failed.is_empty()
    }
}

pub fn project_balance_band(spread: usize) -> &'static str {
    match spread {
        0..=2 => "Excellent",
        3..=5 => "Good",
        6..=8 => "Moderate",
        _ => "Needs Review",
    }
}

pub fn instructor_balance_band(spread: usize) -> &'static str {
    match spread {
        0 => "Perfect",
        1 => "Good",
        2 => "Moderate",
        _ => "Needs Review",
    }
}

#[derive(Debug, Default, Clone)]
struct PanelState {
    groups: Vec<usize>,
    instructors: BTreeSet<String>,
    total_projects: usize,
    domain_counts: HashMap<String, usize>,
}

struct Candidate {
    label: String,
    groups: Vec<usize>,
    projects: usize,
    supervisors: BTreeSet<String>,
    domains: HashMap<String, usize>,
}

struct Allocator<'a> {
    request: &'a AllocationRequest<'a>,
    max_instructors: usize,
    desired_projects: usize,
    panels: Vec<PanelState>,
    diagnostics: AllocationDiagnostics,
}

impl<'a> Allocator<'a> {
    fn new(request: &'a AllocationRequest<'a>) -> Self {
        Self {
            request,
            max_instructors: request.constraints.max_instructors(),
            desired_projects: request.constraints.desired_projects(),
            panels: vec![PanelState::default(); request.constraints.panels()],
            diagnostics: AllocationDiagnostics::default(),
        }
    }

    fn candidate(&self, groups: &[usize]) -> Candidate {
        let mut projects = 0;
        let mut supervisors = BTreeSet::new();
        let mut domains = HashMap::new();
        for &index in groups {
            let group = &self.request.groups[index];
            projects += group.projects.len();
            supervisors.extend(group.supervisors.iter().cloned());
            if let Some(primary_domains) = self.request.primary_domains {
                for project in &group.projects {
                    if let Some(domain) = primary_domains.get(project) {
                        *domains.entry(domain.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        let label = groups
            .iter()
            .map(|&index| self.request.groups[index].id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Candidate {
            label,
            groups: groups.to_vec(),
            projects,
            supervisors,
            domains,
        }
    }

    /// Composite placement score, or `None` when the instructor cap would break.
    fn score(&self, panel: usize, candidate: &Candidate) -> Option<i64> {
        let state = &self.panels[panel];
        let seated = state.instructors.union(&candidate.supervisors).count();
        if seated > self.max_instructors {
            return None;
        }

        let min_projects = self.panels.iter().map(|p| p.total_projects).min().unwrap_or(0);
        let min_groups = self.panels.iter().map(|p| p.groups.len()).min().unwrap_or(0);
        let mut score = 0i64;

        let projects = state.total_projects;
        score += if projects == min_projects {
            2000
        } else if projects <= min_projects + 2 {
            1500
        } else if projects <= min_projects + 5 {
            1000
        } else {
            0
        };

        let groups = state.groups.len();
        score += if groups == min_groups {
            1000
        } else if groups <= min_groups + 2 {
            500
        } else {
            0
        };

        let new_total = projects + candidate.projects;
        let projected = self.panels.iter().enumerate().map(|(index, p)| {
            if index == panel {
                new_total
            } else {
                p.total_projects
            }
        });
        let (low, high) = projected.fold((usize::MAX, 0), |(low, high), total| {
            (low.min(total), high.max(total))
        });
        let spread = high.saturating_sub(low);
        score += match spread {
            0..=3 => 800,
            4..=6 => 400,
            _ => -50 * spread as i64,
        };

        score += if new_total <= self.desired_projects {
            100
        } else {
            -200 * (new_total - self.desired_projects) as i64
        };

        score += 10 * (self.max_instructors - seated) as i64;

        let crowded = candidate.domains.iter().any(|(domain, count)| {
            state.domain_counts.get(domain).copied().unwrap_or(0) + count > SAME_DOMAIN_LIMIT
        }) || state
            .domain_counts
            .values()
            .any(|count| *count > SAME_DOMAIN_LIMIT);
        if !crowded {
            score += 50;
        }

        Some(score)
    }

    fn best_panel(&self, candidate: &Candidate) -> Option<usize> {
        let mut best: Option<(usize, i64)> = None;
        for panel in 0..self.panels.len() {
            if let Some(score) = self.score(panel, candidate) {
                debug!(panel = panel + 1, score, groups = %candidate.label, "placement score");
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((panel, score));
                }
            }
        }
        best.map(|(panel, _)| panel)
    }

    fn place(&mut self, panel: usize, candidate: Candidate) {
        let state = &mut self.panels[panel];
        state.groups.extend(candidate.groups.iter().copied());
        state.instructors.extend(candidate.supervisors);
        state.total_projects += candidate.projects;
        for (domain, count) in candidate.domains {
            *state.domain_counts.entry(domain).or_insert(0) += count;
        }
        self.diagnostics.successful.push(format!(
            "Placed {} ({} project{}) on panel {}",
            candidate.label,
            candidate.projects,
            if candidate.projects == 1 { "" } else { "s" },
            panel + 1
        ));
    }

    fn try_place(&mut self, groups: &[usize]) -> bool {
        let candidate = self.candidate(groups);
        match self.best_panel(&candidate) {
            Some(panel) => {
                self.place(panel, candidate);
                true
            }
            None => false,
        }
    }

    fn place_group(&mut self, group: usize) {
        let request = self.request;
        if !self.try_place(&[group]) {
            let group = &request.groups[group];
            warn!(group = %group.id, "no panel can host the group");
            self.diagnostics.failed.push(format!(
                "Unable to place {} ({} supervisors): every panel would exceed {} instructors",
                group.id,
                group.supervisors.len(),
                self.max_instructors
            ));
        }
    }

    fn place_clusters(&mut self) {
        let request = self.request;
        let mut clusters: Vec<&Vec<usize>> = request.components.clusters.iter().collect();
        clusters.sort_by_key(|cluster| Reverse(cluster.len()));

        for cluster in clusters {
            if self.try_place(cluster) {
                continue;
            }
            let label = self.candidate(cluster).label;
            warn!(cluster = %label, "overlap cluster does not fit one panel, splitting");
            self.diagnostics.warnings.push(format!(
                "Overlap cluster [{label}] exceeds the instructor limit as a unit; its groups were placed individually"
            ));
            for &group in cluster {
                self.place_group(group);
            }
        }
    }

    fn place_singletons(&mut self) {
        let request = self.request;
        for &group in &request.components.singletons {
            self.place_group(group);
        }
    }

    /// Phase C. Returns every supervisor key seen in placed projects.
    fn seat_supervisors(&mut self, catalog: &HashMap<&str, &Project>) -> BTreeSet<String> {
        let panel_count = self.panels.len();
        let mut counts: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (panel, state) in self.panels.iter().enumerate() {
            for &group in &state.groups {
                for project_id in &self.request.groups[group].projects {
                    if let Some(project) = catalog.get(project_id.as_str()) {
                        for key in project.supervision_keys() {
                            counts.entry(key).or_insert_with(|| vec![0; panel_count])[panel] += 1;
                        }
                    }
                }
            }
        }

        for state in &mut self.panels {
            state.instructors.clear();
        }
        for (key, per_panel) in &counts {
            let mut best = 0;
            for (panel, count) in per_panel.iter().enumerate() {
                if *count > per_panel[best] {
                    best = panel;
                }
            }
            self.panels[best].instructors.insert(key.clone());
        }
        counts.into_keys().collect()
    }

    /// Phase D.
    fn seat_panel_members(&mut self, members: &[&Instructor]) {
        for instructor in members {
            let open = (0..self.panels.len())
                .filter(|&panel| self.panels[panel].instructors.len() < self.max_instructors)
                .min_by_key(|&panel| (self.panels[panel].instructors.len(), panel));
            let panel = match open {
                Some(panel) => panel,
                None => {
                    let Some(panel) = (0..self.panels.len())
                        .min_by_key(|&panel| (self.panels[panel].instructors.len(), panel))
                    else {
                        return;
                    };
                    let message = format!(
                        "excess panel member: {} seated on panel {} beyond the limit of {} instructors",
                        instructor.name,
                        panel + 1,
                        self.max_instructors
                    );
                    warn!("{message}");
                    self.diagnostics.warnings.push(message);
                    panel
                }
            };
            self.panels[panel]
                .instructors
                .insert(instructor.normalized_key.clone());
        }
    }

    /// Phase E.
    fn summarize(&mut self) {
        for (index, state) in self.panels.iter().enumerate() {
            let number = index + 1;
            if state.total_projects * 2 < self.desired_projects {
                self.diagnostics.warnings.push(format!(
                    "Panel {number} is under-utilized: {} of {} desired projects",
                    state.total_projects, self.desired_projects
                ));
            }
            if state.total_projects > self.desired_projects {
                self.diagnostics.constraint_violations.push(format!(
                    "Panel {number} holds {} projects, above the desired {}",
                    state.total_projects, self.desired_projects
                ));
            }
        }

        let spread = |values: Vec<usize>| {
            let high = values.iter().copied().max().unwrap_or(0);
            let low = values.iter().copied().min().unwrap_or(0);
            high - low
        };
        let project_spread = spread(self.panels.iter().map(|p| p.total_projects).collect());
        let instructor_spread =
            spread(self.panels.iter().map(|p| p.instructors.len()).collect());

        self.diagnostics.project_spread = project_spread;
        self.diagnostics.instructor_spread = instructor_spread;
        self.diagnostics.balance_summary.push(format!(
            "Project balance: spread {project_spread} ({})",
            project_balance_band(project_spread)
        ));
        self.diagnostics.balance_summary.push(format!(
            "Instructor balance: spread {instructor_spread} ({})",
            instructor_balance_band(instructor_spread)
        ));
        for (index, state) in self.panels.iter().enumerate() {
            self.diagnostics.balance_summary.push(format!(
                "Panel {}: {} groups, {} projects, {} instructors",
                index + 1,
                state.groups.len(),
                state.total_projects,
                state.instructors.len()
            ));
        }
    }
}

/// Runs phases A through E.
pub fn allocate_panels<'a>(request: &'a AllocationRequest<'a>) -> Result<PanelAllocation<'a>> {
    request.constraints.validate()?;

    let catalog: HashMap<&str, &Project> = request
        .projects
        .iter()
        .map(|project| (project.project_id.as_str(), project))
        .collect();
    for group in request.groups {
        if let Some(missing) = group.projects.iter().find(|id| !catalog.contains_key(id.as_str())) {
            return Err(PlannerError::Invariant(format!(
                "group {} references unknown project {missing}",
                group.id
            )));
        }
    }

    let mut allocator = Allocator::new(request);
    allocator.place_clusters();
    allocator.place_singletons();

    let seated_supervisors = allocator.seat_supervisors(&catalog);

    let mut all_supervisors: BTreeSet<String> = BTreeSet::new();
    let mut names: HashMap<String, String> = HashMap::new();
    for project in request.projects {
        for name in [project.supervisor.as_deref(), project.co_supervisor.as_deref()]
            .into_iter()
            .flatten()
        {
            let instructor = Instructor::new(name);
            if instructor.normalized_key.is_empty() {
                continue;
            }
            all_supervisors.insert(instructor.normalized_key.clone());
            names
                .entry(instructor.normalized_key)
                .or_insert_with(|| canonical_name(name));
        }
    }
    for instructor in request.instructors {
        names.insert(instructor.normalized_key.clone(), instructor.name.clone());
    }

    let mut seen = BTreeSet::new();
    let members: Vec<&Instructor> = request
        .instructors
        .iter()
        .filter(|instructor| !instructor.normalized_key.is_empty())
        .filter(|instructor| !all_supervisors.contains(&instructor.normalized_key))
        .filter(|instructor| seen.insert(instructor.normalized_key.clone()))
        .collect();
    allocator.seat_panel_members(&members);

    for key in all_supervisors.difference(&seated_supervisors) {
        let message = format!(
            "Unassigned instructor: {} has no placed projects",
            names.get(key).map_or(key.as_str(), String::as_str)
        );
        warn!("{message}");
        allocator.diagnostics.warnings.push(message);
    }

    allocator.summarize();

    let max_instructors = allocator.max_instructors;
    let desired_projects = allocator.desired_projects;
    let Allocator {
        panels: states,
        diagnostics,
        ..
    } = allocator;

    let panels: Vec<Panel<'a>> = states
        .into_iter()
        .enumerate()
        .map(|(index, state)| Panel {
            panel_number: index + 1,
            groups: state.groups.iter().map(|&group| &request.groups[group]).collect(),
            constraint_view: ConstraintView {
                max_instructors,
                desired_projects,
                actual_groups: state.groups.len(),
            },
            instructors: state.instructors,
            total_projects: state.total_projects,
        })
        .collect();

    let mut keys: BTreeSet<&String> = all_supervisors.iter().collect();
    keys.extend(members.iter().map(|instructor| &instructor.normalized_key));
    let mut assignments: Vec<InstructorAssignment> = keys
        .into_iter()
        .map(|key| {
            let panel_number = panels
                .iter()
                .find(|panel| panel.instructors.contains(key))
                .map(|panel| panel.panel_number);
            let supervised_projects: Vec<String> = request
                .projects
                .iter()
                .filter(|project| project.supervision_keys().contains(key))
                .map(|project| project.project_id.clone())
                .collect();
            let status = match (panel_number, supervised_projects.is_empty()) {
                (None, _) => InstructorStatus::Unassigned,
                (Some(_), false) => InstructorStatus::Supervisor,
                (Some(_), true) => InstructorStatus::PanelMember,
            };
            InstructorAssignment {
                instructor_name: names.get(key).cloned().unwrap_or_else(|| key.clone()),
                normalized_key: key.clone(),
                panel_number,
                project_count: supervised_projects.len(),
                supervised_projects,
                status,
            }
        })
        .collect();
    assignments.sort_by(|a, b| {
        a.instructor_name
            .cmp(&b.instructor_name)
            .then_with(|| a.normalized_key.cmp(&b.normalized_key))
    });

    info!(
        panels = panels.len(),
        failed = diagnostics.failed.len(),
        warnings = diagnostics.warnings.len(),
        violations = diagnostics.constraint_violations.len(),
        "allocated panels"
    );

    Ok(PanelAllocation {
        panels,
        assignments,
        diagnostics,
    })
}
