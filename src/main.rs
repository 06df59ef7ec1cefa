use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgMatches, Command};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use fyp_panel_planner_lib::categorize::DomainCategorizer;
use fyp_panel_planner_lib::helper::HelperCategorizer;
use fyp_panel_planner_lib::report::default_output_dir_name;
use fyp_panel_planner_lib::{
    analyze, roster, spreadsheet, write_outputs, AllocationConstraints, AnalysisConfig,
    AnalysisRequest, CancelToken, PlannerError,
};

fn cli() -> Command {
    Command::new("fyp-panel-planner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("FYP similarity analysis and evaluation panel planner")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("analyze")
                .about("Analyze a project table and allocate evaluation panels")
                .arg(
                    Arg::new("projects")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Project table (.csv, .tsv, .xlsx, .xls)"),
                )
                .arg(
                    Arg::new("roster")
                        .long("roster")
                        .value_parser(value_parser!(PathBuf))
                        .help("Instructor roster text file"),
                )
                .arg(
                    Arg::new("panels")
                        .long("panels")
                        .value_parser(value_parser!(i64))
                        .help("Number of evaluation panels"),
                )
                .arg(
                    Arg::new("max-instructors")
                        .long("max-instructors")
                        .value_parser(value_parser!(i64))
                        .help("Maximum instructors per panel"),
                )
                .arg(
                    Arg::new("projects-per-panel")
                        .long("projects-per-panel")
                        .value_parser(value_parser!(i64))
                        .help("Desired projects per panel"),
                )
                .arg(
                    Arg::new("constraints")
                        .long("constraints")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file with allocation constraints"),
                )
                .arg(
                    Arg::new("similarity-threshold")
                        .long("similarity-threshold")
                        .value_parser(value_parser!(f64))
                        .help("Minimum cosine similarity for a reported pair (default 0.3)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON analysis configuration"),
                )
                .arg(
                    Arg::new("categorizer-cmd")
                        .long("categorizer-cmd")
                        .help("External categorizer helper command"),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for the generated reports"),
                ),
        )
}

fn load_constraints(args: &ArgMatches) -> Result<AllocationConstraints, PlannerError> {
    let mut constraints = match args.get_one::<PathBuf>("constraints") {
        Some(path) => AllocationConstraints::from_json_file(path)?,
        None => AllocationConstraints::default(),
    };
    if let Some(&panels) = args.get_one::<i64>("panels") {
        constraints.number_of_panels = panels;
    }
    if let Some(&max_instructors) = args.get_one::<i64>("max-instructors") {
        constraints.max_instructors_per_panel = max_instructors;
    }
    if let Some(&desired) = args.get_one::<i64>("projects-per-panel") {
        constraints.desired_projects_per_panel = desired;
    }
    constraints.validate()?;
    Ok(constraints)
}

fn spawn_categorizer(command: Option<&str>) -> Option<HelperCategorizer> {
    let command = command?;
    match HelperCategorizer::spawn(command) {
        Ok(helper) => Some(helper),
        Err(err) => {
            warn!("{err}; continuing with keyword categorization");
            None
        }
    }
}

fn run_analyze(args: &ArgMatches) -> Result<bool, PlannerError> {
    let config_path = args.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let mut config = AnalysisConfig::load(config_path)?;
    if let Some(&threshold) = args.get_one::<f64>("similarity-threshold") {
        config.similarity_threshold = threshold;
    }
    if let Some(command) = args.get_one::<String>("categorizer-cmd") {
        config.categorizer.command = Some(command.clone());
    }
    config.validate()?;
    let constraints = load_constraints(args)?;

    let projects_path = args
        .get_one::<PathBuf>("projects")
        .ok_or_else(|| PlannerError::validation("arguments", "missing projects file"))?;
    let projects = spreadsheet::load_projects(projects_path)?;
    let roster = match args.get_one::<PathBuf>("roster") {
        Some(path) => roster::read_roster(path)?,
        None => Vec::new(),
    };

    let mut helper = spawn_categorizer(config.categorizer.command.as_deref());
    let external = helper
        .as_mut()
        .map(|helper| helper as &mut dyn DomainCategorizer);

    let request = AnalysisRequest {
        projects: &projects,
        roster: &roster,
        config: &config,
        constraints: &constraints,
    };
    let report = analyze(&request, external, &CancelToken::new())?;
    drop(helper);

    let output_dir = args
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| Path::new(".").join(default_output_dir_name()));
    let written = write_outputs(&report, &output_dir, &config.output)?;

    println!("{}", report.summary);
    for path in &written {
        println!("Wrote {}", path.display());
    }
    for failure in &report.diagnostics.failed {
        println!("FAILED: {failure}");
    }
    info!(success = report.is_success(), "done");
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_writer(io::stderr).with_env_filter(filter).init();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("analyze", args)) => run_analyze(args),
        _ => Ok(false),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
