//! Project-table ingestion from delimited text or Excel workbooks.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader};
use tracing::{info, warn};

use crate::error::{PlannerError, Result};
use crate::model::Project;

const PROJECT_ID_ALIASES: &[&str] = &["project_id", "Short_Title", "Project Short Title"];
const TITLE_ALIASES: &[&str] = &["title", "Project Title"];
const SCOPE_ALIASES: &[&str] = &["scope", "Project Scope"];
const SUPERVISOR_ALIASES: &[&str] = &["supervisor", "Supervisor"];
const CO_SUPERVISOR_ALIASES: &[&str] = &["co_supervisor", "Co-Supervisor", "Co Supervisor"];

/// A non-blank data row with its 1-based position in the file (header = row 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub row_number: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

pub fn read_spreadsheet(path: &Path) -> Result<Sheet> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut sheet = if matches!(extension.as_str(), "xlsx" | "xlsm" | "xls" | "xlsb") {
        read_excel_spreadsheet(path)?
    } else {
        read_delimited_spreadsheet(path)?
    };
    align_row_lengths(&mut sheet);
    Ok(sheet)
}

/// An input table that cannot be read is an input-validation failure.
fn unreadable(path: &Path, err: impl std::fmt::Display) -> PlannerError {
    PlannerError::validation(
        format!("project table {}", path.display()),
        format!("Unable to read the spreadsheet: {err}"),
    )
}

fn record_context(err: &csv::Error, last_row: usize) -> String {
    match err.position() {
        Some(position) => format!("record {} (line {})", position.record(), position.line()),
        None => format!("record after line {last_row}"),
    }
}

fn read_delimited_spreadsheet(path: &Path) -> Result<Sheet> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| unreadable(path, err))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| {
            PlannerError::validation(
                "project table header",
                format!("Unable to read spreadsheet headers: {err}"),
            )
        })?
        .iter()
        .map(|value| value.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    let mut last_row = 1;
    for record in reader.records() {
        let record = record.map_err(|err| {
            PlannerError::validation(
                record_context(&err, last_row),
                format!("Unable to read spreadsheet row: {err}"),
            )
        })?;
        let row_number = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(last_row + 1);
        last_row = row_number;
        let values: Vec<String> = record
            .iter()
            .map(|value| value.trim().to_string())
            .collect();
        if values.iter().all(|value| value.is_empty()) {
            continue;
        }
        rows.push(SheetRow { row_number, values });
    }

    Ok(Sheet { headers, rows })
}

fn read_excel_spreadsheet(path: &Path) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path).map_err(|err| unreadable(path, err))?;

    let sheet_name = workbook.sheet_names().first().cloned().ok_or_else(|| {
        unreadable(path, "the workbook does not contain any worksheets")
    })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| unreadable(path, format!("no worksheet named '{sheet_name}'")))?
        .map_err(|err| unreadable(path, err))?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or_else(|| {
        PlannerError::validation(
            "project table header",
            format!("worksheet '{sheet_name}' is empty and has no header row"),
        )
    })?;

    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
    let mut rows = Vec::new();
    for (offset, row) in rows_iter.enumerate() {
        let values: Vec<String> = row.iter().map(cell_to_string).collect();
        if values.iter().all(|value| value.is_empty()) {
            continue;
        }
        rows.push(SheetRow {
            row_number: offset + 2,
            values,
        });
    }

    Ok(Sheet { headers, rows })
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string().trim().to_string(),
    }
}

fn align_row_lengths(sheet: &mut Sheet) {
    let column_count = sheet
        .rows
        .iter()
        .map(|row| row.values.len())
        .chain(std::iter::once(sheet.headers.len()))
        .max()
        .unwrap_or(0);

    if sheet.headers.len() < column_count {
        sheet.headers.resize(column_count, String::new());
    }
    for row in sheet.rows.iter_mut() {
        row.values.resize(column_count, String::new());
    }
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).map_err(|err| unreadable(path, err))?;
    let mut reader = BufReader::new(file);
    let mut buffer = String::new();

    for _ in 0..5 {
        buffer.clear();
        let bytes_read = reader
            .read_line(&mut buffer)
            .map_err(|err| unreadable(path, err))?;
        if bytes_read == 0 {
            break;
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let counts = [
            (b'\t', buffer.matches('\t').count()),
            (b',', buffer.matches(',').count()),
            (b';', buffer.matches(';').count()),
        ];

        // max_by_key keeps the last maximum; prefer tab then comma on ties.
        if let Some((delimiter, count)) = counts
            .iter()
            .rev()
            .max_by_key(|(_, count)| *count)
        {
            if *count > 0 {
                return Ok(*delimiter);
            }
        }
    }

    Ok(b',')
}

fn normalize_header_label(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn build_header_index_map(headers: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let key = normalize_header_label(header);
        if !key.is_empty() {
            map.entry(key).or_insert(index);
        }
    }
    map
}

fn column_for(map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| map.get(&normalize_header_label(alias)).copied())
}

fn optional_cell(values: &[String], column: Option<usize>) -> Option<String> {
    column
        .and_then(|index| values.get(index))
        .filter(|value| !value.is_empty())
        .cloned()
}

/// Turns a parsed sheet into projects, synthesizing missing ids as
/// `Project_<n>` where `n` is the 1-based data-row index.
pub fn projects_from_sheet(sheet: &Sheet) -> Result<Vec<Project>> {
    let map = build_header_index_map(&sheet.headers);
    let title_column = column_for(&map, TITLE_ALIASES).ok_or_else(|| {
        PlannerError::validation(
            "project table header",
            format!("missing required title column (one of {})", TITLE_ALIASES.join(", ")),
        )
    })?;
    let id_column = column_for(&map, PROJECT_ID_ALIASES);
    let scope_column = column_for(&map, SCOPE_ALIASES);
    let supervisor_column = column_for(&map, SUPERVISOR_ALIASES);
    let co_supervisor_column = column_for(&map, CO_SUPERVISOR_ALIASES);

    if scope_column.is_none() {
        warn!("Project table has no scope column; scopes will be empty");
    }

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut projects = Vec::with_capacity(sheet.rows.len());
    for (index, row) in sheet.rows.iter().enumerate() {
        let project_id = optional_cell(&row.values, id_column)
            .unwrap_or_else(|| format!("Project_{}", index + 1));
        if let Some(previous) = first_seen.insert(project_id.clone(), row.row_number) {
            return Err(PlannerError::validation(
                format!("row {}", row.row_number),
                format!("duplicate project_id '{project_id}' (first seen on row {previous})"),
            ));
        }

        let mut project = Project::new(
            project_id,
            optional_cell(&row.values, Some(title_column)).unwrap_or_default(),
        )
        .with_scope(optional_cell(&row.values, scope_column).unwrap_or_default());
        project.supervisor = optional_cell(&row.values, supervisor_column);
        project.co_supervisor = optional_cell(&row.values, co_supervisor_column);
        projects.push(project);
    }

    Ok(projects)
}

pub fn load_projects(path: &Path) -> Result<Vec<Project>> {
    let sheet = read_spreadsheet(path)?;
    let projects = projects_from_sheet(&sheet)?;
    info!(path = %path.display(), projects = projects.len(), "loaded project table");
    Ok(projects)
}
