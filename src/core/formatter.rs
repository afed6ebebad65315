//! Flattens an enrichment payload into one spreadsheet row.

use crate::domain::model::OutputRow;
use serde_json::Value;

pub const NOT_AVAILABLE: &str = "N/A";
const UNKNOWN_DATE_PART: &str = "??";

/// Column order of every row appended to the output sheet.
pub const COLUMNS: [&str; 23] = [
    "Public Identifier",
    "First Name",
    "Last Name",
    "Headline",
    "Location",
    "Photo URL",
    "Member Since",
    "Followers",
    "Connections",
    "Position History",
    "Skills",
    "Languages",
    "Company",
    "Company Website",
    "Company Description",
    "Company Tagline",
    "Industry",
    "Specialities",
    "Company LinkedIn",
    "Company Universal Name",
    "HQ City",
    "HQ Country",
    "Employee Count",
];

pub fn format_row(data: &Value) -> OutputRow {
    let person = lookup(data, &["person"]);
    let company = lookup(data, &["company"]);

    let history = lookup_in(person, &["positions", "positionHistory"])
        .and_then(Value::as_array)
        .map(|items| format_history(items))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    OutputRow::new(vec![
        scalar(person, &["publicIdentifier"]),
        scalar(person, &["firstName"]),
        scalar(person, &["lastName"]),
        scalar(person, &["headline"]),
        scalar(person, &["location"]),
        scalar(person, &["photoUrl"]),
        scalar(person, &["creationDate", "year"]),
        scalar(person, &["followerCount"]),
        scalar(person, &["connectionCount"]),
        history,
        joined(person, &["skills"]),
        joined(person, &["languages"]),
        scalar(company, &["name"]),
        scalar(company, &["websiteUrl"]),
        scalar(company, &["description"]),
        scalar(company, &["tagline"]),
        scalar(company, &["industry"]),
        joined(company, &["specialities"]),
        scalar(company, &["linkedInUrl"]),
        scalar(company, &["universalName"]),
        scalar(company, &["headquarter", "city"]),
        scalar(company, &["headquarter", "country"]),
        scalar(company, &["employeeCount"]),
    ])
}

/// Renders each position as `"{title} at {company} from {M}/{Y} to {M}/{Y}: {description}"`,
/// one per line. A position without an end date ends at `Present`.
pub fn format_history(items: &[Value]) -> String {
    if items.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    items
        .iter()
        .map(|item| {
            let start = lookup(item, &["startEndDate", "start"]);
            let end = lookup(item, &["startEndDate", "end"]);

            let end_date = match end {
                Some(Value::Object(map)) if !map.is_empty() => month_year(end),
                _ => "Present".to_string(),
            };

            format!(
                "{} at {} from {} to {}: {}",
                scalar(Some(item), &["title"]),
                scalar(Some(item), &["companyName"]),
                month_year(start),
                end_date,
                scalar(Some(item), &["description"]),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn month_year(date: Option<&Value>) -> String {
    let part = |key: &str| {
        lookup_in(date, &[key])
            .map(render)
            .unwrap_or_else(|| UNKNOWN_DATE_PART.to_string())
    };
    format!("{}/{}", part("month"), part("year"))
}

/// Null 視同缺值
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

fn lookup_in<'a>(value: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    value.and_then(|v| lookup(v, path))
}

fn scalar(value: Option<&Value>, path: &[&str]) -> String {
    lookup_in(value, path)
        .map(render)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn joined(value: Option<&Value>, path: &[&str]) -> String {
    match lookup_in(value, path) {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(render)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
