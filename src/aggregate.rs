use crate::model::AttendanceStatus;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

pub const PLACEHOLDER: &str = "-";
pub const NO_DATA_BUCKET: &str = "no_data";
pub const TREND_MONTHS: usize = 6;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub month: String,
    pub label: String,
    pub points: i64,
}

/// Student count per class. Every class gets a bucket, including empty
/// ones; students pointing at unknown classes are not counted.
pub fn class_distribution<'a>(
    classes: &[(&'a str, &'a str)],
    student_class_ids: impl IntoIterator<Item = Option<&'a str>>,
) -> Vec<Bucket> {
    let mut counts: HashMap<&str, i64> = classes.iter().map(|(id, _)| (*id, 0)).collect();
    for cid in student_class_ids.into_iter().flatten() {
        if let Some(n) = counts.get_mut(cid) {
            *n += 1;
        }
    }
    classes
        .iter()
        .map(|(id, name)| Bucket {
            name: (*name).to_string(),
            value: counts.get(id).copied().unwrap_or(0),
        })
        .collect()
}

/// Attendance breakdown for one day. Core statuses always appear; extended
/// statuses only when used. No records at all yields a single placeholder.
pub fn attendance_breakdown<I>(statuses: I) -> Vec<Bucket>
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut counts: HashMap<AttendanceStatus, i64> = HashMap::new();
    let mut total = 0;
    for s in statuses {
        *counts.entry(s).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return vec![Bucket {
            name: NO_DATA_BUCKET.to_string(),
            value: 1,
        }];
    }
    let extended = AttendanceStatus::ALL
        .iter()
        .filter(|s| !AttendanceStatus::CORE.contains(s) && counts.contains_key(*s));
    AttendanceStatus::CORE
        .iter()
        .chain(extended)
        .map(|s| Bucket {
            name: s.as_str().to_string(),
            value: counts.get(s).copied().unwrap_or(0),
        })
        .collect()
}

/// First day of the month `back` months before the month of `date`.
fn month_start(date: NaiveDate, back: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 - back as i32;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

/// Earliest date that can land in the trend window ending at `today`.
pub fn trend_window_start(today: NaiveDate) -> NaiveDate {
    month_start(today, TREND_MONTHS as u32 - 1)
}

/// Trailing six calendar months ending with the month of `today`, oldest
/// first. Events outside the window are ignored.
pub fn monthly_points_trend<I>(today: NaiveDate, events: I) -> Vec<MonthBucket>
where
    I: IntoIterator<Item = (NaiveDate, i64)>,
{
    let mut buckets: Vec<MonthBucket> = (0..TREND_MONTHS as u32)
        .rev()
        .map(|back| {
            let start = month_start(today, back);
            MonthBucket {
                month: start.format("%Y-%m").to_string(),
                label: MONTH_LABELS[start.month0() as usize].to_string(),
                points: 0,
            }
        })
        .collect();
    for (date, points) in events {
        let key = date.format("%Y-%m").to_string();
        if let Some(b) = buckets.iter_mut().find(|b| b.month == key) {
            b.points += points;
        }
    }
    buckets
}

/// Tabular report ready for a document renderer.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new(title: &str, columns: &[&str]) -> Self {
        let mut cols = vec!["No".to_string()];
        cols.extend(columns.iter().map(|c| c.to_string()));
        Self {
            title: title.to_string(),
            columns: cols,
            rows: Vec::new(),
        }
    }

    /// Appends a numbered row; empty or missing cells become the placeholder.
    pub fn push(&mut self, cells: Vec<Option<String>>) {
        let mut row = vec![(self.rows.len() + 1).to_string()];
        row.extend(cells.into_iter().map(cell));
        self.rows.push(row);
    }
}

pub fn cell(v: Option<String>) -> String {
    match v {
        Some(s) if !s.trim().is_empty() => s,
        _ => PLACEHOLDER.to_string(),
    }
}

/// Resolves a reference through an id→label map, falling back to the
/// placeholder for unset or dangling references.
pub fn join_label(labels: &HashMap<String, String>, id: Option<&str>) -> String {
    id.and_then(|id| labels.get(id))
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}
