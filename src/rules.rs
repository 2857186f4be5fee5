//! Consistency rules shared by the attendance, schedule and points screens.

use crate::model::{AttendanceStatus, Day, Level, LevelTag};
use std::collections::HashMap;

/// The one session attendance is recorded against.
pub const ATTENDANCE_SESSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct ClassRef<'a> {
    pub id: &'a str,
    pub level: Level,
}

#[derive(Debug, Clone)]
pub struct SubjectRef<'a> {
    pub id: &'a str,
    pub class_id: Option<&'a str>,
    pub level: LevelTag,
}

/// A subject applies to a class when it is bound to that class, or when it
/// is unbound and tagged for every level or for the class's level.
pub fn subject_applies_to_class(subject: &SubjectRef<'_>, class: &ClassRef<'_>) -> bool {
    match subject.class_id {
        Some(bound) => bound == class.id,
        None => match subject.level {
            LevelTag::All => true,
            LevelTag::Only(level) => level == class.level,
        },
    }
}

pub fn applicable_subjects<'s, 'a>(
    subjects: &'s [SubjectRef<'a>],
    class: &ClassRef<'_>,
) -> Vec<&'s SubjectRef<'a>> {
    subjects
        .iter()
        .filter(|s| subject_applies_to_class(s, class))
        .collect()
}

/// Uniqueness key of a schedule slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub class_id: String,
    pub day: Day,
    pub session: i64,
    pub academic_year: String,
    pub semester: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConflict {
    pub existing_id: String,
}

/// Decides whether writing a slot with `key` is allowed given the slots that
/// already hold that key. `editing` is the id of the slot being updated.
pub fn check_slot_conflict<'a, I>(existing: I, editing: Option<&str>) -> Result<(), SlotConflict>
where
    I: IntoIterator<Item = &'a str>,
{
    for id in existing {
        if Some(id) != editing {
            return Err(SlotConflict {
                existing_id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Sorts by calendar day (Monday first), then by session. Unknown day
/// values sort after Sunday.
pub fn sort_by_day_then_session<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (Option<Day>, i64),
{
    items.sort_by_key(|item| {
        let (day, session) = key(item);
        (day.map(Day::ordinal).unwrap_or(Day::ALL.len()), session)
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// Pairs every roster student with their recorded status, defaulting to
/// present. Records for students outside the roster are ignored.
pub fn roster_with_defaults(
    roster: &[String],
    existing: &HashMap<String, AttendanceStatus>,
) -> Vec<RosterEntry> {
    roster
        .iter()
        .map(|sid| RosterEntry {
            student_id: sid.clone(),
            status: existing
                .get(sid)
                .copied()
                .unwrap_or(AttendanceStatus::Present),
        })
        .collect()
}

/// Validates submitted statuses against the roster before anything is
/// written. Unknown status strings fail the whole save.
pub fn resolve_submitted_statuses(
    roster: &[String],
    submitted: &HashMap<String, String>,
) -> Result<Vec<RosterEntry>, String> {
    let mut parsed: HashMap<String, AttendanceStatus> = HashMap::new();
    for (sid, raw) in submitted {
        let status = AttendanceStatus::parse(raw)
            .ok_or_else(|| format!("unknown attendance status {raw:?} for student {sid}"))?;
        parsed.insert(sid.clone(), status);
    }
    Ok(roster_with_defaults(roster, &parsed))
}

/// Class code derived from level and name, e.g. `X-IPA1`.
pub fn class_code(level: Level, name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    format!("{}-{}", level.as_str(), compact)
}

/// Point value for a new event: the entered value wins, otherwise the
/// category minimum is suggested.
pub fn resolve_point_value(entered: Option<i64>, category_min: Option<i64>) -> Option<i64> {
    entered.or(category_min)
}
