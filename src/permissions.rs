use crate::model::Role;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NavEntry {
    Dashboard,
    Users,
    Students,
    Classes,
    Subjects,
    Schedule,
    Attendance,
    Points,
    Settings,
}

impl NavEntry {
    pub fn as_str(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "dashboard",
            NavEntry::Users => "users",
            NavEntry::Students => "students",
            NavEntry::Classes => "classes",
            NavEntry::Subjects => "subjects",
            NavEntry::Schedule => "schedule",
            NavEntry::Attendance => "attendance",
            NavEntry::Points => "points",
            NavEntry::Settings => "settings",
        }
    }
}

use NavEntry::*;

const ADMIN: &[NavEntry] = &[
    Dashboard, Users, Students, Classes, Subjects, Schedule, Attendance, Points, Settings,
];
const TEACHER: &[NavEntry] = &[Dashboard, Attendance, Points];
const STAFF: &[NavEntry] = &[Dashboard, Students, Classes, Subjects, Schedule];
const STUDENT: &[NavEntry] = &[];

pub fn allowed_entries(role: Role) -> &'static [NavEntry] {
    match role {
        Role::Admin => ADMIN,
        Role::Teacher => TEACHER,
        Role::Staff => STAFF,
        Role::Student => STUDENT,
    }
}

pub fn allows(role: Role, entry: NavEntry) -> bool {
    allowed_entries(role).contains(&entry)
}

/// Screen a method belongs to. `None` means any signed-in role may call it.
pub fn entry_for_method(method: &str) -> Option<NavEntry> {
    let family = method.split('.').next().unwrap_or(method);
    match family {
        "dashboard" => Some(Dashboard),
        "users" => Some(Users),
        "students" => Some(Students),
        "classes" => Some(Classes),
        "subjects" => Some(Subjects),
        "schedule" => Some(Schedule),
        "attendance" => Some(Attendance),
        "points" => Some(Points),
        "settings" | "academicYears" | "semesters" | "timeSlots" | "pointCategories" => {
            match method {
                "pointCategories.list" => Some(Points),
                _ => Some(Settings),
            }
        }
        "reports" => match method {
            "reports.students" => Some(Students),
            "reports.users" => Some(Users),
            "reports.schedule" => Some(Schedule),
            "reports.violations" => Some(Points),
            _ => Some(Dashboard),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_sidebar() {
        assert!(allows(Role::Admin, Settings));
        assert!(allows(Role::Teacher, Attendance));
        assert!(!allows(Role::Teacher, Students));
        assert!(allows(Role::Staff, Schedule));
        assert!(!allows(Role::Staff, Points));
        assert!(!allows(Role::Student, Dashboard));
    }

    #[test]
    fn methods_map_to_screens() {
        assert_eq!(entry_for_method("schedule.save"), Some(Schedule));
        assert_eq!(entry_for_method("timeSlots.add"), Some(Settings));
        assert_eq!(entry_for_method("pointCategories.list"), Some(Points));
        assert_eq!(entry_for_method("reports.violations"), Some(Points));
        assert_eq!(entry_for_method("lookup.teachers"), None);
        assert_eq!(entry_for_method("objects.upload"), None);
    }
}
