use serde::{Deserialize, Serialize};

/// Declares a closed set of wire strings with `as_str`/`parse` helpers.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const WIRE: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                let t = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(t))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(Role {
    Admin => "admin",
    Teacher => "teacher",
    Staff => "staff",
    Student => "student",
});

wire_enum!(UserStatus {
    Active => "active",
    Inactive => "inactive",
    Retired => "retired",
    Transferred => "transferred",
});

wire_enum!(StudentStatus {
    Active => "active",
    Alumnus => "alumnus",
    Transferred => "transferred",
    Left => "left",
    DroppedOut => "dropped_out",
});

wire_enum!(ActiveStatus {
    Active => "active",
    Inactive => "inactive",
});

wire_enum!(Gender {
    Male => "L",
    Female => "P",
});

wire_enum!(
    /// Grade level of a class.
    Level {
        X => "X",
        XI => "XI",
        XII => "XII",
    }
);

wire_enum!(Semester {
    Odd => "odd",
    Even => "even",
});

wire_enum!(SubjectSemester {
    Annual => "annual",
    Odd => "odd",
    Even => "even",
});

wire_enum!(SubjectCategory {
    General => "general",
    Major => "major",
    Specialization => "specialization",
    Extracurricular => "extracurricular",
});

wire_enum!(
    /// Listed in calendar order; `ALL` doubles as the fixed sort table.
    Day {
        Monday => "monday",
        Tuesday => "tuesday",
        Wednesday => "wednesday",
        Thursday => "thursday",
        Friday => "friday",
        Saturday => "saturday",
        Sunday => "sunday",
    }
);

wire_enum!(AttendanceStatus {
    Present => "present",
    Sick => "sick",
    Excused => "excused",
    Absent => "absent",
    Late => "late",
    OnDuty => "on_duty",
    Leave => "leave",
});

wire_enum!(PointKind {
    Violation => "violation",
    Achievement => "achievement",
});

wire_enum!(Severity {
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
});

wire_enum!(YearStatus {
    Active => "active",
    Finished => "finished",
    Upcoming => "upcoming",
});

wire_enum!(TimeSlotKind {
    Normal => "normal",
    Break => "break",
    Ceremony => "ceremony",
    Special => "special",
});

wire_enum!(SettingType {
    Text => "text",
    Number => "number",
    Boolean => "boolean",
    Json => "json",
});

impl Day {
    /// Position in the Monday-first week.
    pub fn ordinal(self) -> usize {
        Day::ALL.iter().position(|d| *d == self).unwrap_or(Day::ALL.len())
    }
}

impl AttendanceStatus {
    /// Statuses that always get a dashboard bucket, in display order.
    pub const CORE: &'static [AttendanceStatus] = &[
        AttendanceStatus::Present,
        AttendanceStatus::Excused,
        AttendanceStatus::Sick,
        AttendanceStatus::Absent,
    ];
}

/// Level tag of a subject: applies to every level or to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTag {
    All,
    Only(Level),
}

impl LevelTag {
    pub const WIRE: &'static [&'static str] = &["all", "X", "XI", "XII"];

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Some(LevelTag::All);
        }
        Level::parse(raw).map(LevelTag::Only)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LevelTag::All => "all",
            LevelTag::Only(l) => l.as_str(),
        }
    }
}

/// Day tag of a time-slot definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTag {
    All,
    Only(Day),
}

impl DayTag {
    pub const WIRE: &'static [&'static str] = &[
        "all", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Some(DayTag::All);
        }
        Day::parse(raw).map(DayTag::Only)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayTag::All => "all",
            DayTag::Only(d) => d.as_str(),
        }
    }
}
