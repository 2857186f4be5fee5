use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "sekolah.sqlite3";

// References between tables are plain ids. Hard deletes leave dependents
// pointing at missing rows and readers render those joins as placeholders.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = OFF", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_identities(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_sessions(
            token TEXT PRIMARY KEY,
            identity_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_auth_sessions_identity ON auth_sessions(identity_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            auth_id TEXT,
            username TEXT NOT NULL,
            full_name TEXT NOT NULL,
            gender TEXT NOT NULL DEFAULT 'L',
            nip TEXT,
            email TEXT,
            role TEXT NOT NULL,
            position TEXT,
            subject_area TEXT,
            birth_place TEXT,
            birth_date TEXT,
            address TEXT,
            phone TEXT,
            photo_url TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_auth ON users(auth_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            level TEXT NOT NULL,
            major TEXT,
            homeroom_teacher_id TEXT,
            capacity INTEGER NOT NULL DEFAULT 30,
            room TEXT,
            academic_year TEXT,
            semester TEXT NOT NULL DEFAULT 'odd',
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            nis TEXT NOT NULL,
            nisn TEXT,
            full_name TEXT NOT NULL,
            gender TEXT NOT NULL DEFAULT 'L',
            birth_place TEXT,
            birth_date TEXT,
            address TEXT,
            phone TEXT,
            email TEXT,
            father_name TEXT,
            mother_name TEXT,
            class_id TEXT,
            photo_url TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            total_achievement_points INTEGER NOT NULL DEFAULT 0,
            total_violation_points INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT,
            name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'general',
            level TEXT NOT NULL DEFAULT 'all',
            major TEXT,
            teacher_id TEXT,
            class_id TEXT,
            semester TEXT NOT NULL DEFAULT 'annual',
            academic_year TEXT,
            weekly_hours INTEGER NOT NULL DEFAULT 2,
            passing_grade INTEGER NOT NULL DEFAULT 75,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_slots(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            day TEXT NOT NULL,
            session INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            room TEXT,
            academic_year TEXT NOT NULL,
            semester TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_schedule_slots_key
         ON schedule_slots(class_id, day, session, academic_year, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            date TEXT NOT NULL,
            session INTEGER NOT NULL,
            status TEXT NOT NULL,
            note TEXT,
            method TEXT NOT NULL DEFAULT 'manual',
            UNIQUE(student_id, subject_id, date, session)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance_records(date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS point_categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            min_points INTEGER NOT NULL DEFAULT 0,
            max_points INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS point_events(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            category_id TEXT,
            category_label TEXT NOT NULL DEFAULT 'general',
            severity TEXT NOT NULL DEFAULT 'minor',
            points INTEGER NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            sanction TEXT,
            location TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_point_events_kind_date ON point_events(kind, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_point_events_student ON point_events(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS time_slots(
            id TEXT PRIMARY KEY,
            session INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            day TEXT NOT NULL DEFAULT 'all',
            kind TEXT NOT NULL DEFAULT 'normal'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_years(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'upcoming',
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id TEXT PRIMARY KEY,
            academic_year TEXT NOT NULL,
            semester TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'upcoming',
            UNIQUE(academic_year, semester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            id TEXT PRIMARY KEY,
            setting_key TEXT NOT NULL UNIQUE,
            setting_value TEXT NOT NULL,
            label TEXT NOT NULL,
            setting_type TEXT NOT NULL DEFAULT 'text',
            description TEXT
        )",
        [],
    )?;
    seed_settings(&conn)?;

    // Older workspaces predate the attendance method column.
    ensure_attendance_method(&conn)?;

    Ok(conn)
}

fn seed_settings(conn: &Connection) -> anyhow::Result<()> {
    let defaults: [(&str, &str, &str, &str, &str); 2] = [
        (
            "school_name",
            "Sekolah",
            "School name",
            "text",
            "Printed in report headers.",
        ),
        (
            "max_violation_points",
            "100",
            "Violation point limit",
            "number",
            "Threshold shown next to student violation totals.",
        ),
    ];
    for (key, value, label, kind, description) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings(id, setting_key, setting_value, label, setting_type, description)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                uuid::Uuid::new_v4().to_string(),
                key,
                value,
                label,
                kind,
                description,
            ),
        )?;
    }
    // Attendance always records session 1; older workspaces carried an editable row for it.
    conn.execute(
        "DELETE FROM settings WHERE setting_key = 'attendance_default_session'",
        [],
    )?;
    Ok(())
}

fn ensure_attendance_method(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance_records", "method")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE attendance_records ADD COLUMN method TEXT NOT NULL DEFAULT 'manual'",
        [],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fixed-width UTC timestamp so stored values order lexically.
pub fn timestamp(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn now_rfc3339() -> String {
    timestamp(chrono::Utc::now())
}
