//! 表结构：导入审计、任务队列，以及导入报告和维护任务用到的学生数据表

pub const STATEMENTS: &[&str] = &[
    // 导入运行审计记录，只追加、永不删除
    r#"
    CREATE TABLE IF NOT EXISTS import_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        options TEXT NOT NULL,
        phase TEXT NOT NULL DEFAULT 'INIT',
        started_at DATETIME NOT NULL,
        ended_at DATETIME,
        log TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS import_run_timings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL,
        importer TEXT NOT NULL,
        source TEXT NOT NULL,
        started_at DATETIME NOT NULL,
        ended_at DATETIME NOT NULL,
        outcome TEXT NOT NULL,
        FOREIGN KEY (run_id) REFERENCES import_runs(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS import_jobs (
        id TEXT PRIMARY KEY,
        options TEXT NOT NULL,
        attempt INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'PENDING',
        enqueued_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schools (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        local_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        school_type TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS educators (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        local_id TEXT NOT NULL UNIQUE,
        email TEXT,
        full_name TEXT,
        school_local_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS homerooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        school_local_id TEXT,
        educator_id INTEGER,
        FOREIGN KEY (educator_id) REFERENCES educators(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        local_id TEXT NOT NULL UNIQUE,
        first_name TEXT,
        last_name TEXT,
        grade TEXT,
        school_local_id TEXT,
        homeroom_id INTEGER,
        most_recent_assessment_id INTEGER,
        FOREIGN KEY (homeroom_id) REFERENCES homerooms(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_number TEXT NOT NULL,
        course_description TEXT,
        school_local_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        section_number TEXT NOT NULL,
        term_local_id TEXT,
        course_id INTEGER NOT NULL,
        FOREIGN KEY (course_id) REFERENCES courses(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_section_assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        section_id INTEGER NOT NULL,
        grade_numeric REAL,
        UNIQUE (student_id, section_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS educator_section_assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        educator_id INTEGER NOT NULL,
        section_id INTEGER NOT NULL,
        UNIQUE (educator_id, section_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_assessments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        assessment_family TEXT NOT NULL,
        assessment_subject TEXT,
        scale_score INTEGER,
        percentile_rank INTEGER,
        date_taken DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS discipline_incidents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        incident_code TEXT,
        occurred_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS absences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        occurred_at DATETIME NOT NULL,
        UNIQUE (student_id, occurred_at)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tardies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        occurred_at DATETIME NOT NULL,
        UNIQUE (student_id, occurred_at)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_risk_levels (
        student_id INTEGER PRIMARY KEY,
        level INTEGER,
        updated_at DATETIME NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_import_runs_started_at ON import_runs(started_at)",
    "CREATE INDEX IF NOT EXISTS idx_import_run_timings_run_id ON import_run_timings(run_id)",
    "CREATE INDEX IF NOT EXISTS idx_import_jobs_status ON import_jobs(status, enqueued_at)",
    "CREATE INDEX IF NOT EXISTS idx_student_assessments_student_id ON student_assessments(student_id, date_taken)",
    "CREATE INDEX IF NOT EXISTS idx_students_homeroom_id ON students(homeroom_id)",
];
