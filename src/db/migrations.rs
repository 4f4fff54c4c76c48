use rusqlite::Connection;

use crate::error::SiteopsError;

pub fn run_migrations(conn: &Connection) -> Result<(), SiteopsError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'on_hold', 'completed', 'cancelled')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            title TEXT NOT NULL DEFAULT '',
            description TEXT,
            status TEXT NOT NULL DEFAULT 'planned'
                CHECK (status IN ('planned', 'assigned', 'in_progress', 'completed',
                                  'partial', 'failed', 'blocked', 'cancelled')),
            planned_start TEXT,
            planned_end TEXT,
            actual_start TEXT,
            actual_end TEXT,
            assigned_employee_id TEXT REFERENCES employees(id) ON DELETE SET NULL,
            integrity_score REAL NOT NULL DEFAULT 100.0,
            integrity_flags TEXT NOT NULL DEFAULT '[]',
            gps_lat REAL,
            gps_lng REAL,
            location_name TEXT,
            location_type TEXT,
            expected_outcome TEXT,
            workaround_used INTEGER NOT NULL DEFAULT 0,
            deviation_notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS task_dependencies (
            id TEXT PRIMARY KEY,
            predecessor_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            successor_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            dependency_type TEXT NOT NULL DEFAULT 'finish_to_start',
            is_critical INTEGER NOT NULL DEFAULT 0,
            is_hard INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'satisfied', 'violated')),
            risk_weight REAL NOT NULL DEFAULT 1.0,
            current_risk_level TEXT NOT NULL DEFAULT 'low'
                CHECK (current_risk_level IN ('low', 'medium', 'high', 'critical')),
            satisfied_at TEXT,
            violated_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (predecessor_id, successor_id),
            CHECK (predecessor_id != successor_id)
        );

        CREATE TABLE IF NOT EXISTS task_evidence (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            evidence_type TEXT NOT NULL
                CHECK (evidence_type IN ('photo', 'note', 'measurement')),
            file_path TEXT,
            note_text TEXT,
            measurement_value REAL,
            gps_lat REAL,
            gps_lng REAL,
            is_validated INTEGER NOT NULL DEFAULT 0,
            captured_offline INTEGER NOT NULL DEFAULT 0,
            captured_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS task_materials (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            material_name TEXT NOT NULL,
            unit TEXT,
            planned_quantity REAL NOT NULL DEFAULT 0,
            actual_quantity REAL,
            is_substitute INTEGER NOT NULL DEFAULT 0,
            substitute_notes TEXT,
            deviation_notes TEXT
        );

        CREATE TABLE IF NOT EXISTS task_events (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            job_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{\"kind\":\"empty\"}',
            occurred_at TEXT NOT NULL DEFAULT (datetime('now')),
            source TEXT NOT NULL DEFAULT 'system',
            ai_processed INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS ai_alerts (
            id TEXT PRIMARY KEY,
            alert_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            job_id TEXT,
            subject_id TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            period TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (alert_type, subject_id, period)
        );

        CREATE TABLE IF NOT EXISTS daily_briefings (
            briefing_date TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_job_status ON tasks(job_id, status);
        CREATE INDEX IF NOT EXISTS idx_tasks_employee ON tasks(assigned_employee_id);
        CREATE INDEX IF NOT EXISTS idx_deps_pred ON task_dependencies(predecessor_id);
        CREATE INDEX IF NOT EXISTS idx_deps_succ ON task_dependencies(successor_id);
        CREATE INDEX IF NOT EXISTS idx_evidence_task ON task_evidence(task_id);
        CREATE INDEX IF NOT EXISTS idx_materials_task ON task_materials(task_id);
        CREATE INDEX IF NOT EXISTS idx_events_job_time ON task_events(job_id, occurred_at);
        CREATE INDEX IF NOT EXISTS idx_events_task ON task_events(task_id);
        ",
    )?;
    Ok(())
}
