//! Idempotent schema creation.
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` rather than a real
//! migration framework — the `schema_version` row in `settings` is the
//! foothold for a future migrator, not a migrator itself.

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    username            TEXT NOT NULL UNIQUE,
    email               TEXT,
    full_name           TEXT,
    hashed_password     TEXT NOT NULL,
    role                TEXT NOT NULL DEFAULT 'viewer',
    must_change_password INTEGER NOT NULL DEFAULT 0,
    is_active           INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schedules (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    cron_expression TEXT NOT NULL,
    network_range   TEXT NOT NULL,
    enabled         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    last_run_at     TEXT,
    next_run_at     TEXT,
    created_by      INTEGER REFERENCES users(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS scans (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    network_range    TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending',
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    completed_at     TEXT,
    updated_at       TEXT NOT NULL,
    progress_percent INTEGER NOT NULL DEFAULT 0,
    progress_message TEXT,
    error_message    TEXT,
    schedule_id      INTEGER REFERENCES schedules(id) ON DELETE SET NULL,
    external_pid     INTEGER
);

CREATE INDEX IF NOT EXISTS idx_scans_status ON scans(status);
CREATE INDEX IF NOT EXISTS idx_scans_created_at ON scans(created_at);

CREATE TABLE IF NOT EXISTS hosts (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id                INTEGER NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    ip                     TEXT NOT NULL,
    hostname               TEXT,
    mac                    TEXT,
    vendor                 TEXT,
    os                     TEXT,
    os_accuracy            INTEGER,
    is_vm                  INTEGER NOT NULL DEFAULT 0,
    vm_type                TEXT,
    uptime_seconds         INTEGER,
    last_boot              TEXT,
    distance               INTEGER,
    cpe                    TEXT,
    scan_status            TEXT NOT NULL DEFAULT 'pending',
    scan_started_at        TEXT,
    scan_completed_at      TEXT,
    scan_progress_percent  INTEGER NOT NULL DEFAULT 0,
    scan_error_message     TEXT,
    ports_discovered       INTEGER NOT NULL DEFAULT 0,
    external_pid           INTEGER
);

CREATE INDEX IF NOT EXISTS idx_hosts_scan_id ON hosts(scan_id);
CREATE INDEX IF NOT EXISTS idx_hosts_ip ON hosts(ip);
CREATE UNIQUE INDEX IF NOT EXISTS idx_hosts_scan_ip ON hosts(scan_id, ip);

CREATE TABLE IF NOT EXISTS ports (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    host_id        INTEGER NOT NULL REFERENCES hosts(id) ON DELETE CASCADE,
    port           INTEGER NOT NULL,
    protocol       TEXT NOT NULL,
    service        TEXT,
    product        TEXT,
    version        TEXT,
    extrainfo      TEXT,
    cpe            TEXT,
    script_output  TEXT
);

CREATE INDEX IF NOT EXISTS idx_ports_host_id ON ports(host_id);
CREATE INDEX IF NOT EXISTS idx_ports_port ON ports(port);

CREATE TABLE IF NOT EXISTS traceroute_hops (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    host_id    INTEGER NOT NULL REFERENCES hosts(id) ON DELETE CASCADE,
    hop_number INTEGER NOT NULL,
    ip         TEXT,
    hostname   TEXT,
    rtt_ms     REAL
);

CREATE INDEX IF NOT EXISTS idx_traceroute_host_id ON traceroute_hops(host_id);

CREATE TABLE IF NOT EXISTS artifacts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id    INTEGER NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    type       TEXT NOT NULL,
    file_path  TEXT NOT NULL,
    file_size  INTEGER
);

CREATE INDEX IF NOT EXISTS idx_artifacts_scan_id ON artifacts(scan_id);

CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
