//! SQL schema for the SQLite result store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL plus classification seed rows; idempotent thanks to
/// `IF NOT EXISTS` and `INSERT OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS activity_class (
    id          INTEGER NOT NULL PRIMARY KEY,
    name        TEXT    NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS material_class (
    id          INTEGER NOT NULL PRIMARY KEY,
    name        TEXT    NOT NULL,
    description TEXT
);

-- Ids are allocated as max(id) + 1 inside the writing transaction.
CREATE TABLE IF NOT EXISTS activity (
    id             INTEGER NOT NULL PRIMARY KEY,
    class_id       INTEGER NOT NULL REFERENCES activity_class(id),
    recorded_at    TEXT    NOT NULL,   -- RFC 3339 UTC; server-assigned
    image_path     TEXT    NOT NULL,   -- basename under the images root
    is_complete    BOOLEAN,
    confidence     REAL,
    result_payload TEXT    NOT NULL,   -- metadata message, verbatim
    duration_ms    INTEGER,
    username       TEXT
);

CREATE TABLE IF NOT EXISTS activity_material (
    id                INTEGER NOT NULL PRIMARY KEY,
    activity_id       INTEGER NOT NULL REFERENCES activity(id),
    material_class_id INTEGER NOT NULL REFERENCES material_class(id),
    coordinates       TEXT    NOT NULL,
    confidence        REAL
);

CREATE TABLE IF NOT EXISTS app_user (
    id            INTEGER NOT NULL PRIMARY KEY,
    name          TEXT    NOT NULL UNIQUE,
    email         TEXT    NOT NULL UNIQUE,
    password_hash TEXT    NOT NULL    -- argon2 PHC string
);

CREATE INDEX IF NOT EXISTS activity_material_activity_idx ON activity_material(activity_id);
CREATE INDEX IF NOT EXISTS activity_recorded_idx          ON activity(recorded_at);

INSERT OR IGNORE INTO activity_class (id, name, description)
    VALUES (0, 'screenshot', 'Frame captured from a video stream');
INSERT OR IGNORE INTO material_class (id, name, description)
    VALUES (0, 'module', 'SIM900 module');
INSERT OR IGNORE INTO material_class (id, name, description)
    VALUES (1, 'antenna', 'SIM900 module antenna');

PRAGMA user_version = 1;
";
