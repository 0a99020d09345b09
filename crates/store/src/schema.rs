//! Schema migrations, tracked with `PRAGMA user_version`.

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Lectures and enrollments are mirrored from the scheduling subsystem.
const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS lectures (
    id          INTEGER PRIMARY KEY,
    section_id  INTEGER NOT NULL,
    starts_at   TEXT    NOT NULL,
    ends_at     TEXT    NOT NULL,
    status      TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_lectures_ends_at ON lectures (ends_at);

CREATE TABLE IF NOT EXISTS enrollments (
    section_id  INTEGER NOT NULL,
    student_id  INTEGER NOT NULL,
    PRIMARY KEY (section_id, student_id)
);
";

/// Heartbeat and attendance ledgers.
const SCHEMA_V2: &str = "
CREATE TABLE IF NOT EXISTS heartbeats (
    lecture_id    INTEGER NOT NULL REFERENCES lectures (id),
    student_id    INTEGER NOT NULL,
    joined_at     TEXT    NOT NULL,
    last_seen_at  TEXT    NOT NULL,
    PRIMARY KEY (lecture_id, student_id)
);

CREATE TABLE IF NOT EXISTS attendance_records (
    lecture_id        INTEGER NOT NULL REFERENCES lectures (id),
    student_id        INTEGER NOT NULL,
    status            TEXT    NOT NULL
                      CHECK (status IN ('present', 'late', 'left', 'absent')),
    checked_in_at     TEXT,
    last_seen_at      TEXT,
    minutes_attended  INTEGER CHECK (minutes_attended >= 0),
    PRIMARY KEY (lecture_id, student_id)
);
";

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    let sql = match version {
        1 => SCHEMA_V1,
        2 => SCHEMA_V2,
        other => bail!("no migration defined for version {other}"),
    };
    tx.execute_batch(sql)
        .with_context(|| format!("failed to execute schema v{version}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_rejects_newer_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        assert!(run_migrations(&mut conn).is_err());
    }
}
