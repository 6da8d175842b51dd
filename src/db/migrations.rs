use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema steps in order: entry `i` upgrades `user_version` `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

pub fn latest_version() -> i32 {
    i32::try_from(MIGRATIONS.len()).unwrap_or(i32::MAX)
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Applies every pending step, each in its own transaction, so a failure
/// leaves the database at the last version that fully applied.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        bail!("database schema v{current} is newer than this build supports (v{latest})");
    }

    let pending = usize::try_from(current).unwrap_or(0);
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(pending) {
        let version = i32::try_from(index + 1).unwrap_or(i32::MAX);
        let tx = conn
            .transaction()
            .context("failed to open migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("schema migration v{version} failed"))?;
        tx.pragma_update(None, "user_version", version)
            .context("failed to update user_version pragma")?;
        tx.commit()
            .with_context(|| format!("failed to commit schema v{version}"))?;
        info!("Attendance schema migrated to v{version}");
    }

    Ok(())
}
