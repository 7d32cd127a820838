use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_price_history",
        sql: r#"
CREATE TABLE IF NOT EXISTS price_history (
    pair TEXT NOT NULL,
    price DOUBLE NOT NULL CHECK (price >= 0),
    timestamp TIMESTAMPTZ NOT NULL
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_price_history_pair_ts ON price_history(pair, timestamp);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}

/// Versions recorded in `schema_migrations`, oldest first.
pub fn applied_versions(connection: &Connection) -> Result<Vec<String>, ::duckdb::Error> {
    let mut statement =
        connection.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}
