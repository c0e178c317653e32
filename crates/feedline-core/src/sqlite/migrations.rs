#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_user_records",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS user_records (
    user_id TEXT NOT NULL,
    record_key TEXT NOT NULL,
    value_json TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL,
    PRIMARY KEY (user_id, record_key)
);
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "index_user_records_by_user",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_user_records_user
    ON user_records (user_id, updated_at_unix DESC);
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
