#![allow(dead_code)]

use casbin::DefaultModel;
use casbin_table_adapter::TableAdapter;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

pub const ACTION_GET: &str = "(GET)";
pub const ACTION_POST: &str = "(POST)";
pub const ACTION_ALL: &str = "(GET)|(POST)|(PUT)|(DELETE)|(PATCH)|(OPTIONS)|(HEAD)";
pub const ADMIN_NAME: &str = "admin";
pub const NORMAL_NAME: &str = "hailaz";

const RBAC_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && keyMatch(r.obj, p.obj) && regexMatch(r.act, p.act)
"#;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub async fn rbac_model() -> DefaultModel {
    DefaultModel::from_str(RBAC_MODEL)
        .await
        .expect("Failed to parse RBAC model")
}

pub async fn create_test_adapter(table: &str) -> TableAdapter {
    init_logging();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    create_rule_table(&pool, table).await;
    TableAdapter::with_table_name(pool, table).expect("Invalid table name")
}

pub async fn create_rule_table(pool: &SqlitePool, table: &str) {
    let sql = format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ptype VARCHAR(255) NOT NULL DEFAULT '',
            v0 VARCHAR(255) NOT NULL DEFAULT '',
            v1 VARCHAR(255) NOT NULL DEFAULT '',
            v2 VARCHAR(255) NOT NULL DEFAULT '',
            v3 VARCHAR(255) NOT NULL DEFAULT '',
            v4 VARCHAR(255) NOT NULL DEFAULT '',
            v5 VARCHAR(255) NOT NULL DEFAULT ''
        )"#
    );
    sqlx::query(&sql)
        .execute(pool)
        .await
        .expect("Failed to create rule table");
}

pub fn rule(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
