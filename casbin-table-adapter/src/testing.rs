use casbin::DefaultModel;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::fields::FieldNames;

pub const RBAC_MODEL: &str = r#"
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

/// In-memory database; one connection so every query sees the same data
pub async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

pub async fn create_rule_table(pool: &SqlitePool, table: &str, fields: &FieldNames) {
    let value_columns: String = fields
        .values
        .iter()
        .map(|column| format!(", \"{column}\" VARCHAR(255) DEFAULT ''"))
        .collect();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,
            \"{}\" VARCHAR(255) NOT NULL DEFAULT ''{value_columns}
        )",
        fields.ptype
    );
    sqlx::query(&sql).execute(pool).await.unwrap();
}

pub async fn rbac_model() -> DefaultModel {
    DefaultModel::from_str(RBAC_MODEL).await.unwrap()
}
