use async_trait::async_trait;
use casbin::{Adapter, Filter, Model, Result as CasbinResult};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fields::{check_identifier, FieldNames, FieldNamesOverride, DEFAULT_TABLE_NAME};
use crate::query::{self, RuleFilter};
use crate::rule::{load_policy_line, RuleRow};

/// Optional overrides applied on top of the adapter defaults
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub table_name: Option<String>,
    pub field_names: FieldNamesOverride,
}

/// Casbin adapter persisting rules in a single table.
///
/// The table is the only source of truth; nothing is cached. Cloning is cheap
/// and every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct TableAdapter {
    pub(crate) pool: SqlitePool,
    pub(crate) table_name: String,
    pub(crate) fields: FieldNames,
    is_filtered: bool,
}

impl TableAdapter {
    /// Adapter on the default `casbin_rule` table with default column names
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            fields: FieldNames::default(),
            is_filtered: false,
        }
    }

    /// Adapter on a custom table with default column names
    pub fn with_table_name(pool: SqlitePool, table_name: &str) -> Result<Self> {
        Self::with_options(
            pool,
            AdapterOptions {
                table_name: Some(table_name.to_string()),
                ..Default::default()
            },
        )
    }

    /// Adapter with custom table and column names, validated up front
    pub fn with_options(pool: SqlitePool, options: AdapterOptions) -> Result<Self> {
        let table_name = match options.table_name {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_TABLE_NAME.to_string(),
        };
        check_identifier(&table_name)?;
        let fields = FieldNames::merge(&options.field_names)?;

        Ok(Self {
            pool,
            table_name,
            fields,
            is_filtered: false,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.fields
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying pool and wait for its connections to shut down.
    /// Other clones of this adapter become unusable as well.
    pub async fn close(self) {
        debug!("Closing policy table adapter for {}", self.table_name);
        self.pool.close().await;
    }

    /// Read every stored rule in storage order
    #[tracing::instrument(skip(self), fields(table = %self.table_name))]
    pub async fn load_rules(&self) -> Result<Vec<RuleRow>> {
        let mut qb = query::select_rows(&self.table_name, &self.fields, None);
        let rows = qb.build().fetch_all(&self.pool).await?;
        let rules = rows
            .iter()
            .map(|row| query::decode_row(row, self.fields.width()))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} policy rules", rules.len());
        Ok(rules)
    }

    /// Read the rules matching a casbin load filter
    #[tracing::instrument(skip(self, filter), fields(table = %self.table_name))]
    pub async fn load_filtered_rules(&self, filter: &Filter<'_>) -> Result<Vec<RuleRow>> {
        let mut qb = query::select_filtered_rows(&self.table_name, &self.fields, filter);
        let rows = qb.build().fetch_all(&self.pool).await?;
        let rules = rows
            .iter()
            .map(|row| query::decode_row(row, self.fields.width()))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} filtered policy rules", rules.len());
        Ok(rules)
    }

    /// Insert rules of one rule type in a single transaction
    #[tracing::instrument(skip(self, rules), fields(table = %self.table_name, count = rules.len()))]
    pub async fn insert_rules(&self, ptype: &str, rules: &[Vec<String>]) -> Result<u64> {
        let rows = self.to_rows(ptype, rules);
        self.insert_rows(&rows).await
    }

    /// Insert every `p` and `g` rule of the model. The table is not cleared first.
    #[tracing::instrument(skip(self, model), fields(table = %self.table_name))]
    pub async fn save_model(&self, model: &dyn Model) -> Result<u64> {
        let rows = self.rows_from_model(model);
        let inserted = self.insert_rows(&rows).await?;
        info!("Saved {} policy rules", inserted);
        Ok(inserted)
    }

    /// Delete rules matching on ptype and every supplied value, all or nothing
    #[tracing::instrument(skip(self, rules), fields(table = %self.table_name, count = rules.len()))]
    pub async fn delete_rules(&self, ptype: &str, rules: &[Vec<String>]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.delete_each(&mut tx, ptype, rules).await;
        finish(tx, outcome).await
    }

    /// Delete rules whose values in the band starting at `field_index` match
    #[tracing::instrument(skip(self, field_values), fields(table = %self.table_name))]
    pub async fn delete_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<u64> {
        let filter = RuleFilter::band(ptype, field_index, field_values, self.fields.width());
        let mut qb = query::delete_rows(&self.table_name, &self.fields, Some(&filter));
        let deleted = qb.build().execute(&self.pool).await?.rows_affected();
        debug!("Removed {} filtered {} rules", deleted, ptype);
        Ok(deleted)
    }

    /// Delete every row of the table
    #[tracing::instrument(skip(self), fields(table = %self.table_name))]
    pub async fn clear(&self) -> Result<u64> {
        let mut qb = query::delete_rows(&self.table_name, &self.fields, None);
        let deleted = qb.build().execute(&self.pool).await?.rows_affected();
        info!("Cleared {} policy rules", deleted);
        Ok(deleted)
    }

    pub(crate) fn to_rows(&self, ptype: &str, rules: &[Vec<String>]) -> Vec<RuleRow> {
        let width = self.fields.width();
        rules
            .iter()
            .map(|rule| {
                if rule.len() > width {
                    debug!(
                        "Dropping {} values beyond column {} of {} rule",
                        rule.len() - width,
                        width,
                        ptype
                    );
                }
                RuleRow::from_rule(ptype, rule, width)
            })
            .collect()
    }

    fn rows_from_model(&self, model: &dyn Model) -> Vec<RuleRow> {
        let mut rows = Vec::new();
        for sec in ["p", "g"] {
            let Some(ast_map) = model.get_model().get(sec) else {
                continue;
            };
            let mut ptypes: Vec<&String> = ast_map.keys().collect();
            ptypes.sort();
            for ptype in ptypes {
                let rules: Vec<Vec<String>> = ast_map[ptype].get_policy().iter().cloned().collect();
                rows.extend(self.to_rows(ptype, &rules));
            }
        }
        rows
    }

    async fn insert_rows(&self, rows: &[RuleRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let outcome = self.insert_each(&mut tx, rows).await;
        finish(tx, outcome).await
    }

    pub(crate) async fn insert_each(&self, conn: &mut SqliteConnection, rows: &[RuleRow]) -> Result<u64> {
        let mut inserted = 0;
        for chunk in rows.chunks(query::max_rows_per_insert(&self.fields)) {
            let mut qb = query::insert_rows(&self.table_name, &self.fields, chunk);
            inserted += qb.build().execute(&mut *conn).await?.rows_affected();
        }
        debug!("Inserted {} rows", inserted);
        Ok(inserted)
    }

    async fn delete_each(
        &self,
        conn: &mut SqliteConnection,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<u64> {
        let mut deleted = 0;
        for rule in rules {
            let filter = RuleFilter::supplied(ptype, rule, self.fields.width());
            let mut qb = query::delete_rows(&self.table_name, &self.fields, Some(&filter));
            let affected = qb.build().execute(&mut *conn).await?.rows_affected();
            debug!("Removing {}: [{}] matched {} rows", ptype, rule.join(", "), affected);
            deleted += affected;
        }
        Ok(deleted)
    }
}

/// Commit on success, roll back on failure and hand the original error back
pub(crate) async fn finish<T>(tx: Transaction<'_, Sqlite>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after error '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

#[async_trait]
impl Adapter for TableAdapter {
    async fn load_policy(&mut self, m: &mut dyn Model) -> CasbinResult<()> {
        for row in self.load_rules().await? {
            load_policy_line(&row.to_line(), m);
        }
        self.is_filtered = false;
        Ok(())
    }

    async fn load_filtered_policy<'a>(&mut self, m: &mut dyn Model, f: Filter<'a>) -> CasbinResult<()> {
        for row in self.load_filtered_rules(&f).await? {
            load_policy_line(&row.to_line(), m);
        }
        self.is_filtered = true;
        Ok(())
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> CasbinResult<()> {
        self.save_model(&*m).await?;
        Ok(())
    }

    async fn clear_policy(&mut self) -> CasbinResult<()> {
        self.clear().await?;
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    async fn add_policy(&mut self, _sec: &str, ptype: &str, rule: Vec<String>) -> CasbinResult<bool> {
        self.insert_rules(ptype, &[rule]).await?;
        Ok(true)
    }

    async fn add_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> CasbinResult<bool> {
        self.insert_rules(ptype, &rules).await?;
        Ok(true)
    }

    async fn remove_policy(&mut self, _sec: &str, ptype: &str, rule: Vec<String>) -> CasbinResult<bool> {
        self.delete_rules(ptype, &[rule]).await?;
        Ok(true)
    }

    async fn remove_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> CasbinResult<bool> {
        self.delete_rules(ptype, &rules).await?;
        Ok(true)
    }

    async fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> CasbinResult<bool> {
        self.delete_filtered(ptype, field_index, &field_values).await?;
        Ok(true)
    }
}
