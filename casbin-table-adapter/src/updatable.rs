//! In-place rule replacement.
//!
//! `casbin::Adapter` only knows add and remove; updates are exposed through
//! [`UpdatableAdapter`]. Every update runs inside one transaction, so a batch
//! either lands completely or not at all.

use async_trait::async_trait;
use casbin::{Adapter, Result as CasbinResult};
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use crate::adapter::{finish, TableAdapter};
use crate::error::{Result, StoreError};
use crate::query::{self, RuleFilter};

/// Adapter operations replacing stored rules in place
#[async_trait]
pub trait UpdatableAdapter: Adapter {
    /// Replace every row equal to `old_rule` with `new_rule`
    async fn update_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rule: Vec<String>,
        new_rule: Vec<String>,
    ) -> CasbinResult<bool>;

    /// Replace `old_rules[i]` with `new_rules[i]` for every pair
    async fn update_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Vec<String>>,
        new_rules: Vec<Vec<String>>,
    ) -> CasbinResult<bool>;

    /// Swap the rules matching the filter band for `new_rules`, returning the
    /// rules that were replaced
    async fn update_filtered_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        new_rules: Vec<Vec<String>>,
        field_index: usize,
        field_values: Vec<String>,
    ) -> CasbinResult<Vec<Vec<String>>>;
}

impl TableAdapter {
    /// Update the rows whose full value tuple equals `old_rule`
    #[tracing::instrument(skip(self, old_rule, new_rule), fields(table = %self.table_name))]
    pub async fn replace_rule(
        &self,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> Result<u64> {
        let pairs = [(old_rule.to_vec(), new_rule.to_vec())];
        let mut tx = self.pool.begin().await?;
        let outcome = self.update_each(&mut tx, ptype, &pairs).await;
        finish(tx, outcome).await
    }

    /// Apply pairwise updates in one transaction; lengths must match
    #[tracing::instrument(
        skip(self, old_rules, new_rules),
        fields(table = %self.table_name, count = old_rules.len())
    )]
    pub async fn replace_rules(
        &self,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> Result<u64> {
        if old_rules.len() != new_rules.len() {
            return Err(StoreError::RuleCountMismatch {
                old: old_rules.len(),
                new: new_rules.len(),
            });
        }
        let pairs: Vec<(Vec<String>, Vec<String>)> = old_rules
            .iter()
            .cloned()
            .zip(new_rules.iter().cloned())
            .collect();

        let mut tx = self.pool.begin().await?;
        let outcome = self.update_each(&mut tx, ptype, &pairs).await;
        finish(tx, outcome).await
    }

    /// Delete the rows matching the filter band and insert `new_rules`, all in
    /// one transaction. Returns the deleted rules in storage order.
    #[tracing::instrument(
        skip(self, new_rules, field_values),
        fields(table = %self.table_name, count = new_rules.len())
    )]
    pub async fn replace_filtered(
        &self,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> Result<Vec<Vec<String>>> {
        let filter = RuleFilter::band(ptype, field_index, field_values, self.fields.width());
        let mut tx = self.pool.begin().await?;
        let outcome = self.swap_filtered(&mut tx, &filter, ptype, new_rules).await;
        finish(tx, outcome).await
    }

    async fn update_each(
        &self,
        conn: &mut SqliteConnection,
        ptype: &str,
        pairs: &[(Vec<String>, Vec<String>)],
    ) -> Result<u64> {
        let width = self.fields.width();
        let mut updated = 0;
        for (old_rule, new_rule) in pairs {
            let filter = RuleFilter::full(ptype, old_rule, width);
            let row = self.to_rows(ptype, std::slice::from_ref(new_rule)).remove(0);
            let mut qb = query::update_rows(&self.table_name, &self.fields, &filter, &row);
            let affected = qb.build().execute(&mut *conn).await?.rows_affected();
            debug!(
                "Updating {}: [{}] -> [{}] matched {} rows",
                ptype,
                old_rule.join(", "),
                new_rule.join(", "),
                affected
            );
            updated += affected;
        }
        Ok(updated)
    }

    async fn swap_filtered(
        &self,
        conn: &mut SqliteConnection,
        filter: &RuleFilter,
        ptype: &str,
        new_rules: &[Vec<String>],
    ) -> Result<Vec<Vec<String>>> {
        let mut qb = query::select_rows(&self.table_name, &self.fields, Some(filter));
        let old_rules = qb
            .build()
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| query::decode_row(row, self.fields.width()).map(|r| r.rule()))
            .collect::<Result<Vec<_>>>()?;

        let mut qb = query::delete_rows(&self.table_name, &self.fields, Some(filter));
        let deleted = qb.build().execute(&mut *conn).await?.rows_affected();

        let rows = self.to_rows(ptype, new_rules);
        let inserted = self.insert_each(conn, &rows).await?;
        debug!(
            "Replaced {} filtered {} rules with {} new rules",
            deleted, ptype, inserted
        );
        Ok(old_rules)
    }
}

#[async_trait]
impl UpdatableAdapter for TableAdapter {
    async fn update_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        old_rule: Vec<String>,
        new_rule: Vec<String>,
    ) -> CasbinResult<bool> {
        self.replace_rule(ptype, &old_rule, &new_rule).await?;
        Ok(true)
    }

    async fn update_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        old_rules: Vec<Vec<String>>,
        new_rules: Vec<Vec<String>>,
    ) -> CasbinResult<bool> {
        self.replace_rules(ptype, &old_rules, &new_rules).await?;
        Ok(true)
    }

    async fn update_filtered_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        new_rules: Vec<Vec<String>>,
        field_index: usize,
        field_values: Vec<String>,
    ) -> CasbinResult<Vec<Vec<String>>> {
        Ok(self
            .replace_filtered(ptype, &new_rules, field_index, &field_values)
            .await?)
    }
}
