use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Default table holding the policy rules
pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

/// Default column holding the rule type
pub const DEFAULT_PTYPE_COLUMN: &str = "ptype";

/// Minimum number of value columns a mapping must provide
pub const MIN_VALUE_COLUMNS: usize = 6;

/// Physical column names used for the rule type and the positional values.
///
/// Instances are always validated: every name is a plain SQL identifier and
/// there are at least [`MIN_VALUE_COLUMNS`] value columns. Fields are
/// readable from outside the crate but can only be changed through
/// [`FieldNames::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[readonly::make]
pub struct FieldNames {
    pub ptype: String,
    pub values: Vec<String>,
}

/// Partial override of the default field names, as read from settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FieldNamesOverride {
    #[serde(default)]
    pub ptype: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            ptype: DEFAULT_PTYPE_COLUMN.to_string(),
            values: (0..MIN_VALUE_COLUMNS).map(default_value_column).collect(),
        }
    }
}

impl FieldNames {
    /// Merge an override into the defaults.
    ///
    /// `ptype` replaces the default when non-empty. A value list replaces the
    /// defaults as a whole, with empty entries falling back to `v{i}`; it must
    /// hold at least [`MIN_VALUE_COLUMNS`] entries.
    pub fn merge(overrides: &FieldNamesOverride) -> Result<Self> {
        let mut names = Self::default();

        match overrides.ptype.as_deref() {
            Some("") => warn!(
                "Empty rule type column configured, falling back to '{}'",
                DEFAULT_PTYPE_COLUMN
            ),
            Some(ptype) => names.ptype = ptype.to_string(),
            None => {}
        }

        if let Some(values) = &overrides.values {
            if values.len() < MIN_VALUE_COLUMNS {
                return Err(StoreError::TooFewValueColumns {
                    got: values.len(),
                    min: MIN_VALUE_COLUMNS,
                });
            }
            names.values = values
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    if name.is_empty() {
                        let fallback = default_value_column(i);
                        warn!(
                            "Empty value column name at position {}, falling back to '{}'",
                            i, fallback
                        );
                        fallback
                    } else {
                        name.clone()
                    }
                })
                .collect();
        }

        names.validate()?;
        debug!(
            "Using field names: ptype={}, values=[{}]",
            names.ptype,
            names.values.join(", ")
        );
        Ok(names)
    }

    /// Number of value columns (the maximum rule width)
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// All writable columns in row order: ptype first, then the values
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.ptype.as_str()).chain(self.values.iter().map(String::as_str))
    }

    fn validate(&self) -> Result<()> {
        for column in self.columns() {
            check_identifier(column)?;
        }
        Ok(())
    }
}

fn default_value_column(index: usize) -> String {
    format!("v{index}")
}

/// Reject anything that is not a plain `[A-Za-z_][A-Za-z0-9_]*` identifier
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote a validated identifier for use in generated SQL
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}
