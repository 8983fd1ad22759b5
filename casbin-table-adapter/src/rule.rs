//! Rule rows and the comma-joined line format the policy model is fed with.
//!
//! A line looks like `p, alice, /data, GET`: the rule type followed by the
//! positional values with trailing empty values dropped. Values are not
//! escaped, so a value containing a comma is split into two fields when the
//! line is parsed again.

use casbin::Model;
use tracing::debug;

/// One stored rule: the rule type plus a fixed number of positional values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    pub ptype: String,
    pub values: Vec<String>,
}

impl RuleRow {
    /// Build a row payload of exactly `width` values.
    ///
    /// Values beyond `width` are dropped, missing values become empty strings.
    pub fn from_rule(ptype: &str, rule: &[String], width: usize) -> Self {
        let mut values: Vec<String> = rule.iter().take(width).cloned().collect();
        values.resize(width, String::new());
        Self {
            ptype: ptype.to_string(),
            values,
        }
    }

    /// Values with trailing empty strings removed
    pub fn rule(&self) -> Vec<String> {
        let len = self
            .values
            .iter()
            .rposition(|v| !v.is_empty())
            .map_or(0, |i| i + 1);
        self.values[..len].to_vec()
    }

    /// Encode the row as a policy line, e.g. `p, alice, /data, GET`
    pub fn to_line(&self) -> String {
        std::iter::once(self.ptype.clone())
            .chain(self.rule())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse a policy line and insert it into the model.
///
/// The section is the first character of the rule type (`p` or `g`). Returns
/// whether the model accepted the rule; unknown rule types, blank lines and
/// `#` comments are skipped.
pub fn load_policy_line(line: &str, model: &mut dyn Model) -> bool {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return false;
    }

    let mut tokens = line.split(',').map(|t| t.trim().to_string());
    let Some(ptype) = tokens.next() else {
        return false;
    };
    let Some(sec) = ptype.get(..1) else {
        return false;
    };
    let rule: Vec<String> = tokens.collect();

    let has_ptype = model
        .get_model()
        .get(sec)
        .map(|ast_map| ast_map.contains_key(&ptype))
        .unwrap_or(false);
    if !has_ptype {
        debug!("Skipping policy line with unknown rule type: {}", line);
        return false;
    }

    model.add_policy(sec, &ptype, rule)
}
