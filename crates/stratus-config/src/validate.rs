//! Rule-expression parsing and field validation shared by the store and the
//! functional modules.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{FileRule, FileStoreConfig};

/// Backing store kinds accepted by the file-store module.
pub(crate) const KNOWN_STORE_TYPES: &[&str] = &["local", "amazon-s3", "gcp-storage"];

/// Parsed form of an access-rule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Grant unconditionally.
    Allow,
    /// Reject unconditionally.
    Deny,
    /// Grant to any caller carrying a valid project token.
    Authenticated,
    /// Grant when a token claim matches a literal (`match:<claim>==<value>`).
    Match {
        /// Token claim inspected at evaluation time.
        claim: String,
        /// Literal the claim must equal.
        value: String,
    },
}

/// Parse a rule expression string.
///
/// # Errors
///
/// Returns `InvalidField` when the expression is not one of the supported
/// forms.
pub fn parse_rule_expr(expr: &str) -> ConfigResult<RuleKind> {
    match expr.trim() {
        "allow" => Ok(RuleKind::Allow),
        "deny" => Ok(RuleKind::Deny),
        "authenticated" => Ok(RuleKind::Authenticated),
        other => {
            if let Some(body) = other.strip_prefix("match:")
                && let Some((claim, value)) = body.split_once("==")
                && !claim.trim().is_empty()
                && !value.trim().is_empty()
            {
                return Ok(RuleKind::Match {
                    claim: claim.trim().to_string(),
                    value: value.trim().to_string(),
                });
            }
            Err(ConfigError::InvalidField {
                section: "rule",
                field: "expression".to_string(),
                value: Some(other.to_string()),
                reason: "unsupported rule expression",
            })
        }
    }
}

/// Validate a single file rule.
///
/// # Errors
///
/// Returns `InvalidField` when the name is empty, the prefix is not absolute,
/// or the rule expression does not parse.
pub fn validate_file_rule(rule: &FileRule) -> ConfigResult<()> {
    if rule.name.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "file_store",
            field: "rule.name".to_string(),
            value: None,
            reason: "rule name must not be empty",
        });
    }
    if !rule.prefix.starts_with('/') {
        return Err(ConfigError::InvalidField {
            section: "file_store",
            field: format!("rule.{}.prefix", rule.name),
            value: Some(rule.prefix.clone()),
            reason: "prefix must start with '/'",
        });
    }
    parse_rule_expr(&rule.rule)?;
    Ok(())
}

/// Validate a whole file-store configuration, including rule uniqueness.
///
/// # Errors
///
/// Returns `InvalidField` on an unknown store type, a duplicate rule name, or
/// any invalid rule.
pub fn validate_file_store(config: &FileStoreConfig) -> ConfigResult<()> {
    if config.enabled && !KNOWN_STORE_TYPES.contains(&config.store_type.as_str()) {
        return Err(ConfigError::InvalidField {
            section: "file_store",
            field: "storeType".to_string(),
            value: Some(config.store_type.clone()),
            reason: "unknown store type",
        });
    }
    for (index, rule) in config.rules.iter().enumerate() {
        validate_file_rule(rule)?;
        if config.rules[..index].iter().any(|r| r.name == rule.name) {
            return Err(ConfigError::InvalidField {
                section: "file_store",
                field: format!("rule.{}", rule.name),
                value: None,
                reason: "duplicate rule name",
            });
        }
    }
    Ok(())
}

/// Validate project identity fields.
///
/// # Errors
///
/// Returns `InvalidField` when the project id is empty.
pub(crate) fn validate_project_id(project_id: &str) -> ConfigResult<()> {
    if project_id.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "project",
            field: "id".to_string(),
            value: None,
            reason: "project id must not be empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileOpKind;

    #[test]
    fn rule_expressions_parse() {
        assert_eq!(parse_rule_expr("allow").unwrap(), RuleKind::Allow);
        assert_eq!(parse_rule_expr(" deny ").unwrap(), RuleKind::Deny);
        assert_eq!(
            parse_rule_expr("authenticated").unwrap(),
            RuleKind::Authenticated
        );
        assert_eq!(
            parse_rule_expr("match:role==admin").unwrap(),
            RuleKind::Match {
                claim: "role".to_string(),
                value: "admin".to_string()
            }
        );
        assert!(parse_rule_expr("grant-everything").is_err());
        assert!(parse_rule_expr("match:role==").is_err());
    }

    #[test]
    fn file_rule_validation_rejects_bad_prefix_and_expression() {
        let good = FileRule {
            name: "public-read".to_string(),
            prefix: "/public/*".to_string(),
            rule: "allow".to_string(),
            operations: vec![FileOpKind::Read],
        };
        assert!(validate_file_rule(&good).is_ok());

        let bad_prefix = FileRule {
            prefix: "public".to_string(),
            ..good.clone()
        };
        assert!(validate_file_rule(&bad_prefix).is_err());

        let bad_rule = FileRule {
            rule: "sometimes".to_string(),
            ..good
        };
        assert!(validate_file_rule(&bad_rule).is_err());
    }

    #[test]
    fn file_store_validation_rejects_duplicates_and_unknown_types() {
        let rule = |name: &str| FileRule {
            name: name.to_string(),
            prefix: "/".to_string(),
            rule: "allow".to_string(),
            operations: Vec::new(),
        };

        let mut config = FileStoreConfig {
            enabled: true,
            store_type: "local".to_string(),
            conn: "/tmp/files".to_string(),
            bucket: None,
            rules: vec![rule("a"), rule("b")],
        };
        assert!(validate_file_store(&config).is_ok());

        config.rules.push(rule("a"));
        assert!(validate_file_store(&config).is_err());

        config.rules.pop();
        config.store_type = "ftp".to_string();
        assert!(validate_file_store(&config).is_err());
    }
}
