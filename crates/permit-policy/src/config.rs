//! Settings file loading.
//!
//! ```toml
//! [engine]
//! elevated_roles = ["admin", "controller"]
//!
//! [ladder]
//! mgmt_group_id = "mgmt"
//! exec_group_id = "exec"
//! skip_under = 50000.0
//! exec_threshold = 100000.0
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::Path;

use tracing::debug;

use permit_contracts::{
    config::PermitConfig,
    error::{PermitError, PermitResult},
};

/// Parse `s` as a TOML settings document.
///
/// Returns `PermitError::ConfigError` if the TOML is malformed or the ladder
/// thresholds are not finite and ordered.
pub fn load_config_str(s: &str) -> PermitResult<PermitConfig> {
    let config: PermitConfig = toml::from_str(s).map_err(|e| PermitError::ConfigError {
        reason: format!("failed to parse settings TOML: {}", e),
    })?;

    let ladder = &config.ladder;
    if !ladder.skip_under.is_finite() || !ladder.exec_threshold.is_finite() {
        return Err(PermitError::ConfigError {
            reason: "ladder thresholds must be finite".to_string(),
        });
    }
    if ladder.skip_under > ladder.exec_threshold {
        return Err(PermitError::ConfigError {
            reason: format!(
                "ladder skip_under ({}) exceeds exec_threshold ({})",
                ladder.skip_under, ladder.exec_threshold
            ),
        });
    }

    debug!(
        elevated_roles = ?config.engine.elevated_roles,
        mgmt_group_id = %config.ladder.mgmt_group_id,
        exec_group_id = %config.ladder.exec_group_id,
        "settings loaded"
    );
    Ok(config)
}

/// Read the file at `path` and parse it as a settings document.
pub fn load_config_file(path: &Path) -> PermitResult<PermitConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| PermitError::ConfigError {
        reason: format!("failed to read settings file '{}': {}", path.display(), e),
    })?;
    load_config_str(&contents)
}

#[cfg(test)]
mod tests {
    use permit_contracts::{config::PermitConfig, error::PermitError};

    use super::load_config_str;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(load_config_str("").unwrap(), PermitConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = load_config_str(
            r#"
            [engine]
            elevated_roles = ["controller"]

            [ladder]
            exec_group_id = "board"
        "#,
        )
        .unwrap();

        assert_eq!(config.engine.elevated_roles, vec!["controller"]);
        assert!(config.engine.ack_target_tables.iter().any(|t| t == "invoices"));
        assert_eq!(config.ladder.exec_group_id, "board");
        assert_eq!(config.ladder.mgmt_group_id, "mgmt");
        assert_eq!(config.ladder.skip_under, 50_000.0);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let result = load_config_str(
            r#"
            [ladder]
            skip_under = 200000.0
            exec_threshold = 100000.0
        "#,
        );
        match result {
            Err(PermitError::ConfigError { reason }) => assert!(reason.contains("skip_under")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            load_config_str("[engine"),
            Err(PermitError::ConfigError { .. })
        ));
    }
}
