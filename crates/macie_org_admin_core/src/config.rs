//! File-driven synthesis: one config describes one stack.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::asset::CodeAsset;
use crate::error::{SynthError, SynthResult};
use crate::macie::{AdminAccountConfig, MacieOrganizationAdminAccount};
use crate::registry::DeclarationRegistry;
use crate::stack::{logical_id, Stack, Template};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerAssetConfig {
    pub directory: String,
    #[serde(default)]
    pub source_hash: Option<String>,
}

impl HandlerAssetConfig {
    pub fn resolve(&self) -> SynthResult<CodeAsset> {
        match self.source_hash.as_deref().map(str::trim) {
            Some(hash) if !hash.is_empty() => Ok(CodeAsset::new(self.directory.clone(), hash)),
            _ => Err(SynthError::InvalidConfig(format!(
                "handler asset '{}' has no source_hash; package it first",
                self.directory
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationConfig {
    pub id: String,
    #[serde(flatten)]
    pub account: AdminAccountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthConfig {
    pub stack_name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub asset_bucket: Option<String>,
    pub handler_asset: HandlerAssetConfig,
    pub registrations: Vec<RegistrationConfig>,
}

impl SynthConfig {
    pub fn from_json_str(raw: &str) -> SynthResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| SynthError::InvalidConfig(format!("malformed config: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SynthResult<()> {
        if self.stack_name().is_empty() {
            return Err(SynthError::InvalidConfig(
                "stack_name cannot be empty".to_string(),
            ));
        }
        if self.stack_name().contains(['/', '\\']) {
            return Err(SynthError::InvalidConfig(format!(
                "stack_name '{}' cannot contain path separators",
                self.stack_name()
            )));
        }

        if self.registrations.is_empty() {
            return Err(SynthError::InvalidConfig(
                "at least one registration is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for registration in &self.registrations {
            if !seen.insert(registration.id.as_str()) {
                return Err(SynthError::InvalidConfig(format!(
                    "registration id '{}' is used more than once",
                    registration.id
                )));
            }
        }

        Ok(())
    }

    /// Stack name without surrounding whitespace.
    pub fn stack_name(&self) -> &str {
        self.stack_name.trim()
    }

    pub fn stack(&self) -> Stack {
        let mut stack = Stack::new(self.stack_name());
        if let Some(region) = &self.region {
            stack = stack.with_region(region.clone());
        }
        if let Some(description) = &self.description {
            stack = stack.with_description(description.clone());
        }
        if let Some(bucket) = &self.asset_bucket {
            stack = stack.with_asset_bucket(bucket.clone());
        }
        stack
    }
}

/// Declares every registration in `config` and returns the stack's template.
pub fn synthesize(
    config: &SynthConfig,
    registry: &mut DeclarationRegistry,
) -> SynthResult<Template> {
    config.validate()?;
    let handler_code = config.handler_asset.resolve()?;
    let mut stack = config.stack();

    for registration in &config.registrations {
        let admin_account = MacieOrganizationAdminAccount::new(
            &mut stack,
            registry,
            &registration.id,
            &registration.account,
            &handler_code,
        )?;
        stack.add_output(
            logical_id(&[registration.id.as_str(), "Id"])?,
            admin_account.id().clone(),
            Some(format!(
                "Macie organization admin registration for {}",
                registration.account.admin_account_id
            )),
        )?;
    }

    info!(
        stack = %stack.name(),
        registrations = config.registrations.len(),
        "synthesized stack"
    );
    Ok(stack.template())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_config() -> serde_json::Value {
        json!({
            "stack_name": "macie-admin",
            "region": "us-east-1",
            "handler_asset": { "directory": "handlers/enable", "source_hash": "f00d" },
            "registrations": [{
                "id": "MacieAdmin",
                "admin_account_id": "123456789012",
                "kms_key": { "arn": "arn:aws:kms:us-east-1:111122223333:key/log" },
                "log_retention_in_days": 90
            }]
        })
    }

    #[test]
    fn parses_flattened_registration() {
        let config =
            SynthConfig::from_json_str(&raw_config().to_string()).expect("config should parse");

        assert_eq!(config.registrations[0].account.admin_account_id, "123456789012");
        assert_eq!(config.registrations[0].account.log_retention_in_days, 90);
        assert_eq!(config.asset_bucket, None);
    }

    #[test]
    fn rejects_duplicate_registration_ids() {
        let mut raw = raw_config();
        let first = raw["registrations"][0].clone();
        raw["registrations"]
            .as_array_mut()
            .expect("registrations array")
            .push(first);

        let error = SynthConfig::from_json_str(&raw.to_string()).expect_err("config should fail");
        assert_eq!(
            error.to_string(),
            "invalid synthesis config: registration id 'MacieAdmin' is used more than once"
        );
    }

    #[test]
    fn rejects_stack_names_with_path_separators() {
        for name in ["../escape", "nested/stack", "windows\\stack"] {
            let mut raw = raw_config();
            raw["stack_name"] = json!(name);

            let error =
                SynthConfig::from_json_str(&raw.to_string()).expect_err("config should fail");
            assert!(matches!(error, SynthError::InvalidConfig(_)), "{name}");
        }
    }

    #[test]
    fn stack_name_is_trimmed() {
        let mut raw = raw_config();
        raw["stack_name"] = json!("  macie-admin \n");
        let config = SynthConfig::from_json_str(&raw.to_string()).expect("config should parse");

        assert_eq!(config.stack_name(), "macie-admin");
        assert_eq!(config.stack().name(), "macie-admin");
    }

    #[test]
    fn synthesize_requires_packaged_handler() {
        let mut raw = raw_config();
        raw["handler_asset"] = json!({ "directory": "handlers/enable" });
        let config = SynthConfig::from_json_str(&raw.to_string()).expect("config should parse");

        let mut registry = DeclarationRegistry::default();
        let error = synthesize(&config, &mut registry).expect_err("synthesis should fail");
        assert!(matches!(error, SynthError::InvalidConfig(_)));
    }

    #[test]
    fn synthesize_exposes_registration_output() {
        let config =
            SynthConfig::from_json_str(&raw_config().to_string()).expect("config should parse");
        let mut registry = DeclarationRegistry::default();

        let template = synthesize(&config, &mut registry).expect("synthesis should pass");
        let value = serde_json::to_value(&template).expect("template should serialize");

        assert_eq!(
            value["Outputs"]["MacieAdminId"]["Value"],
            json!({ "Ref": "MacieAdminResource" })
        );
        assert_eq!(
            value["Resources"]["MacieAdminResource"]["Properties"]["region"],
            json!("us-east-1")
        );
    }
}
