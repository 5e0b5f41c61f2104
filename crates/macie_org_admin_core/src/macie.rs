//! Delegated Macie administrator for an AWS Organization.
//!
//! [`MacieOrganizationAdminAccount`] declares a custom resource whose handler
//! registers the admin account, plus the handler's encrypted log group. The
//! handler is shared across every registration in a stack, so the log group is
//! declared once per deployment unit through the [`DeclarationRegistry`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::asset::CodeAsset;
use crate::error::SynthResult;
use crate::intrinsic::{KeyReference, Token};
use crate::logs::{declare_log_group, lambda_log_group_name, LogGroupProps};
use crate::policy::{PolicyStatement, STRING_LIKE_IF_EXISTS};
use crate::provider::{CustomResourceProvider, CustomResourceProviderProps, ProviderRuntime};
use crate::registry::DeclarationRegistry;
use crate::stack::{logical_id, CfnResource, RemovalPolicy, Stack};

pub const MACIE_RESOURCE_TYPE: &str = "Custom::MacieEnableOrganizationAdminAccount";
pub const MACIE_SERVICE_PRINCIPAL: &str = "macie.amazonaws.com";
pub const HANDLER_RUNTIME: ProviderRuntime = ProviderRuntime::Nodejs14x;

pub const ORGANIZATION_ACTIONS: [&str; 9] = [
    "organizations:DeregisterDelegatedAdministrator",
    "organizations:DescribeOrganization",
    "organizations:EnableAWSServiceAccess",
    "organizations:ListAWSServiceAccessForOrganization",
    "organizations:ListAccounts",
    "organizations:ListDelegatedAdministrators",
    "organizations:RegisterDelegatedAdministrator",
    "organizations:ServicePrincipal",
    "organizations:UpdateOrganizationConfiguration",
];

pub const MACIE_ACTIONS: [&str; 5] = [
    "macie2:DisableOrganizationAdminAccount",
    "macie2:EnableMacie",
    "macie2:EnableOrganizationAdminAccount",
    "macie2:GetMacieSession",
    "macie2:ListOrganizationAdminAccounts",
];

pub const IAM_ACTIONS: [&str; 1] = ["iam:CreateServiceLinkedRole"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminAccountConfig {
    pub admin_account_id: String,
    pub kms_key: KeyReference,
    pub log_retention_in_days: u32,
}

/// Grants for the handler: organizations, macie2, then service-linked role creation.
pub fn permission_policy() -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow("MacieEnableOrganizationAdminAccountTaskOrganizationActions")
            .actions(ORGANIZATION_ACTIONS)
            .resource("*")
            .scoped_to_principal(MACIE_SERVICE_PRINCIPAL),
        PolicyStatement::allow("MacieEnableOrganizationAdminAccountTaskMacieActions")
            .actions(MACIE_ACTIONS)
            .resource("*"),
        PolicyStatement::allow("MacieEnableMacieTaskIamAction")
            .actions(IAM_ACTIONS)
            .resource("*")
            .condition(
                STRING_LIKE_IF_EXISTS,
                "iam:CreateServiceLinkedRole",
                [MACIE_SERVICE_PRINCIPAL],
            ),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacieOrganizationAdminAccount {
    id: Token,
    resource_logical_id: String,
    log_group_logical_id: Option<String>,
}

impl MacieOrganizationAdminAccount {
    pub fn new(
        stack: &mut Stack,
        registry: &mut DeclarationRegistry,
        id: &str,
        config: &AdminAccountConfig,
        handler_code: &CodeAsset,
    ) -> SynthResult<Self> {
        let provider_props =
            CustomResourceProviderProps::new(handler_code.clone(), HANDLER_RUNTIME)
                .policy_statements(permission_policy());
        let provider =
            CustomResourceProvider::get_or_create(stack, MACIE_RESOURCE_TYPE, &provider_props)?;

        let resource_logical_id = logical_id(&[id, "Resource"])?;
        let region = stack.region_token();
        let resource_ref = stack.add_resource(
            CfnResource::new(resource_logical_id.clone(), MACIE_RESOURCE_TYPE)
                .property("ServiceToken", provider.service_token())
                .property("region", region)
                .property("adminAccountId", config.admin_account_id.as_str()),
        )?;
        info!(
            stack = %stack.name(),
            logical_id = %resource_logical_id,
            admin_account_id = %config.admin_account_id,
            "declared macie organization admin account"
        );

        let log_group_logical_id =
            Self::declare_handler_log_group(stack, registry, id, config, &provider)?;
        if let Some(log_group) = &log_group_logical_id {
            stack.add_dependency(&resource_logical_id, log_group)?;
        }

        Ok(Self {
            id: resource_ref,
            resource_logical_id,
            log_group_logical_id,
        })
    }

    /// Reference token of the underlying custom resource.
    pub fn id(&self) -> &Token {
        &self.id
    }

    pub fn resource_logical_id(&self) -> &str {
        &self.resource_logical_id
    }

    /// Set only for the registration that declared the shared log group.
    pub fn log_group_logical_id(&self) -> Option<&str> {
        self.log_group_logical_id.as_deref()
    }

    fn declare_handler_log_group(
        stack: &mut Stack,
        registry: &mut DeclarationRegistry,
        id: &str,
        config: &AdminAccountConfig,
        provider: &CustomResourceProvider,
    ) -> SynthResult<Option<String>> {
        let unit = stack.name().to_string();
        let key = format!("{}/LogGroup", provider.handler_logical_id);
        if registry.is_declared(&unit, &key) {
            debug!(
                stack = %unit,
                handler = %provider.handler_logical_id,
                "handler log group already declared; skipping"
            );
            return Ok(None);
        }

        let log_group_logical_id = logical_id(&[id, "LogGroup"])?;
        declare_log_group(
            stack,
            log_group_logical_id.clone(),
            &LogGroupProps {
                log_group_name: lambda_log_group_name(provider.handler_name()),
                retention_in_days: config.log_retention_in_days,
                encryption_key: config.kms_key.clone(),
                removal_policy: RemovalPolicy::Destroy,
            },
        )?;
        registry.claim(&unit, &key);

        info!(
            stack = %unit,
            logical_id = %log_group_logical_id,
            retention_in_days = config.log_retention_in_days,
            "declared handler log group"
        );
        Ok(Some(log_group_logical_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_policy_has_three_ordered_statements() {
        let statements = permission_policy();
        let sids: Vec<&str> = statements.iter().map(|s| s.sid.as_str()).collect();

        assert_eq!(
            sids,
            vec![
                "MacieEnableOrganizationAdminAccountTaskOrganizationActions",
                "MacieEnableOrganizationAdminAccountTaskMacieActions",
                "MacieEnableMacieTaskIamAction",
            ]
        );
    }

    #[test]
    fn organization_actions_are_scoped_to_macie() {
        let statements = permission_policy();
        let conditions = &statements[0].condition[STRING_LIKE_IF_EXISTS];

        assert_eq!(conditions.len(), ORGANIZATION_ACTIONS.len());
        assert!(conditions
            .values()
            .all(|values| values == &vec![MACIE_SERVICE_PRINCIPAL.to_string()]));
        assert!(statements[1].condition.is_empty());
        assert_eq!(
            statements[2].condition[STRING_LIKE_IF_EXISTS]["iam:CreateServiceLinkedRole"],
            vec![MACIE_SERVICE_PRINCIPAL.to_string()]
        );
    }
}
