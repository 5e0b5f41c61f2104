//! Lambda-backed providers for custom resources.
//!
//! A provider is a role plus a handler function. Providers are singletons per
//! stack: every custom resource of the same type shares one handler, so
//! [`CustomResourceProvider::get_or_create`] memoizes on the resource type.

use serde_json::json;
use tracing::{debug, info};

use crate::asset::CodeAsset;
use crate::error::SynthResult;
use crate::intrinsic::{Token, AWS_PARTITION};
use crate::policy::{PolicyDocument, PolicyStatement};
use crate::stack::{logical_id, CfnResource, Stack};

pub const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";
pub const FUNCTION_RESOURCE_TYPE: &str = "AWS::Lambda::Function";
pub const HANDLER_ENTRYPOINT: &str = "__entrypoint__.handler";
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 900;
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRuntime {
    Nodejs14x,
}

impl ProviderRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nodejs14x => "nodejs14.x",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomResourceProviderProps {
    pub code: CodeAsset,
    pub runtime: ProviderRuntime,
    pub policy_statements: Vec<PolicyStatement>,
    pub timeout_seconds: u32,
    pub memory_size_mb: u32,
}

impl CustomResourceProviderProps {
    pub fn new(code: CodeAsset, runtime: ProviderRuntime) -> Self {
        Self {
            code,
            runtime,
            policy_statements: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            memory_size_mb: DEFAULT_MEMORY_SIZE_MB,
        }
    }

    pub fn policy_statements(mut self, statements: Vec<PolicyStatement>) -> Self {
        self.policy_statements = statements;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomResourceProvider {
    pub provider_id: String,
    pub role_logical_id: String,
    pub handler_logical_id: String,
}

impl CustomResourceProvider {
    /// Returns the stack's provider for `resource_type`, declaring it on first use.
    ///
    /// `props` are only read on the first call; later calls get the memoized
    /// provider unchanged.
    pub fn get_or_create(
        stack: &mut Stack,
        resource_type: &str,
        props: &CustomResourceProviderProps,
    ) -> SynthResult<Self> {
        if let Some(existing) = stack.providers.get(resource_type) {
            debug!(
                stack = %stack.name(),
                resource_type,
                provider_id = %existing.provider_id,
                "reusing custom resource provider"
            );
            return Ok(existing.clone());
        }

        let provider_id = logical_id(&[resource_type, "CustomResourceProvider"])?;
        let provider = Self {
            role_logical_id: format!("{provider_id}Role"),
            handler_logical_id: format!("{provider_id}Handler"),
            provider_id,
        };

        stack.add_resource(provider.role_resource(props)?)?;
        let handler = provider.handler_resource(stack.asset_bucket(), props);
        stack.add_resource(handler)?;

        info!(
            stack = %stack.name(),
            resource_type,
            handler = %provider.handler_logical_id,
            runtime = props.runtime.as_str(),
            "declared custom resource provider"
        );
        stack
            .providers
            .insert(resource_type.to_string(), provider.clone());
        Ok(provider)
    }

    /// Token the deployment engine uses to invoke the handler.
    pub fn service_token(&self) -> Token {
        Token::get_att(self.handler_logical_id.clone(), "Arn")
    }

    /// Physical function name of the handler, once deployed.
    pub fn handler_name(&self) -> Token {
        Token::reference(self.handler_logical_id.clone())
    }

    fn role_resource(&self, props: &CustomResourceProviderProps) -> SynthResult<CfnResource> {
        let mut role = CfnResource::new(self.role_logical_id.clone(), ROLE_RESOURCE_TYPE)
            .property(
                "AssumeRolePolicyDocument",
                json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" }
                    }]
                }),
            )
            .property(
                "ManagedPolicyArns",
                json!([Token::sub(format!(
                    "arn:${{{AWS_PARTITION}}}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
                ))]),
            );

        if !props.policy_statements.is_empty() {
            let document =
                serde_json::to_value(PolicyDocument::new(props.policy_statements.clone()))?;
            role = role.property(
                "Policies",
                json!([{ "PolicyName": "Inline", "PolicyDocument": document }]),
            );
        }
        Ok(role)
    }

    fn handler_resource(
        &self,
        asset_bucket: &str,
        props: &CustomResourceProviderProps,
    ) -> CfnResource {
        CfnResource::new(self.handler_logical_id.clone(), FUNCTION_RESOURCE_TYPE)
            .property(
                "Code",
                json!({
                    "S3Bucket": Token::sub(asset_bucket),
                    "S3Key": props.code.object_key(),
                }),
            )
            .property("Timeout", props.timeout_seconds)
            .property("MemorySize", props.memory_size_mb)
            .property("Handler", HANDLER_ENTRYPOINT)
            .property("Role", Token::get_att(self.role_logical_id.clone(), "Arn"))
            .property("Runtime", props.runtime.as_str())
            .depends_on(self.role_logical_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> CustomResourceProviderProps {
        CustomResourceProviderProps::new(
            CodeAsset::new("handlers/enable", "abc123"),
            ProviderRuntime::Nodejs14x,
        )
        .policy_statements(vec![PolicyStatement::allow("Describe")
            .actions(["organizations:DescribeOrganization"])
            .resource("*")])
    }

    #[test]
    fn memoizes_provider_per_resource_type() {
        let mut stack = Stack::new("security");
        let first = CustomResourceProvider::get_or_create(&mut stack, "Custom::Thing", &props())
            .expect("provider should be declared");
        let second = CustomResourceProvider::get_or_create(&mut stack, "Custom::Thing", &props())
            .expect("provider should be reused");

        assert_eq!(first, second);
        assert_eq!(stack.resources_of_type(FUNCTION_RESOURCE_TYPE).count(), 1);
        assert_eq!(stack.resources_of_type(ROLE_RESOURCE_TYPE).count(), 1);
        assert_eq!(first.handler_logical_id, "CustomThingCustomResourceProviderHandler");
    }

    #[test]
    fn handler_uses_staged_asset_and_role() {
        let mut stack = Stack::new("security").with_asset_bucket("assets-bucket");
        let provider = CustomResourceProvider::get_or_create(&mut stack, "Custom::Thing", &props())
            .expect("provider should be declared");

        let handler = stack
            .resource(&provider.handler_logical_id)
            .expect("handler exists");
        assert_eq!(
            handler.properties["Code"],
            json!({ "S3Bucket": { "Fn::Sub": "assets-bucket" }, "S3Key": "abc123.zip" })
        );
        assert_eq!(handler.properties["Runtime"], json!("nodejs14.x"));
        assert_eq!(handler.properties["Timeout"], json!(900));
        assert!(handler.depends_on.contains(&provider.role_logical_id));

        let role = stack
            .resource(&provider.role_logical_id)
            .expect("role exists");
        assert_eq!(
            role.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Sid"],
            json!("Describe")
        );
    }
}
