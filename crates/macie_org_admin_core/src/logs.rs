use crate::error::SynthResult;
use crate::intrinsic::{KeyReference, Token};
use crate::stack::{CfnResource, RemovalPolicy, Stack};

pub const LOG_GROUP_RESOURCE_TYPE: &str = "AWS::Logs::LogGroup";

#[derive(Debug, Clone)]
pub struct LogGroupProps {
    pub log_group_name: Token,
    pub retention_in_days: u32,
    pub encryption_key: KeyReference,
    pub removal_policy: RemovalPolicy,
}

/// Log group name Lambda writes to for the given function.
pub fn lambda_log_group_name(function_name: Token) -> Token {
    Token::join("", vec![Token::literal("/aws/lambda/"), function_name])
}

pub fn declare_log_group(
    stack: &mut Stack,
    logical_id: impl Into<String>,
    props: &LogGroupProps,
) -> SynthResult<Token> {
    stack.add_resource(
        CfnResource::new(logical_id, LOG_GROUP_RESOURCE_TYPE)
            .property("LogGroupName", props.log_group_name.clone())
            .property("RetentionInDays", props.retention_in_days)
            .property("KmsKeyId", props.encryption_key.to_token())
            .removal_policy(props.removal_policy),
    )
}
