//! CloudFormation intrinsic values.
//!
//! A [`Token`] stands in for a value the deployment engine resolves later
//! (a resource's physical id, an attribute, the deploying region). Tokens
//! serialize to the intrinsic-function JSON CloudFormation expects and render
//! as stable opaque strings through `Display`.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

pub const AWS_REGION: &str = "AWS::Region";
pub const AWS_ACCOUNT_ID: &str = "AWS::AccountId";
pub const AWS_PARTITION: &str = "AWS::Partition";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Ref(String),
    GetAtt {
        logical_id: String,
        attribute: String,
    },
    Join {
        delimiter: String,
        parts: Vec<Token>,
    },
    Sub(String),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn join(delimiter: impl Into<String>, parts: Vec<Token>) -> Self {
        Self::Join {
            delimiter: delimiter.into(),
            parts,
        }
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Self::Sub(template.into())
    }

    pub fn region() -> Self {
        Self::reference(AWS_REGION)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(value) => Value::String(value.clone()),
            Self::Ref(logical_id) => json!({ "Ref": logical_id }),
            Self::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Self::Join { delimiter, parts } => {
                let parts: Vec<Value> = parts.iter().map(Token::to_value).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Self::Sub(template) => json!({ "Fn::Sub": template }),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<Token> for Value {
    fn from(token: Token) -> Self {
        token.to_value()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Ref(logical_id) => write!(f, "${{Token[Ref.{logical_id}]}}"),
            Self::GetAtt {
                logical_id,
                attribute,
            } => write!(f, "${{Token[{logical_id}.{attribute}]}}"),
            Self::Join { delimiter, parts } => {
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        f.write_str(delimiter)?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Self::Sub(template) => write!(f, "${{Token[Sub.{template}]}}"),
        }
    }
}

/// Encryption key handed to a log group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyReference {
    /// Key ARN known up front.
    Arn(String),
    /// Logical id of a key declared in the same stack.
    StackKey(String),
}

impl KeyReference {
    pub fn to_token(&self) -> Token {
        match self {
            Self::Arn(arn) => Token::literal(arn.clone()),
            Self::StackKey(logical_id) => Token::get_att(logical_id.clone(), "Arn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_intrinsics_as_cloudformation_json() {
        let name = Token::join(
            "",
            vec![Token::literal("/aws/lambda/"), Token::reference("Handler")],
        );

        assert_eq!(
            serde_json::to_value(&name).expect("token should serialize"),
            json!({ "Fn::Join": ["", ["/aws/lambda/", { "Ref": "Handler" }]] })
        );
        assert_eq!(
            Token::get_att("Handler", "Arn").to_value(),
            json!({ "Fn::GetAtt": ["Handler", "Arn"] })
        );
    }

    #[test]
    fn display_is_stable_and_non_empty() {
        let token = Token::reference("MacieResource");
        assert_eq!(token.to_string(), "${Token[Ref.MacieResource]}");
        assert_eq!(token.to_string(), token.clone().to_string());
    }

    #[test]
    fn stack_key_resolves_to_arn_attribute() {
        let key = KeyReference::StackKey("CentralLogKey".to_string());
        assert_eq!(key.to_token(), Token::get_att("CentralLogKey", "Arn"));

        let parsed: KeyReference =
            serde_json::from_value(json!({ "arn": "arn:aws:kms:us-east-1:111:key/abc" }))
                .expect("key reference should parse");
        assert_eq!(
            parsed,
            KeyReference::Arn("arn:aws:kms:us-east-1:111:key/abc".to_string())
        );
    }
}
