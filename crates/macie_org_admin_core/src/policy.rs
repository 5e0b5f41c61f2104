use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

pub const POLICY_VERSION: &str = "2012-10-17";
pub const STRING_LIKE_IF_EXISTS: &str = "StringLikeIfExists";

/// Operator → condition key → accepted values.
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: Effect,
    pub action: Vec<String>,
    #[serde(serialize_with = "one_or_many")]
    pub resource: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: ConditionBlock,
}

impl PolicyStatement {
    pub fn allow(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            effect: Effect::Allow,
            action: Vec::new(),
            resource: Vec::new(),
            condition: ConditionBlock::new(),
        }
    }

    /// Appends actions, keeping first-seen order and dropping repeats.
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for action in actions {
            let action = action.into();
            if !self.action.contains(&action) {
                self.action.push(action);
            }
        }
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn condition<I, S>(
        mut self,
        operator: &str,
        key: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts every action in the statement to the given service principal.
    pub fn scoped_to_principal(self, principal: &str) -> Self {
        let actions = self.action.clone();
        actions.into_iter().fold(self, |statement, action| {
            statement.condition(STRING_LIKE_IF_EXISTS, action, [principal])
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }
}

fn one_or_many<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    match values {
        [single] => serializer.serialize_str(single),
        _ => values.serialize(serializer),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_statement_in_iam_shape() {
        let statement = PolicyStatement::allow("SlrCreation")
            .actions(["iam:CreateServiceLinkedRole"])
            .resource("*")
            .scoped_to_principal("macie.amazonaws.com");

        assert_eq!(
            serde_json::to_value(&statement).expect("statement should serialize"),
            json!({
                "Sid": "SlrCreation",
                "Effect": "Allow",
                "Action": ["iam:CreateServiceLinkedRole"],
                "Resource": "*",
                "Condition": {
                    "StringLikeIfExists": {
                        "iam:CreateServiceLinkedRole": ["macie.amazonaws.com"]
                    }
                }
            })
        );
    }

    #[test]
    fn omits_empty_condition_and_drops_repeated_actions() {
        let statement = PolicyStatement::allow("Session")
            .actions(["macie2:EnableMacie", "macie2:GetMacieSession", "macie2:EnableMacie"])
            .resource("*");

        let value = serde_json::to_value(&statement).expect("statement should serialize");
        assert!(value.get("Condition").is_none());
        assert_eq!(
            value["Action"],
            json!(["macie2:EnableMacie", "macie2:GetMacieSession"])
        );
    }
}
