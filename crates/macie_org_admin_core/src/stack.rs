//! In-memory resource graph for one deployment unit.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::intrinsic::{Token, AWS_ACCOUNT_ID, AWS_REGION};
use crate::provider::CustomResourceProvider;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

pub fn default_asset_bucket() -> String {
    format!("cdk-hnb659fds-assets-${{{AWS_ACCOUNT_ID}}}-${{{AWS_REGION}}}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    fn as_cfn_policy(self) -> &'static str {
        match self {
            Self::Destroy => "Delete",
            Self::Retain => "Retain",
            Self::Snapshot => "Snapshot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CfnResource {
    pub logical_id: String,
    pub resource_type: String,
    pub properties: BTreeMap<String, Value>,
    pub depends_on: BTreeSet<String>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl CfnResource {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            removal_policy: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn reference(&self) -> Token {
        Token::reference(self.logical_id.clone())
    }

    pub fn attribute(&self, attribute: &str) -> Token {
        Token::get_att(self.logical_id.clone(), attribute)
    }
}

impl Serialize for CfnResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", &self.resource_type)?;
        if !self.properties.is_empty() {
            map.serialize_entry("Properties", &self.properties)?;
        }
        if !self.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &self.depends_on)?;
        }
        if let Some(policy) = self.removal_policy {
            map.serialize_entry("UpdateReplacePolicy", policy.as_cfn_policy())?;
            map.serialize_entry("DeletionPolicy", policy.as_cfn_policy())?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Token,
}

/// Synthesized template; an immutable snapshot of a stack.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, CfnResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn to_json_pretty(&self) -> SynthResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a CfnResource> + 'a {
        of_type(&self.resources, resource_type)
    }
}

#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    region: Option<String>,
    description: Option<String>,
    asset_bucket: String,
    resources: BTreeMap<String, CfnResource>,
    outputs: BTreeMap<String, Output>,
    pub(crate) providers: BTreeMap<String, CustomResourceProvider>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
            description: None,
            asset_bucket: default_asset_bucket(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            providers: BTreeMap::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_asset_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.asset_bucket = bucket.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_bucket(&self) -> &str {
        &self.asset_bucket
    }

    /// Deploying region: the pinned region, or the `AWS::Region` pseudo parameter.
    pub fn region_token(&self) -> Token {
        match &self.region {
            Some(region) => Token::literal(region.clone()),
            None => Token::region(),
        }
    }

    pub fn add_resource(&mut self, resource: CfnResource) -> SynthResult<Token> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(SynthError::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: resource.logical_id,
            });
        }
        for target in &resource.depends_on {
            self.ensure_declared(target)?;
        }

        debug!(
            stack = %self.name,
            logical_id = %resource.logical_id,
            resource_type = %resource.resource_type,
            "declared resource"
        );
        let reference = resource.reference();
        self.resources.insert(resource.logical_id.clone(), resource);
        Ok(reference)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&CfnResource> {
        self.resources.get(logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a CfnResource> + 'a {
        of_type(&self.resources, resource_type)
    }

    /// `from` will only be created once `to` exists.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> SynthResult<()> {
        self.ensure_declared(to)?;
        let stack = self.name.clone();
        let resource = self
            .resources
            .get_mut(from)
            .ok_or_else(|| SynthError::UnknownResource {
                stack,
                logical_id: from.to_string(),
            })?;
        resource.depends_on.insert(to.to_string());
        Ok(())
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Token,
        description: Option<String>,
    ) -> SynthResult<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(SynthError::DuplicateOutput {
                stack: self.name.clone(),
                name,
            });
        }
        self.outputs.insert(name, Output { description, value });
        Ok(())
    }

    pub fn template(&self) -> Template {
        Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: self.description.clone(),
            resources: self.resources.clone(),
            outputs: self.outputs.clone(),
        }
    }

    fn ensure_declared(&self, logical_id: &str) -> SynthResult<()> {
        if self.resources.contains_key(logical_id) {
            Ok(())
        } else {
            Err(SynthError::UnknownResource {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            })
        }
    }
}

fn of_type<'a>(
    resources: &'a BTreeMap<String, CfnResource>,
    resource_type: &'a str,
) -> impl Iterator<Item = &'a CfnResource> + 'a {
    resources
        .values()
        .filter(move |resource| resource.resource_type == resource_type)
}

/// Joins construct ids into a template logical id, keeping only ASCII alphanumerics.
pub fn logical_id(parts: &[&str]) -> SynthResult<String> {
    let id: String = parts
        .iter()
        .flat_map(|part| part.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if id.is_empty() {
        return Err(SynthError::InvalidLogicalId(parts.concat()));
    }
    Ok(id)
}
