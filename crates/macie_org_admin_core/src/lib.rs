//! Declarative resources for delegating Macie administration in an AWS Organization.
//!
//! This crate only builds the CloudFormation resource graph. Deploying it, and
//! the Lambda handler that talks to Organizations and Macie, live elsewhere.

pub mod asset;
pub mod config;
pub mod error;
pub mod intrinsic;
pub mod logs;
pub mod macie;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod stack;

pub use error::{SynthError, SynthResult};
pub use macie::{AdminAccountConfig, MacieOrganizationAdminAccount};
pub use registry::{DeclarationRegistry, DedupScope};
pub use stack::{Stack, Template};
