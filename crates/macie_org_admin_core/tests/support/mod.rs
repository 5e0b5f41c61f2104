#![allow(dead_code)]

use macie_org_admin_core::asset::CodeAsset;
use macie_org_admin_core::intrinsic::KeyReference;
use macie_org_admin_core::AdminAccountConfig;

pub const ADMIN_ACCOUNT_ID: &str = "123456789012";
pub const LOG_KEY_ARN: &str = "arn:aws:kms:us-east-1:111122223333:key/1234abcd-log";

pub fn admin_config(retention_in_days: u32) -> AdminAccountConfig {
    AdminAccountConfig {
        admin_account_id: ADMIN_ACCOUNT_ID.to_string(),
        kms_key: KeyReference::Arn(LOG_KEY_ARN.to_string()),
        log_retention_in_days: retention_in_days,
    }
}

pub fn handler_asset() -> CodeAsset {
    CodeAsset::new("handlers/enable-organization-admin-account/dist", "5eed")
}
