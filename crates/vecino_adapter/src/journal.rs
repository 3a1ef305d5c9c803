#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vecino_kernel_contracts::merchant::MerchantId;
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;

use crate::dto::{
    AdjustmentRequest, BenefitRequest, CategoryRequest, CommentRequest, ComunaRequest,
    ContactRequestRequest, CountryRequest, PostRequest, ProductRequest, ProfilePatchRequest,
    PromotionRequest, ProviderProfileRequest, ProviderSettingsRequest, ProviderStatusRequest,
    RegionRequest, RegisterRequest,
};
use crate::error::AdapterError;

pub const JOURNAL_SCHEMA_VERSION: u8 = 1;

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Merchant,
    Operator,
}

/// A mutating command that succeeded against the store. Replaying the
/// journal in order rebuilds the same store, ids included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum JournalCommand {
    RegisterMerchant {
        registration: RegisterRequest,
        password_hash: String,
    },
    RecordLogin,
    UpdateProfile {
        body: ProfilePatchRequest,
    },
    PublishPost {
        body: PostRequest,
    },
    AddComment {
        post_id: u64,
        body: CommentRequest,
    },
    ToggleLike {
        post_id: u64,
    },
    CreateBenefit {
        body: BenefitRequest,
    },
    RedeemBenefit {
        benefit_id: u64,
    },
    AdjustPoints {
        body: AdjustmentRequest,
    },
    CreateProviderProfile {
        body: ProviderProfileRequest,
    },
    UpdateProviderProfile {
        body: ProviderProfileRequest,
    },
    UpdateProviderSettings {
        body: ProviderSettingsRequest,
    },
    CreateProduct {
        body: ProductRequest,
    },
    UpdateProduct {
        product_id: u64,
        body: ProductRequest,
    },
    DeleteProduct {
        product_id: u64,
    },
    ToggleProductFeatured {
        product_id: u64,
    },
    CreatePromotion {
        body: PromotionRequest,
    },
    UpdatePromotion {
        promotion_id: u64,
        body: PromotionRequest,
    },
    DeletePromotion {
        promotion_id: u64,
    },
    SendContactRequest {
        body: ContactRequestRequest,
    },
    RespondContactRequest {
        request_id: u64,
        accept: bool,
    },
    CancelContactRequest {
        request_id: u64,
    },
    VisitProvider {
        provider_id: u64,
    },
    AddCountry {
        body: CountryRequest,
    },
    AddRegion {
        body: RegionRequest,
    },
    AddComuna {
        body: ComunaRequest,
    },
    AddProviderCategory {
        body: CategoryRequest,
    },
    SetProviderStatus {
        provider_id: u64,
        body: ProviderStatusRequest,
    },
}

impl JournalCommand {
    pub fn access(&self) -> Access {
        match self {
            Self::RegisterMerchant { .. } | Self::VisitProvider { .. } => Access::Public,
            Self::CreateBenefit { .. }
            | Self::AdjustPoints { .. }
            | Self::AddCountry { .. }
            | Self::AddRegion { .. }
            | Self::AddComuna { .. }
            | Self::AddProviderCategory { .. }
            | Self::SetProviderStatus { .. } => Access::Operator,
            _ => Access::Merchant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterMerchant { .. } => "register_merchant",
            Self::RecordLogin => "record_login",
            Self::UpdateProfile { .. } => "update_profile",
            Self::PublishPost { .. } => "publish_post",
            Self::AddComment { .. } => "add_comment",
            Self::ToggleLike { .. } => "toggle_like",
            Self::CreateBenefit { .. } => "create_benefit",
            Self::RedeemBenefit { .. } => "redeem_benefit",
            Self::AdjustPoints { .. } => "adjust_points",
            Self::CreateProviderProfile { .. } => "create_provider_profile",
            Self::UpdateProviderProfile { .. } => "update_provider_profile",
            Self::UpdateProviderSettings { .. } => "update_provider_settings",
            Self::CreateProduct { .. } => "create_product",
            Self::UpdateProduct { .. } => "update_product",
            Self::DeleteProduct { .. } => "delete_product",
            Self::ToggleProductFeatured { .. } => "toggle_product_featured",
            Self::CreatePromotion { .. } => "create_promotion",
            Self::UpdatePromotion { .. } => "update_promotion",
            Self::DeletePromotion { .. } => "delete_promotion",
            Self::SendContactRequest { .. } => "send_contact_request",
            Self::RespondContactRequest { .. } => "respond_contact_request",
            Self::CancelContactRequest { .. } => "cancel_contact_request",
            Self::VisitProvider { .. } => "visit_provider",
            Self::AddCountry { .. } => "add_country",
            Self::AddRegion { .. } => "add_region",
            Self::AddComuna { .. } => "add_comuna",
            Self::AddProviderCategory { .. } => "add_provider_category",
            Self::SetProviderStatus { .. } => "set_provider_status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub schema_version: u8,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<u64>,
    pub now_ns: u64,
    pub command: JournalCommand,
}

impl JournalEntry {
    pub fn v1(
        tenant_id: &TenantId,
        merchant_id: Option<MerchantId>,
        now: MonotonicTimeNs,
        command: JournalCommand,
    ) -> Self {
        Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            tenant_id: tenant_id.as_str().to_string(),
            merchant_id: merchant_id.map(|m| m.0),
            now_ns: now.0,
            command,
        }
    }
}

/// Append-only JSON-lines file, one entry per line.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Creates the parent directory and an empty file when missing.
    pub fn open(path: PathBuf) -> Result<Self, AdapterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                AdapterError::Journal(format!(
                    "failed to create journal directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        if !path.exists() {
            File::create(&path).map_err(|err| {
                AdapterError::Journal(format!(
                    "failed to create journal '{}': {}",
                    path.display(),
                    err
                ))
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries with their 1-based line numbers. Blank lines are skipped.
    pub fn read_entries(&self) -> Result<Vec<(usize, JournalEntry)>, AdapterError> {
        let file = File::open(&self.path).map_err(|err| {
            AdapterError::Journal(format!(
                "failed to open journal '{}': {}",
                self.path.display(),
                err
            ))
        })?;
        let mut entries = Vec::new();
        for (idx, line_result) in BufReader::new(file).lines().enumerate() {
            let line_no = idx + 1;
            let line = line_result.map_err(|err| {
                AdapterError::Journal(format!(
                    "failed reading journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no,
                    err
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(&line).map_err(|err| {
                AdapterError::Journal(format!(
                    "failed parsing journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no,
                    err
                ))
            })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(AdapterError::Journal(format!(
                    "unsupported journal schema_version={} at line {}",
                    entry.schema_version, line_no
                )));
            }
            entries.push((line_no, entry));
        }
        Ok(entries)
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<(), AdapterError> {
        let json = serde_json::to_string(entry).map_err(|err| {
            AdapterError::Journal(format!("failed to encode journal entry: {err}"))
        })?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| {
                AdapterError::Journal(format!(
                    "failed opening journal '{}' for append: {}",
                    self.path.display(),
                    err
                ))
            })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| {
                AdapterError::Journal(format!(
                    "failed writing journal '{}': {}",
                    self.path.display(),
                    err
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("barrio_norte").unwrap()
    }

    #[test]
    fn at_journal_01_entries_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path().join("nested/journal.jsonl")).unwrap();
        let first = JournalEntry::v1(
            &tenant(),
            Some(MerchantId(1)),
            MonotonicTimeNs(7),
            JournalCommand::ToggleLike { post_id: 3 },
        );
        let second = JournalEntry::v1(
            &tenant(),
            None,
            MonotonicTimeNs(8),
            JournalCommand::VisitProvider { provider_id: 2 },
        );
        journal.append(&first).unwrap();
        journal.append(&second).unwrap();

        let raw = fs::read_to_string(journal.path()).unwrap();
        assert!(raw.contains("\"command\":\"toggle_like\""));

        let entries = journal.read_entries().unwrap();
        assert_eq!(entries, vec![(1, first), (2, second)]);
    }

    #[test]
    fn at_journal_02_rejects_unknown_schema_version_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        fs::write(
            &path,
            concat!(
                "\n{\"schema_version\":2,\"tenant_id\":\"t\",\"now_ns\":1,",
                "\"command\":{\"command\":\"record_login\"}}\n",
            ),
        )
        .unwrap();
        let journal = Journal::open(path).unwrap();
        match journal.read_entries() {
            Err(AdapterError::Journal(reason)) => assert!(reason.contains("line 2")),
            other => panic!("expected journal error, got {other:?}"),
        }
    }

    #[test]
    fn at_journal_03_access_levels() {
        assert_eq!(JournalCommand::RecordLogin.access(), Access::Merchant);
        assert_eq!(
            JournalCommand::VisitProvider { provider_id: 1 }.access(),
            Access::Public
        );
        assert_eq!(
            JournalCommand::SetProviderStatus {
                provider_id: 1,
                body: ProviderStatusRequest {
                    active: false,
                    verified: false,
                    featured: false,
                },
            }
            .access(),
            Access::Operator
        );
    }
}
