#![forbid(unsafe_code)]

pub mod account;
pub mod benefits;
pub mod directory;
pub mod error;
pub mod forum;
pub mod loyalty;
pub mod provider;

pub use error::OsError;

use vecino_engines::credentials::CredentialConfig;
use vecino_engines::loyalty::LoyaltyRuntime;
use vecino_engines::points::PointsRules;
use vecino_storage::store::VecinoStore;

use account::AccountFlow;
use benefits::BenefitsFlow;
use directory::DirectoryFlow;
use forum::ForumFlow;
use loyalty::LoyaltyFlow;
use provider::ProviderPanelFlow;

/// Runtime knobs shared by every flow.
#[derive(Debug, Clone)]
pub struct VecinoOsConfig {
    pub loyalty: LoyaltyRuntime,
    pub points: PointsRules,
    pub credentials: CredentialConfig,
    pub directory_page_size: usize,
}

impl VecinoOsConfig {
    pub fn mvp_v1() -> Self {
        Self {
            loyalty: LoyaltyRuntime::mvp_v1(),
            points: PointsRules::mvp_v1(),
            credentials: CredentialConfig::mvp_v1(),
            directory_page_size: vecino_engines::directory::DEFAULT_DIRECTORY_PAGE_SIZE,
        }
    }
}

/// All flows wired against one tier table and rule set.
#[derive(Debug, Clone)]
pub struct VecinoOs {
    pub account: AccountFlow,
    pub forum: ForumFlow,
    pub loyalty: LoyaltyFlow,
    pub benefits: BenefitsFlow,
    pub panel: ProviderPanelFlow,
    pub directory: DirectoryFlow,
}

impl VecinoOs {
    pub fn new(config: VecinoOsConfig) -> Self {
        let loyalty = LoyaltyFlow::new(config.loyalty, config.points);
        Self {
            account: AccountFlow::new(config.credentials, loyalty.clone()),
            forum: ForumFlow::new(loyalty.clone()),
            benefits: BenefitsFlow::new(loyalty.clone()),
            panel: ProviderPanelFlow::new(),
            directory: DirectoryFlow::new(config.directory_page_size),
            loyalty,
        }
    }

    pub fn mvp_v1() -> Self {
        Self::new(VecinoOsConfig::mvp_v1())
    }

    pub fn new_store(&self) -> VecinoStore {
        self.loyalty.new_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::testkit::{at, registration, tenant};
    use vecino_engines::loyalty::LoyaltyConfig;
    use vecino_kernel_contracts::loyalty::TierCode;

    #[test]
    fn at_os_01_wider_bands_flow_through_every_flow() {
        let os = VecinoOs::new(VecinoOsConfig {
            loyalty: LoyaltyRuntime::new(LoyaltyConfig::with_band_width(10)).unwrap(),
            credentials: CredentialConfig { iterations: 4 },
            ..VecinoOsConfig::mvp_v1()
        });
        let mut store = os.new_store();
        let reg = os
            .account
            .register_merchant(&mut store, &tenant(), &registration("rosa@almacen.cl"), at(0))
            .unwrap();
        assert_eq!(reg.points_awarded, 20);
        assert_eq!(
            store.member_loyalty(&tenant(), reg.merchant_id).unwrap().tier,
            TierCode::Gold
        );
        let login = os
            .account
            .login(&mut store, &tenant(), "rosa@almacen.cl", "almacen123", at(1))
            .unwrap();
        let progress = os.loyalty.member_progress(&store, &login.context).unwrap();
        assert_eq!(progress.points, 25);
        assert_eq!(progress.tier, TierCode::Gold);
    }
}
