#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::common::{validate_http_url, validate_id, validate_text};
use crate::merchant::Email;
use crate::{ContractViolation, Validate};

pub const COMPANY_NAME_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 5_000;
pub const CONTACT_MESSAGE_MAX_CHARS: usize = 2_000;
/// Upper bound (exclusive) for a reference price: ten digits with two decimals.
pub const MAX_REFERENCE_PRICE_UNITS: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderCategoryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComunaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromotionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactRequestId(pub u64);

/// Geographic reach a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Coverage {
    #[default]
    Local,
    Comunal,
    Regional,
    National,
    International,
}

impl Coverage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Comunal => "comunal",
            Self::Regional => "regional",
            Self::National => "nacional",
            Self::International => "internacional",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Local,
            Self::Comunal,
            Self::Regional,
            Self::National,
            Self::International,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
    }
}

/// `^\+?1?\d{9,15}$`
pub fn validate_phone(field: &'static str, raw: &str) -> Result<(), ContractViolation> {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let all_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    // A leading `1` may add a sixteenth digit.
    let ok = all_digits
        && (9..=16).contains(&digits.len())
        && (digits.len() <= 15 || digits.starts_with('1'));
    if !ok {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "format must be '+999999999' with up to 15 digits",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
}

impl Validate for SocialLinks {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(u) = &self.facebook {
            validate_http_url("social_links.facebook", u)?;
        }
        if let Some(u) = &self.linkedin {
            validate_http_url("social_links.linkedin", u)?;
        }
        if let Some(h) = &self.instagram {
            validate_text("social_links.instagram", h, 100)?;
        }
        if let Some(h) = &self.twitter {
            validate_text("social_links.twitter", h, 100)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfileDraft {
    pub company_name: String,
    pub description: String,
    pub categories: BTreeSet<ProviderCategoryId>,
    pub country: Option<CountryId>,
    pub region: Option<RegionId>,
    pub comuna: Option<ComunaId>,
    pub address: Option<String>,
    pub coverage: Coverage,
    pub phone: Option<String>,
    pub whatsapp: String,
    pub email: Email,
    pub website: Option<String>,
    pub social: SocialLinks,
    pub photo: Option<String>,
}

impl Validate for ProviderProfileDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text(
            "provider_profile.company_name",
            &self.company_name,
            COMPANY_NAME_MAX_CHARS,
        )?;
        validate_text(
            "provider_profile.description",
            &self.description,
            DESCRIPTION_MAX_CHARS,
        )?;
        if self.categories.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "provider_profile.categories",
                reason: "at least one category is required",
            });
        }
        if let Some(a) = &self.address {
            validate_text("provider_profile.address", a, 255)?;
        }
        if let Some(p) = &self.phone {
            validate_phone("provider_profile.phone", p)?;
        }
        validate_phone("provider_profile.whatsapp", &self.whatsapp)?;
        self.email.validate()?;
        if let Some(w) = &self.website {
            validate_http_url("provider_profile.website", w)?;
        }
        if let Some(p) = &self.photo {
            validate_id("provider_profile.photo", p, 255)?;
        }
        self.social.validate()
    }
}

/// Panel preferences stored alongside the provider profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub dark_mode: bool,
    pub notify_email: bool,
    pub notify_messages: bool,
    pub notify_orders: bool,
    pub language: String,
    pub timezone: String,
    pub public_profile: bool,
    pub show_stats: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notify_email: true,
            notify_messages: true,
            notify_orders: true,
            language: "es".to_string(),
            timezone: "America/Santiago".to_string(),
            public_profile: true,
            show_stats: true,
        }
    }
}

impl Validate for ProviderSettings {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("provider_settings.language", &self.language, 5)?;
        if self.language.len() < 2 {
            return Err(ContractViolation::InvalidValue {
                field: "provider_settings.language",
                reason: "must be a language tag like 'es'",
            });
        }
        validate_id("provider_settings.timezone", &self.timezone, 50)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ProductCategory {
    Food,
    Drinks,
    Clothing,
    Home,
    Services,
    #[default]
    Other,
}

impl ProductCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "ALIMENTOS",
            Self::Drinks => "BEBIDAS",
            Self::Clothing => "ROPA",
            Self::Home => "HOGAR",
            Self::Services => "SERVICIOS",
            Self::Other => "OTRO",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Food,
            Self::Drinks,
            Self::Clothing,
            Self::Home,
            Self::Services,
            Self::Other,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
    }
}

pub fn validate_reference_price(price: Decimal) -> Result<(), ContractViolation> {
    if price.is_sign_negative() {
        return Err(ContractViolation::InvalidValue {
            field: "product.reference_price",
            reason: "must be >= 0",
        });
    }
    if price.normalize().scale() > 2 {
        return Err(ContractViolation::InvalidValue {
            field: "product.reference_price",
            reason: "at most 2 decimal places",
        });
    }
    if price >= Decimal::from(MAX_REFERENCE_PRICE_UNITS) {
        return Err(ContractViolation::InvalidValue {
            field: "product.reference_price",
            reason: "at most 8 integer digits",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub reference_price: Option<Decimal>,
    pub category: ProductCategory,
    pub image: Option<String>,
    pub active: bool,
    pub featured: bool,
}

impl Validate for ProductDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("product.name", &self.name, 200)?;
        validate_text("product.description", &self.description, DESCRIPTION_MAX_CHARS)?;
        if let Some(p) = self.reference_price {
            validate_reference_price(p)?;
        }
        if let Some(i) = &self.image {
            validate_id("product.image", i, 255)?;
        }
        Ok(())
    }
}

/// `estado` filter on panel listings. Anything unrecognised shows everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl ActiveFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "activo" | "activos" | "activa" | "activas" => Self::Active,
            "inactivo" | "inactivos" | "inactiva" | "inactivas" => Self::Inactive,
            _ => Self::All,
        }
    }

    pub fn matches(self, active: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => active,
            Self::Inactive => !active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionDraft {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

impl PromotionDraft {
    /// Active and `today` falls inside the inclusive date window.
    pub fn is_current_on(&self, today: NaiveDate) -> bool {
        self.active && self.starts_on <= today && today <= self.ends_on
    }
}

impl Validate for PromotionDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("promotion.title", &self.title, 200)?;
        validate_text("promotion.description", &self.description, DESCRIPTION_MAX_CHARS)?;
        if let Some(i) = &self.image {
            validate_id("promotion.image", i, 255)?;
        }
        if self.ends_on < self.starts_on {
            return Err(ContractViolation::InvalidValue {
                field: "promotion.ends_on",
                reason: "must not be before starts_on",
            });
        }
        Ok(())
    }
}

/// `vigencia` filter on the promotions listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionValidity {
    #[default]
    Any,
    Current,
    Scheduled,
    Expired,
}

impl PromotionValidity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vigentes" => Self::Current,
            "programadas" => Self::Scheduled,
            "vencidas" => Self::Expired,
            _ => Self::Any,
        }
    }

    pub fn matches(self, promotion: &PromotionDraft, today: NaiveDate) -> bool {
        match self {
            Self::Any => true,
            Self::Current => promotion.is_current_on(today),
            Self::Scheduled => promotion.active && promotion.starts_on > today,
            Self::Expired => promotion.ends_on < today,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ContactRequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl ContactRequestStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Accepted => "aceptada",
            Self::Rejected => "rechazada",
            Self::Cancelled => "cancelada",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pendiente" => Some(Self::Pending),
            "aceptada" => Some(Self::Accepted),
            "rechazada" => Some(Self::Rejected),
            "cancelada" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRequestDraft {
    pub message: String,
}

impl Validate for ContactRequestDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text(
            "contact_request.message",
            &self.message,
            CONTACT_MESSAGE_MAX_CHARS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn promotion(start: NaiveDate, end: NaiveDate) -> PromotionDraft {
        PromotionDraft {
            title: "2x1 en pan amasado".to_string(),
            description: "Solo fines de semana".to_string(),
            image: None,
            starts_on: start,
            ends_on: end,
            active: true,
        }
    }

    #[test]
    fn at_provider_contract_01_phone_pattern() {
        assert!(validate_phone("p", "+56912345678").is_ok());
        assert!(validate_phone("p", "912345678").is_ok());
        assert!(validate_phone("p", "12345678").is_err());
        assert!(validate_phone("p", "+56 9 1234 5678").is_err());
        assert!(validate_phone("p", "1234567890123456").is_ok());
        assert!(validate_phone("p", "2234567890123456").is_err());
    }

    #[test]
    fn at_provider_contract_02_reference_price_bounds() {
        assert!(validate_reference_price(Decimal::new(199_990, 2)).is_ok());
        assert!(validate_reference_price(Decimal::new(1_500, 3)).is_ok());
        assert!(validate_reference_price(Decimal::new(1_505, 3)).is_err());
        assert!(validate_reference_price(Decimal::new(-1, 0)).is_err());
        assert!(validate_reference_price(Decimal::from(MAX_REFERENCE_PRICE_UNITS)).is_err());
    }

    #[test]
    fn at_provider_contract_03_promotion_window() {
        let p = promotion(ymd(2024, 3, 1), ymd(2024, 3, 31));
        assert!(p.validate().is_ok());
        assert!(p.is_current_on(ymd(2024, 3, 1)));
        assert!(p.is_current_on(ymd(2024, 3, 31)));
        assert!(!p.is_current_on(ymd(2024, 4, 1)));
        assert!(PromotionValidity::Scheduled.matches(&p, ymd(2024, 2, 28)));
        assert!(PromotionValidity::Expired.matches(&p, ymd(2024, 4, 1)));
        assert!(promotion(ymd(2024, 3, 2), ymd(2024, 3, 1)).validate().is_err());
    }

    #[test]
    fn at_provider_contract_04_filters_parse_leniently() {
        assert_eq!(ActiveFilter::parse("activo"), ActiveFilter::Active);
        assert_eq!(ActiveFilter::parse("todos"), ActiveFilter::All);
        assert_eq!(PromotionValidity::parse(""), PromotionValidity::Any);
        assert_eq!(Coverage::parse("Nacional"), Some(Coverage::National));
        assert_eq!(
            ContactRequestStatus::parse("aceptada"),
            Some(ContactRequestStatus::Accepted)
        );
    }
}
