#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::common::{validate_id, validate_text};
use crate::tenant::TenantId;
use crate::{ContractViolation, Validate};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const DEFAULT_BUSINESS_NAME: &str = "Mi Negocio Local";
pub const DEFAULT_PROFILE_PICTURE_URL: &str = "/static/img/default_profile.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MerchantId(pub u64);

impl Validate for MerchantId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "merchant_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Lower-cased contact address; unique per tenant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let v = Self(raw.trim().to_ascii_lowercase());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Email {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("email", &self.0, 254)?;
        let mut parts = self.0.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must contain exactly one '@'",
            });
        };
        if local.is_empty()
            || domain.len() < 3
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || self.0.chars().any(|c| c.is_ascii_whitespace())
        {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must look like local@domain.tld",
            });
        }
        Ok(())
    }
}

/// Chilean mobile number in `+569XXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhatsApp(String);

impl WhatsApp {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let v = Self(compact);
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for WhatsApp {
    fn validate(&self) -> Result<(), ContractViolation> {
        let ok = self
            .0
            .strip_prefix("+569")
            .is_some_and(|rest| rest.len() == 8 && rest.bytes().all(|b| b.is_ascii_digit()));
        if !ok {
            return Err(ContractViolation::InvalidValue {
                field: "whatsapp",
                reason: "format must be '+569XXXXXXXX'",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BusinessRelation {
    Owner,
    Administrator,
    KeyEmployee,
    FamilyInCharge,
}

impl BusinessRelation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "DUENO",
            Self::Administrator => "ADMIN",
            Self::KeyEmployee => "EMPLEADO",
            Self::FamilyInCharge => "FAMILIAR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "DUENO" | "DUEÑO" => Some(Self::Owner),
            "ADMIN" => Some(Self::Administrator),
            "EMPLEADO" => Some(Self::KeyEmployee),
            "FAMILIAR" => Some(Self::FamilyInCharge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BusinessType {
    NeighborhoodStore,
    Minimarket,
    LiquorStore,
    Bakery,
    StreetMarket,
    Kiosk,
    FoodTruck,
}

impl BusinessType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeighborhoodStore => "ALMACEN",
            Self::Minimarket => "MINIMARKET",
            Self::LiquorStore => "BOTILLERIA",
            Self::Bakery => "PANADERIA",
            Self::StreetMarket => "FERIA",
            Self::Kiosk => "KIOSCO",
            Self::FoodTruck => "FOODTRUCK",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::NeighborhoodStore,
            Self::Minimarket,
            Self::LiquorStore,
            Self::Bakery,
            Self::StreetMarket,
            Self::Kiosk,
            Self::FoodTruck,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interest {
    Marketing,
    Inventory,
    LocalSuppliers,
    Finance,
    CustomerService,
    Regulation,
    Technology,
    SocialMedia,
    Sales,
    Credit,
    Taxes,
    Merchandising,
    Sustainability,
    Security,
    Logistics,
    ProductInnovation,
    Entrepreneurship,
    Insurance,
}

impl Interest {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Marketing => "MARKETING",
            Self::Inventory => "INVENTARIO",
            Self::LocalSuppliers => "PROVEEDORES",
            Self::Finance => "FINANZAS",
            Self::CustomerService => "CLIENTES",
            Self::Regulation => "LEYES",
            Self::Technology => "TECNOLOGIA",
            Self::SocialMedia => "REDES_SOCIALES",
            Self::Sales => "VENTAS",
            Self::Credit => "CREDITOS",
            Self::Taxes => "IMPUESTOS",
            Self::Merchandising => "DECORACION",
            Self::Sustainability => "SOSTENIBILIDAD",
            Self::Security => "SEGURIDAD",
            Self::Logistics => "LOGISTICA",
            Self::ProductInnovation => "INNOVACION",
            Self::Entrepreneurship => "EMPRENDIMIENTO",
            Self::Insurance => "SEGUROS",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Marketing,
            Self::Inventory,
            Self::LocalSuppliers,
            Self::Finance,
            Self::CustomerService,
            Self::Regulation,
            Self::Technology,
            Self::SocialMedia,
            Self::Sales,
            Self::Credit,
            Self::Taxes,
            Self::Merchandising,
            Self::Sustainability,
            Self::Security,
            Self::Logistics,
            Self::ProductInnovation,
            Self::Entrepreneurship,
            Self::Insurance,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }

    /// Parses a comma separated code list; unknown codes are an error.
    pub fn parse_list(raw: &str) -> Result<BTreeSet<Self>, ContractViolation> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Self::parse(s).ok_or(ContractViolation::InvalidValue {
                    field: "merchant.interests",
                    reason: "unknown interest code",
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantRegistration {
    pub full_name: String,
    pub email: Email,
    pub password: String,
    pub confirm_password: String,
    pub whatsapp: Option<WhatsApp>,
    pub relation: BusinessRelation,
    pub business_type: BusinessType,
    pub comuna: String,
}

impl MerchantRegistration {
    /// Checks everything except the password pair. Used once the password
    /// has already been hashed.
    pub fn validate_identity(&self) -> Result<(), ContractViolation> {
        validate_text("merchant_registration.full_name", &self.full_name, 100)?;
        self.email.validate()?;
        if let Some(w) = &self.whatsapp {
            w.validate()?;
        }
        validate_id("merchant_registration.comuna", &self.comuna, 50)
    }
}

impl Validate for MerchantRegistration {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.validate_identity()?;
        if self.password != self.confirm_password {
            return Err(ContractViolation::InvalidValue {
                field: "merchant_registration.confirm_password",
                reason: "passwords do not match",
            });
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "merchant_registration.password",
                reason: "must be at least 8 characters",
            });
        }
        if self.password.len() > 255 {
            return Err(ContractViolation::InvalidValue {
                field: "merchant_registration.password",
                reason: "must be <= 255 bytes",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub business_name: Option<String>,
    pub interests: Option<BTreeSet<Interest>>,
    pub profile_picture: Option<String>,
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(name) = &self.business_name {
            validate_text("profile_update.business_name", name, 100)?;
        }
        if let Some(path) = &self.profile_picture {
            validate_id("profile_update.profile_picture", path, 255)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(raw.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SessionToken {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("session_token", &self.0, 128)?;
        if self.0.len() < 16 {
            return Err(ContractViolation::InvalidValue {
                field: "session_token",
                reason: "must be >= 16 chars",
            });
        }
        Ok(())
    }
}

/// Who is acting on this request. Passed explicitly to every flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    /// Absent for contexts built outside a login (operator tooling, replay).
    pub session_token: Option<SessionToken>,
}

impl SessionContext {
    pub fn new(tenant_id: TenantId, merchant_id: MerchantId) -> Result<Self, ContractViolation> {
        merchant_id.validate()?;
        Ok(Self {
            tenant_id,
            merchant_id,
            session_token: None,
        })
    }

    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.session_token = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> MerchantRegistration {
        MerchantRegistration {
            full_name: "Juan Pérez".to_string(),
            email: Email::parse("Juan@Example.cl").unwrap(),
            password: "almacen123".to_string(),
            confirm_password: "almacen123".to_string(),
            whatsapp: Some(WhatsApp::parse("+56 9 1234 5678").unwrap()),
            relation: BusinessRelation::Owner,
            business_type: BusinessType::NeighborhoodStore,
            comuna: "SANTIAGO".to_string(),
        }
    }

    #[test]
    fn at_merchant_01_email_is_normalized() {
        assert_eq!(
            Email::parse(" Juan@Example.CL ").unwrap().as_str(),
            "juan@example.cl"
        );
        assert!(Email::parse("juan.example.cl").is_err());
        assert!(Email::parse("juan@cl").is_err());
        assert!(Email::parse("a@b@c.cl").is_err());
    }

    #[test]
    fn at_merchant_02_whatsapp_format_is_chilean_mobile() {
        assert_eq!(WhatsApp::parse("+56912345678").unwrap().as_str(), "+56912345678");
        assert!(WhatsApp::parse("+5691234567").is_err());
        assert!(WhatsApp::parse("56912345678").is_err());
        assert!(WhatsApp::parse("+56812345678").is_err());
    }

    #[test]
    fn at_merchant_03_registration_password_rules() {
        assert!(registration().validate().is_ok());

        let mut mismatch = registration();
        mismatch.confirm_password = "otra_clave".to_string();
        assert!(matches!(
            mismatch.validate(),
            Err(ContractViolation::InvalidValue {
                field: "merchant_registration.confirm_password",
                ..
            })
        ));

        let mut short = registration();
        short.password = "corta".to_string();
        short.confirm_password = "corta".to_string();
        assert!(short.validate().is_err());
    }

    #[test]
    fn at_merchant_04_interest_list_parsing() {
        let set = Interest::parse_list("marketing, VENTAS,,seguros").unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Interest::Sales));
        assert!(Interest::parse_list("MARKETING,ASTROLOGIA").is_err());
        assert_eq!(Interest::all().len(), 18);
    }

    #[test]
    fn at_merchant_05_choice_codes_roundtrip() {
        for t in BusinessType::all() {
            assert_eq!(BusinessType::parse(t.as_str()), Some(*t));
        }
        assert_eq!(BusinessRelation::parse("dueño"), Some(BusinessRelation::Owner));
        assert_eq!(BusinessRelation::parse("socio"), None);
    }
}
