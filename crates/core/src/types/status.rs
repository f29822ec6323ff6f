//! Status and classification enums.

use serde::{Deserialize, Serialize};

/// Order status as reported by the remote service.
///
/// The client never changes an order's status itself; it only re-requests
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Paid,
    Failed,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed => write!(f, "placed"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How the buyer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Pay on delivery. Placed with a single synchronous request.
    #[serde(rename = "COD")]
    Cod,
    /// Paid through the external provider's hosted checkout page.
    #[serde(rename = "online")]
    Online,
}

impl PaymentMethod {
    /// Map a requested method name onto a strategy.
    ///
    /// Only the exact value `"COD"` selects pay-on-delivery; every other
    /// value, including `"cod"`, is treated as an online payment.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "COD" {
            Self::Cod
        } else {
            Self::Online
        }
    }

    /// Wire name sent to the remote service.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "COD",
            Self::Online => "online",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketplace section a checkout belongs to.
///
/// Saved delivery addresses are kept per section: a hostel room for food
/// orders is rarely the address used for accommodation paperwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Accommodation,
    #[default]
    Food,
    StudyMaterials,
}

impl Section {
    /// Stable name used in persisted keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::Food => "food",
            Self::StudyMaterials => "study-materials",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accommodation" => Ok(Self::Accommodation),
            "food" => Ok(Self::Food),
            "study-materials" => Ok(Self::StudyMaterials),
            _ => Err(format!("invalid section: {s}")),
        }
    }
}
