//! The cart file a checkout run starts from.

use std::path::Path;

use domain::{AssetEntity, BillingProfile, Service};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Everything the buyer picked in the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub service: Service,
    #[serde(default)]
    pub assets: Vec<AssetEntity>,
    #[serde(default)]
    pub billing_profile: Option<BillingProfile>,
    /// Opaque payment provider handle passed through to the backend.
    pub payment_method: String,
}

impl Cart {
    /// Reads and parses a cart file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| CliError::CartRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CliError::CartFormat {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CART: &str = r#"{
        "service": {
            "id": "rec-1",
            "serviceID": "svc-1",
            "title": "Security audit",
            "price": 100,
            "organizationId": "seller-1",
            "legalVatPercent": 21
        },
        "assets": [
            {"assetID": "A", "title": "Report", "price": 10, "quantity": 2}
        ],
        "paymentMethod": "card"
    }"#;

    #[test]
    fn test_parse_cart() {
        let cart: Cart = serde_json::from_str(CART).unwrap();
        assert_eq!(cart.service.service_id.as_str(), "svc-1");
        assert_eq!(cart.service.price, dec!(100));
        assert_eq!(cart.assets[0].line_total(), dec!(20));
        assert_eq!(cart.billing_profile, None);
        assert_eq!(cart.payment_method, "card");
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join(format!("cart-{}.json", uuid::Uuid::new_v4()));
        let err = Cart::from_path(&path).unwrap_err();
        assert!(matches!(err, CliError::CartRead { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let path = std::env::temp_dir().join(format!("cart-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{\"service\": ").unwrap();
        let err = Cart::from_path(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, CliError::CartFormat { .. }));
    }
}
