//! Inputs loaded into the checkout flow from the storefront.

use common::{AssetId, OrganizationId, ServiceId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sellable service offering. Immutable once loaded into the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Internal record id.
    pub id: String,
    /// Public service id used in every backend request.
    #[serde(rename = "serviceID")]
    pub service_id: ServiceId,
    pub title: String,
    pub price: Decimal,
    /// Seller organization; required before an order can be created.
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub legal_vat_percent: Decimal,
}

impl Service {
    /// Client-side indicative amount: service price plus every asset line.
    ///
    /// Tax is computed by the backend and is not included.
    pub fn indicative_total(&self, assets: &[AssetEntity]) -> Decimal {
        assets
            .iter()
            .fold(self.price, |acc, asset| acc + asset.line_total())
    }
}

/// A line item the buyer can add next to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntity {
    #[serde(rename = "assetID")]
    pub asset_id: AssetId,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl AssetEntity {
    pub fn new(asset_id: impl Into<AssetId>, title: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            asset_id: asset_id.into(),
            title: title.into(),
            price,
            quantity,
        }
    }

    /// Price times quantity.
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Buyer name and address printed on the estimate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingProfile {
    pub name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The authenticated buyer on whose behalf the checkout runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub user_id: UserId,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
}

impl Buyer {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<OrganizationId>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_indicative_total_sums_service_and_assets() {
        let service = Service {
            id: "svc-record-1".to_string(),
            service_id: ServiceId::new("svc-1"),
            title: "Audit".to_string(),
            price: dec!(100),
            organization_id: Some(OrganizationId::new("org-1")),
            legal_vat_percent: dec!(21),
        };
        let assets = vec![
            AssetEntity::new("A", "Report", dec!(10), 2),
            AssetEntity::new("B", "Workshop", dec!(7.5), 1),
        ];

        assert_eq!(service.indicative_total(&assets), dec!(127.5));
        assert_eq!(service.indicative_total(&[]), dec!(100));
    }

    #[test]
    fn test_service_wire_names() {
        let json = serde_json::json!({
            "id": "rec-1",
            "serviceID": "svc-1",
            "title": "Audit",
            "price": 100,
            "organizationId": "org-1",
            "legalVatPercent": 21
        });
        let service: Service = serde_json::from_value(json).unwrap();
        assert_eq!(service.service_id.as_str(), "svc-1");
        assert_eq!(service.organization_id, Some(OrganizationId::new("org-1")));
        assert_eq!(service.legal_vat_percent, dec!(21));
    }

    #[test]
    fn test_service_without_organization() {
        let json = serde_json::json!({
            "id": "rec-1",
            "serviceID": "svc-1",
            "title": "Audit",
            "price": 100
        });
        let service: Service = serde_json::from_value(json).unwrap();
        assert!(service.organization_id.is_none());
        assert_eq!(service.legal_vat_percent, Decimal::ZERO);
    }
}
