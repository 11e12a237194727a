//! Estimates (quotes) and the draft/persisted distinction.
//!
//! The backend encodes draft-ness as an id convention: a draft's
//! `estimateId` starts with `draft-` or its `estimateNumber` starts with
//! `TEMP-`. That convention is interpreted exactly once, in
//! [`Estimate::classify`]; everything downstream matches on the variant.

use chrono::{DateTime, Utc};
use common::{AssetId, EstimateId, OrganizationId, ServiceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{AssetEntity, BillingProfile, Service};
use crate::error::DomainError;
use crate::order::DesiredLine;

const DRAFT_ID_PREFIX: &str = "draft-";
const DRAFT_NUMBER_PREFIX: &str = "TEMP-";

/// Lifecycle status of an estimate as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateStatus {
    Draft,
    #[default]
    Pending,
    Sent,
    Accepted,
    Rejected,
    Paid,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One asset line inside an estimate service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateItem {
    pub asset_id: AssetId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub legal_vat_percent: Decimal,
}

/// A service entry of an estimate with the assets sold alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateService {
    pub service_id: ServiceId,
    pub title: String,
    pub price: Decimal,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub legal_vat_percent: Decimal,
    #[serde(default)]
    pub items: Vec<EstimateItem>,
}

fn one() -> u32 {
    1
}

/// The issuing (seller) side of an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateParty {
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Priced body of an estimate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateBody {
    #[serde(default)]
    pub services: Vec<EstimateService>,
    #[serde(default)]
    pub from: Option<EstimateParty>,
    #[serde(default)]
    pub to: Option<BillingProfile>,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub sub_total: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub status: EstimateStatus,
}

/// An estimate record exactly as exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateDetails {
    pub estimate_id: EstimateId,
    #[serde(default)]
    pub estimate_number: String,
    pub details: EstimateBody,
    #[serde(default)]
    pub items: Vec<EstimateItem>,
}

impl EstimateDetails {
    /// Returns true if the record carries either draft marker.
    pub fn has_draft_marker(&self) -> bool {
        self.estimate_id.as_str().starts_with(DRAFT_ID_PREFIX)
            || self.estimate_number.starts_with(DRAFT_NUMBER_PREFIX)
    }

    /// Returns true if any service entry is for `service_id`.
    pub fn covers_service(&self, service_id: &ServiceId) -> bool {
        self.details
            .services
            .iter()
            .any(|s| &s.service_id == service_id)
    }
}

/// An estimate, either a client-local draft or a server-persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "estimate", rename_all = "snake_case")]
pub enum Estimate {
    /// Placeholder that exists only on the client. Never used to build an order.
    Draft(EstimateDetails),
    /// Record persisted by the backend.
    Persisted(EstimateDetails),
}

impl Estimate {
    /// Classifies a backend record by its draft markers.
    pub fn classify(details: EstimateDetails) -> Self {
        if details.has_draft_marker() {
            Estimate::Draft(details)
        } else {
            Estimate::Persisted(details)
        }
    }

    /// Builds a local draft for previewing a selection before it is persisted.
    pub fn draft_preview(
        service: &Service,
        assets: &[AssetEntity],
        billing_profile: Option<&BillingProfile>,
        now: DateTime<Utc>,
    ) -> Self {
        let stamp = now.timestamp_millis();
        let body = EstimateBody::for_selection(service, assets, billing_profile, EstimateStatus::Draft);
        Estimate::Draft(EstimateDetails {
            estimate_id: EstimateId::new(format!("{DRAFT_ID_PREFIX}{stamp}")),
            estimate_number: format!("{DRAFT_NUMBER_PREFIX}{stamp}"),
            details: body,
            items: Vec::new(),
        })
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Estimate::Draft(_))
    }

    /// Returns the record regardless of variant.
    pub fn details(&self) -> &EstimateDetails {
        match self {
            Estimate::Draft(d) | Estimate::Persisted(d) => d,
        }
    }

    pub fn into_details(self) -> EstimateDetails {
        match self {
            Estimate::Draft(d) | Estimate::Persisted(d) => d,
        }
    }

    pub fn id(&self) -> &EstimateId {
        &self.details().estimate_id
    }

    /// Returns the id only for persisted estimates.
    pub fn persisted_id(&self) -> Option<&EstimateId> {
        match self {
            Estimate::Persisted(d) => Some(&d.estimate_id),
            Estimate::Draft(_) => None,
        }
    }

    pub fn total(&self) -> Decimal {
        self.details().details.total
    }

    pub fn status(&self) -> EstimateStatus {
        self.details().details.status
    }

    /// Flattens every service's items into the line set an order should hold.
    pub fn desired_lines(&self) -> Vec<DesiredLine> {
        self.details()
            .details
            .services
            .iter()
            .flat_map(|service| service.items.iter())
            .map(DesiredLine::from_item)
            .collect()
    }
}

impl EstimateBody {
    /// Prices a service and its assets. Totals are indicative; the backend
    /// recomputes tax and totals when it persists the estimate.
    pub fn for_selection(
        service: &Service,
        assets: &[AssetEntity],
        billing_profile: Option<&BillingProfile>,
        status: EstimateStatus,
    ) -> Self {
        let items = assets
            .iter()
            .map(|asset| EstimateItem {
                asset_id: asset.asset_id.clone(),
                title: asset.title.clone(),
                description: Some(asset.title.clone()),
                quantity: asset.quantity,
                unit_price: asset.price,
                legal_vat_percent: service.legal_vat_percent,
            })
            .collect();

        let sub_total = service.indicative_total(assets);

        Self {
            services: vec![EstimateService {
                service_id: service.service_id.clone(),
                title: service.title.clone(),
                price: service.price,
                quantity: 1,
                legal_vat_percent: service.legal_vat_percent,
                items,
            }],
            from: Some(EstimateParty {
                organization_id: service.organization_id.clone(),
                name: None,
            }),
            to: billing_profile.cloned(),
            tax: Decimal::ZERO,
            sub_total,
            total: sub_total,
            status,
        }
    }
}

/// Request body for creating a persisted estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateInput {
    pub service_id: ServiceId,
    pub proposal_price: Decimal,
    pub is_draft: bool,
    pub details: EstimateBody,
}

impl EstimateInput {
    /// Builds a non-draft estimate request from the buyer's selection.
    pub fn from_selection(
        service: &Service,
        assets: &[AssetEntity],
        billing_profile: Option<&BillingProfile>,
    ) -> Result<Self, DomainError> {
        validate_selection(service, assets)?;

        Ok(Self {
            service_id: service.service_id.clone(),
            proposal_price: service.price,
            is_draft: false,
            details: EstimateBody::for_selection(
                service,
                assets,
                billing_profile,
                EstimateStatus::Pending,
            ),
        })
    }
}

/// Request body for updating an existing estimate in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateUpdate {
    pub estimate_id: EstimateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_profile: Option<BillingProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<EstimateService>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EstimateStatus>,
}

impl EstimateUpdate {
    /// Replaces billing profile and priced services with the current selection.
    pub fn from_selection(
        estimate_id: EstimateId,
        service: &Service,
        assets: &[AssetEntity],
        billing_profile: Option<&BillingProfile>,
    ) -> Result<Self, DomainError> {
        validate_selection(service, assets)?;
        let body = EstimateBody::for_selection(service, assets, billing_profile, EstimateStatus::Pending);

        Ok(Self {
            estimate_id,
            billing_profile: billing_profile.cloned(),
            services: Some(body.services),
            status: None,
        })
    }

    /// Changes only the status.
    pub fn status(estimate_id: EstimateId, status: EstimateStatus) -> Self {
        Self {
            estimate_id,
            billing_profile: None,
            services: None,
            status: Some(status),
        }
    }
}

fn validate_selection(service: &Service, assets: &[AssetEntity]) -> Result<(), DomainError> {
    if service.price.is_sign_negative() {
        return Err(DomainError::InvalidPrice {
            item: service.service_id.to_string(),
            price: service.price,
        });
    }

    for asset in assets {
        if asset.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                asset_id: asset.asset_id.clone(),
                quantity: asset.quantity,
            });
        }
        if asset.price.is_sign_negative() {
            return Err(DomainError::InvalidPrice {
                item: asset.asset_id.to_string(),
                price: asset.price,
            });
        }
    }

    Ok(())
}
