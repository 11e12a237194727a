//! Orders, their persisted lines, and the line set an estimate implies.

use common::{AssetId, EstimateId, OrderId, OrganizationId, ServiceId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::estimate::EstimateItem;

/// A persisted order line. Unique by `asset_id` within its order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub asset_id: AssetId,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub legal_vat_percent: Decimal,
}

/// An order created from exactly one persisted estimate and one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub estimate_id: EstimateId,
    pub transaction_id: TransactionId,
    pub service_id: ServiceId,
    pub seller_organization_id: OrganizationId,
    pub total_price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Returns the line for `asset_id`, if present.
    pub fn line(&self, asset_id: &AssetId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| &l.asset_id == asset_id)
    }

    /// Inserts `line`, replacing any line with the same asset.
    pub fn upsert_line(&mut self, line: OrderLine) {
        match self.lines.iter_mut().find(|l| l.asset_id == line.asset_id) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    /// Removes the line for `asset_id`. Returns true if one was removed.
    pub fn remove_line(&mut self, asset_id: &AssetId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.asset_id != asset_id);
        self.lines.len() != before
    }
}

/// Request body for creating an order from an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    /// The persisted estimate the order commits to.
    pub quote_id: EstimateId,
    pub service_id: ServiceId,
    pub transaction_id: TransactionId,
    pub seller_organization_id: OrganizationId,
    pub total_price: Decimal,
    pub currency: String,
}

/// A line to add to an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub asset_id: AssetId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub title: String,
    pub description: String,
    pub legal_vat_percent: Decimal,
}

/// Changes to an existing line. Only fields that differ are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
}

impl LineUpdate {
    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.unit_price.is_none()
    }

    /// Applies the update to a persisted line and recomputes its total.
    pub fn apply_to(&self, line: &mut OrderLine) {
        if let Some(quantity) = self.quantity {
            line.quantity = quantity;
        }
        if let Some(unit_price) = self.unit_price {
            line.unit_price = unit_price;
        }
        line.total = line.unit_price * Decimal::from(line.quantity);
    }
}

/// A line an order should hold, derived from the current estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredLine {
    pub asset_id: AssetId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub title: String,
    pub description: String,
    pub legal_vat_percent: Decimal,
}

impl DesiredLine {
    pub fn from_item(item: &EstimateItem) -> Self {
        Self {
            asset_id: item.asset_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            title: item.title.clone(),
            description: item.description.clone().unwrap_or_else(|| item.title.clone()),
            legal_vat_percent: item.legal_vat_percent,
        }
    }

    /// Returns the update that brings `line` to this line's quantity and
    /// unit price, or `None` if it already matches.
    pub fn update_for(&self, line: &OrderLine) -> Option<LineUpdate> {
        let update = LineUpdate {
            quantity: (self.quantity != line.quantity).then_some(self.quantity),
            unit_price: (self.unit_price != line.unit_price).then_some(self.unit_price),
        };
        (!update.is_empty()).then_some(update)
    }

    pub fn to_line_input(&self) -> OrderLineInput {
        OrderLineInput {
            asset_id: self.asset_id.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            title: self.title.clone(),
            description: self.description.clone(),
            legal_vat_percent: self.legal_vat_percent,
        }
    }

    /// The persisted form of this line once the backend has accepted it.
    pub fn to_order_line(&self) -> OrderLine {
        OrderLine {
            asset_id: self.asset_id.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            total: self.unit_price * Decimal::from(self.quantity),
            description: Some(self.description.clone()),
            legal_vat_percent: self.legal_vat_percent,
        }
    }
}
