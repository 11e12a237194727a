//! Order line reconciliation.
//!
//! [`plan_line_changes`] computes the minimal set of line operations that
//! turns an order's persisted lines into the estimate's lines.
//! [`CheckoutFlow::update_order_lines_flow`] applies that plan: deletes run
//! one after another, adds and updates run concurrently, and a failed line
//! never aborts its siblings.

use std::collections::HashSet;

use backend::CommerceBackend;
use common::{AssetId, OrderId};
use domain::{DesiredLine, LineUpdate, OrderLine, PaymentAction};
use futures_util::future::join_all;
use session_store::KeyValueStore;

use crate::coordinator::CheckoutFlow;
use crate::events::{CheckoutEvent, EventSink};

/// Line operations needed to bring an order in line with its estimate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinePlan {
    /// Persisted lines whose asset is no longer wanted.
    pub deletes: Vec<AssetId>,
    /// Existing lines whose quantity or unit price changed.
    pub updates: Vec<(DesiredLine, LineUpdate)>,
    /// Wanted lines with no persisted counterpart.
    pub adds: Vec<DesiredLine>,
}

impl LinePlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.adds.is_empty()
    }

    /// Total number of backend calls the plan needs.
    pub fn len(&self) -> usize {
        self.deletes.len() + self.updates.len() + self.adds.len()
    }
}

/// Diffs persisted lines against desired lines. Pure; no I/O.
///
/// If the desired set names an asset twice, the first occurrence wins.
pub fn plan_line_changes(existing: &[OrderLine], desired: &[DesiredLine]) -> LinePlan {
    let mut seen = HashSet::new();
    let desired: Vec<&DesiredLine> = desired
        .iter()
        .filter(|line| seen.insert(&line.asset_id))
        .collect();

    let deletes = existing
        .iter()
        .filter(|line| !seen.contains(&line.asset_id))
        .map(|line| line.asset_id.clone())
        .collect();

    let mut plan = LinePlan {
        deletes,
        ..LinePlan::default()
    };

    for line in desired {
        match existing.iter().find(|e| e.asset_id == line.asset_id) {
            Some(current) => {
                if let Some(update) = line.update_for(current) {
                    plan.updates.push((line.clone(), update));
                }
            }
            None => plan.adds.push(line.clone()),
        }
    }

    plan
}

/// A line operation that failed during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFailure {
    pub asset_id: AssetId,
    pub operation: &'static str,
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub deleted: Vec<AssetId>,
    pub updated: Vec<AssetId>,
    pub added: Vec<AssetId>,
    pub failed: Vec<LineFailure>,
}

impl ReconcileReport {
    /// Returns true if no call was made.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty()
            && self.updated.is_empty()
            && self.added.is_empty()
            && self.failed.is_empty()
    }
}

enum LineChange {
    Update(DesiredLine, LineUpdate),
    Add(DesiredLine),
}

impl LineChange {
    fn operation(&self) -> &'static str {
        match self {
            LineChange::Update(..) => "update_order_line",
            LineChange::Add(_) => "add_order_line",
        }
    }

    fn asset_id(&self) -> &AssetId {
        match self {
            LineChange::Update(line, _) | LineChange::Add(line) => &line.asset_id,
        }
    }
}

impl<B, K, E> CheckoutFlow<B, K, E>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    /// Brings the order's lines in line with the current estimate.
    ///
    /// Does nothing without both an order and an estimate. Individual line
    /// failures are reported through the event sink and in the returned
    /// report; they never fail the run.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_lines_flow(&self) -> ReconcileReport {
        let state = self.state();
        let (Some(order), Some(estimate)) = (state.order(), state.estimate()) else {
            tracing::debug!("no order or estimate; nothing to reconcile");
            return ReconcileReport::default();
        };

        let plan = plan_line_changes(&order.lines, &estimate.desired_lines());
        let order_id = order.order_id.clone();
        let mut report = ReconcileReport::default();

        if plan.is_empty() {
            tracing::debug!(%order_id, "order lines already match the estimate");
            return report;
        }

        for asset_id in plan.deletes {
            let result = self.backend.delete_order_line(&order_id, &asset_id).await;
            match result {
                Ok(()) => {
                    self.dispatch(PaymentAction::OrderLineRemoved(asset_id.clone()));
                    record_line_op("delete");
                    report.deleted.push(asset_id);
                }
                Err(err) => self.line_failed(&mut report, "delete_order_line", asset_id, err.to_string()),
            }
        }

        let changes = plan
            .updates
            .into_iter()
            .map(|(line, update)| LineChange::Update(line, update))
            .chain(plan.adds.into_iter().map(LineChange::Add));

        let results = join_all(changes.map(|change| self.apply_line_change(&order_id, change))).await;

        for (change, result) in results {
            match result {
                Ok(line) => {
                    let asset_id = line.asset_id.clone();
                    self.dispatch(PaymentAction::OrderLineUpserted(line));
                    match change {
                        LineChange::Update(..) => {
                            record_line_op("update");
                            report.updated.push(asset_id);
                        }
                        LineChange::Add(_) => {
                            record_line_op("add");
                            report.added.push(asset_id);
                        }
                    }
                }
                Err(reason) => {
                    let operation = change.operation();
                    let asset_id = change.asset_id().clone();
                    self.line_failed(&mut report, operation, asset_id, reason);
                }
            }
        }

        if let Err(err) = self.persist_order() {
            self.emit(CheckoutEvent::non_critical("persist_order", err.to_string()));
        }

        tracing::info!(
            %order_id,
            deleted = report.deleted.len(),
            updated = report.updated.len(),
            added = report.added.len(),
            failed = report.failed.len(),
            "order lines reconciled"
        );
        self.emit(CheckoutEvent::LinesReconciled {
            order_id,
            deleted: report.deleted.len(),
            updated: report.updated.len(),
            added: report.added.len(),
            failed: report.failed.len(),
        });

        report
    }

    async fn apply_line_change(
        &self,
        order_id: &OrderId,
        change: LineChange,
    ) -> (LineChange, std::result::Result<OrderLine, String>) {
        let result = match &change {
            LineChange::Update(line, update) => {
                let current = self
                    .state()
                    .order()
                    .and_then(|order| order.line(&line.asset_id).cloned());
                self.backend
                    .update_order_line(order_id, &line.asset_id, *update)
                    .await
                    .map(|()| {
                        let mut persisted = current.unwrap_or_else(|| line.to_order_line());
                        update.apply_to(&mut persisted);
                        persisted
                    })
            }
            LineChange::Add(line) => self
                .backend
                .add_order_line(order_id, line.to_line_input())
                .await
                .map(|()| line.to_order_line()),
        };
        (change, result.map_err(|err| err.to_string()))
    }

    fn line_failed(
        &self,
        report: &mut ReconcileReport,
        operation: &'static str,
        asset_id: AssetId,
        reason: String,
    ) {
        self.emit(CheckoutEvent::line_failure(operation, asset_id.clone(), reason.clone()));
        report.failed.push(LineFailure {
            asset_id,
            operation,
            error: reason,
        });
    }
}

fn record_line_op(op: &'static str) {
    metrics::counter!("checkout_line_operations_total", "op" => op).increment(1);
}
