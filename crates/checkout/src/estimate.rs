//! Estimate creation, recovery, and in-place updates.

use std::sync::Arc;

use backend::CommerceBackend;
use common::{EstimateId, ServiceId};
use domain::{Estimate, EstimateInput, EstimateUpdate, PaymentAction};
use session_store::KeyValueStore;

use crate::coordinator::CheckoutFlow;
use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, EventSink};
use crate::guard::Resource;

impl<B, K, E> CheckoutFlow<B, K, E>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    /// Ensures the session has a persisted estimate for the selected service.
    ///
    /// Returns `Ok(None)` when no service is selected.
    #[tracing::instrument(skip(self))]
    pub async fn create_estimate_only(&self) -> Result<Option<Estimate>> {
        let state = self.state();
        let Some(service) = state.service().cloned() else {
            tracing::debug!("no service selected; skipping estimate");
            return Ok(None);
        };

        if let Some(estimate) = state.persisted_estimate() {
            return Ok(Some(estimate.clone()));
        }

        if let Some(estimate) = self.recover_estimate(Some(&service.service_id)).await? {
            return Ok(Some(estimate));
        }

        let input = EstimateInput::from_selection(&service, state.assets(), state.billing_profile())?;

        let backend = Arc::clone(&self.backend);
        let (details, role) = self
            .guard
            .estimate_flight()
            .run(move || async move { Ok(backend.create_estimate(input).await?) })
            .await?;

        let estimate = Estimate::classify(details);
        let Some(estimate_id) = estimate.persisted_id().cloned() else {
            tracing::error!(estimate_id = %estimate.id(), "backend returned a draft estimate");
            return Err(CheckoutError::UnexpectedDraft(estimate.id().clone()));
        };

        self.guard.set(Resource::Estimate, estimate_id.as_str())?;
        self.dispatch(PaymentAction::EstimateRecorded(estimate.clone()));

        if role.is_leader() {
            metrics::counter!("checkout_estimates_created_total").increment(1);
            tracing::info!(%estimate_id, "estimate created");
            self.emit(CheckoutEvent::EstimateCreated { estimate_id });
        }

        Ok(Some(estimate))
    }

    /// Reads the estimate stored for this session back from the backend.
    ///
    /// Returns `Ok(None)` when no id is stored, the read fails, or the record
    /// is unusable (a draft, or priced for a different service). Only session
    /// storage errors propagate.
    pub async fn recover_estimate(
        &self,
        service_id: Option<&ServiceId>,
    ) -> Result<Option<Estimate>> {
        let Some(stored) = self.guard.get(Resource::Estimate)? else {
            return Ok(None);
        };
        let estimate_id = EstimateId::new(stored);

        let details = match self.backend.get_estimate(&estimate_id).await {
            Ok(details) => details,
            Err(err) => {
                tracing::warn!(%estimate_id, error = %err, "failed to recover estimate; creating a new one");
                return Ok(None);
            }
        };

        if details.has_draft_marker() {
            tracing::warn!(%estimate_id, "stored estimate is a draft; ignoring it");
            return Ok(None);
        }
        if let Some(service_id) = service_id
            && !details.details.services.is_empty()
            && !details.covers_service(service_id)
        {
            tracing::warn!(%estimate_id, %service_id, "stored estimate is for another service; ignoring it");
            return Ok(None);
        }

        let estimate = Estimate::Persisted(details);
        self.dispatch(PaymentAction::EstimateRecorded(estimate.clone()));

        metrics::counter!("checkout_estimates_recovered_total").increment(1);
        tracing::info!(%estimate_id, "estimate recovered from session");
        self.emit(CheckoutEvent::EstimateRecovered { estimate_id });

        Ok(Some(estimate))
    }

    /// Pushes the current billing profile and asset selection into the
    /// persisted estimate and records the backend's repriced version.
    #[tracing::instrument(skip(self))]
    pub async fn update_estimate_flow(&self) -> Result<Estimate> {
        let state = self.state();
        let estimate_id = state
            .persisted_estimate()
            .and_then(Estimate::persisted_id)
            .cloned()
            .ok_or(CheckoutError::NoPersistedEstimate)?;
        let service = state.service().ok_or(CheckoutError::NoService)?;

        let update = EstimateUpdate::from_selection(
            estimate_id.clone(),
            service,
            state.assets(),
            state.billing_profile(),
        )?;

        let estimate = Estimate::classify(self.backend.update_estimate(update).await?);
        if estimate.is_draft() {
            return Err(CheckoutError::UnexpectedDraft(estimate.id().clone()));
        }

        self.dispatch(PaymentAction::EstimateRecorded(estimate.clone()));
        tracing::info!(%estimate_id, total = %estimate.total(), "estimate updated");
        self.emit(CheckoutEvent::EstimateUpdated { estimate_id });

        Ok(estimate)
    }
}
