//! Topic handlers feeding the venue status reconciler.
//!
//! Payloads that do not decode, or that fail validation, are permanent
//! failures and go straight to the poison topic. Store failures and
//! timeouts are transient and retried by the router.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ReconcileError, TicketSoldOutSignal, VenueStatusReconciler, VenueStatusUpdate};
use messaging::{
    HandlerError, HandlerResult, Message, MessageHandler, MessageRouter, Publisher, Subscriber,
};
use serde::de::DeserializeOwned;
use venue_store::VenueStore;

pub const UPDATE_VENUE_STATUS_TOPIC: &str = "update_venue_status";
pub const UPDATE_TICKET_SOLD_OUT_TOPIC: &str = "update_ticket_sold_out";

/// Applies operator-asserted venue status from `update_venue_status`.
pub struct UpdateVenueStatusHandler<S: VenueStore> {
    reconciler: Arc<VenueStatusReconciler<S>>,
}

impl<S: VenueStore> UpdateVenueStatusHandler<S> {
    pub fn new(reconciler: Arc<VenueStatusReconciler<S>>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<S: VenueStore + 'static> MessageHandler for UpdateVenueStatusHandler<S> {
    async fn handle(&self, message: &Message) -> HandlerResult {
        let update: VenueStatusUpdate = decode(message)?;
        self.reconciler
            .apply_explicit_status(&update.venue_name, update.is_sold_out, update.is_first_sold_out)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Applies inventory sold-out signals from `update_ticket_sold_out`.
pub struct UpdateTicketSoldOutHandler<S: VenueStore> {
    reconciler: Arc<VenueStatusReconciler<S>>,
}

impl<S: VenueStore> UpdateTicketSoldOutHandler<S> {
    pub fn new(reconciler: Arc<VenueStatusReconciler<S>>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<S: VenueStore + 'static> MessageHandler for UpdateTicketSoldOutHandler<S> {
    async fn handle(&self, message: &Message) -> HandlerResult {
        let signal: TicketSoldOutSignal = decode(message)?;
        self.reconciler
            .apply_sold_out_signal(&signal.venue_name, signal.is_sold_out)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Registers both status-change handlers on `router`.
pub fn register_handlers<B, S>(
    router: &mut MessageRouter<B>,
    reconciler: Arc<VenueStatusReconciler<S>>,
) where
    B: Publisher + Subscriber + Clone + 'static,
    S: VenueStore + 'static,
{
    router
        .add_handler(
            "update_venue_status_handler",
            UPDATE_VENUE_STATUS_TOPIC,
            UpdateVenueStatusHandler::new(Arc::clone(&reconciler)),
        )
        .add_handler(
            "update_ticket_sold_out_handler",
            UPDATE_TICKET_SOLD_OUT_TOPIC,
            UpdateTicketSoldOutHandler::new(reconciler),
        );
}

fn decode<T: DeserializeOwned>(message: &Message) -> Result<T, HandlerError> {
    serde_json::from_slice(&message.payload)
        .map_err(|e| HandlerError::permanent(format!("invalid payload: {e}")))
}

fn classify(err: ReconcileError) -> HandlerError {
    if err.is_retryable() {
        HandlerError::transient(err.to_string())
    } else {
        HandlerError::permanent(err.to_string())
    }
}
