//! Synthetic event source
//!
//! Stands in for a real log stream: emits a random event from a fixed
//! catalog of service log lines at a steady interval.

use crate::events::{EventDraft, Level};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Catalog of log lines the synthetic source draws from
pub fn predefined_events() -> Vec<EventDraft> {
    vec![
        EventDraft::new(
            Level::Info,
            "auth-service",
            "User authentication successful for user: alex_g",
        ),
        EventDraft::new(Level::Info, "api-gateway", "Request received: GET /v1/products"),
        EventDraft::new(
            Level::Warn,
            "payment-service",
            "High latency detected in payment processing > 500ms",
        ),
        EventDraft::new(
            Level::Error,
            "db-connector",
            "Database connection failed: invalid credentials for user 'prod_user'",
        ),
        EventDraft::new(
            Level::Info,
            "product-catalog",
            "Product cache refreshed successfully",
        ),
        EventDraft::new(
            Level::Info,
            "shipping-service",
            "Shipping rates calculated for order #84321",
        ),
        EventDraft::new(
            Level::Error,
            "user-profile-api",
            "API request failed: parameter 'userId' is null",
        ),
        EventDraft::new(
            Level::Warn,
            "inventory-manager",
            "Low stock warning for SKU: XYZ-123",
        ),
        EventDraft::new(
            Level::Error,
            "checkout-service",
            "Timeout connecting to service 'payment-gateway' after 3000ms",
        ),
        EventDraft::new(
            Level::Info,
            "auth-service",
            "User logout successful for user: jane_d",
        ),
    ]
}

/// Periodic random event generator
pub struct SyntheticSource {
    catalog: Vec<EventDraft>,
    interval: Duration,
    rng: StdRng,
}

impl SyntheticSource {
    /// Create a source over the predefined catalog
    pub fn new(interval: Duration) -> Self {
        Self::with_catalog(predefined_events(), interval)
    }

    pub fn with_catalog(catalog: Vec<EventDraft>, interval: Duration) -> Self {
        Self {
            catalog,
            interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make the pick sequence reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Draw the next event, or `None` for an empty catalog
    pub fn next_event(&mut self) -> Option<EventDraft> {
        self.catalog.choose(&mut self.rng).cloned()
    }

    /// Run the source on its own task
    ///
    /// Emits one event per interval until `shutdown` flips to `true`, its
    /// sender is dropped, or the receiving side of `sender` goes away.
    pub fn spawn(
        mut self,
        sender: mpsc::Sender<EventDraft>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Synthetic source started ({} events, every {:?})",
                self.catalog.len(),
                self.interval
            );
            let mut ticker = tokio::time::interval(self.interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(draft) = self.next_event() else {
                            warn!("Synthetic source has an empty catalog, stopping");
                            break;
                        };
                        debug!("Generated {} event from {}", draft.level, draft.source);
                        if sender.send(draft).await.is_err() {
                            info!("Event receiver closed, stopping synthetic source");
                            break;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Synthetic source stopped");
        })
    }
}
