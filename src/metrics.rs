/*
 * Prometheus counters for quotes, approvals, swaps and checkouts
 */

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use crate::models::{Result, SwapdeskError};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub quotes_total: IntCounter,
    pub approvals_submitted_total: IntCounter,
    pub swaps_submitted_total: IntCounter,
    /// Labelled by `outcome` (`done`, `failed`) and the last `stage` reached.
    pub checkouts_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("swapdesk".to_string()), None)
            .map_err(|e| SwapdeskError::ConfigError(format!("Failed to create registry: {e}")))?;

        let quotes_total = IntCounter::new("quotes_total", "Quoter calls issued")
            .map_err(metric_error)?;
        let approvals_submitted_total =
            IntCounter::new("approvals_submitted_total", "Approval transactions submitted")
                .map_err(metric_error)?;
        let swaps_submitted_total =
            IntCounter::new("swaps_submitted_total", "Swap transactions submitted")
                .map_err(metric_error)?;
        let checkouts_total = IntCounterVec::new(
            Opts::new("checkouts_total", "Checkout attempts by outcome"),
            &["outcome", "stage"],
        )
        .map_err(metric_error)?;

        registry.register(Box::new(quotes_total.clone())).map_err(metric_error)?;
        registry
            .register(Box::new(approvals_submitted_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(swaps_submitted_total.clone()))
            .map_err(metric_error)?;
        registry.register(Box::new(checkouts_total.clone())).map_err(metric_error)?;

        Ok(Self {
            registry,
            quotes_total,
            approvals_submitted_total,
            swaps_submitted_total,
            checkouts_total,
        })
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer)
            .map_err(|e| SwapdeskError::CalculationError(format!("Metrics are not UTF-8: {e}")))
    }
}

fn metric_error(e: prometheus::Error) -> SwapdeskError {
    SwapdeskError::ConfigError(format!("Metrics error: {e}"))
}
