//! The pricing service collaborator.
//!
//! The engine never prices anything itself: leaf futures come from a
//! [`PricingService`]. [`ThreadPoolPricingService`] runs a pricing function
//! on a caller-managed rayon pool; [`InlinePricingService`] prices on the
//! submitting thread.

use std::fmt;
use std::sync::Arc;

use pricer_core::results::ResultValue;
use pricer_core::types::RiskKey;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::{ConfigError, RiskConfig};
use crate::future::PricingFuture;
use crate::portfolio::Instrument;

/// One leaf calculation: an instrument under a fully specified key.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskRequest {
    /// The instrument to price.
    pub instrument: Instrument,
    /// Measure, date, market, parameters and scenario.
    pub key: RiskKey,
}

/// Produces one future per request.
///
/// Implementations must be callable concurrently. Each returned future
/// resolves to exactly one value or fails.
pub trait PricingService: Send + Sync {
    /// Submits one request.
    fn submit(&self, request: RiskRequest) -> PricingFuture;

    /// Submits several requests, returning futures in request order.
    fn submit_batch(&self, requests: Vec<RiskRequest>) -> Vec<PricingFuture> {
        requests.into_iter().map(|r| self.submit(r)).collect()
    }
}

/// Function computing the value for a request.
///
/// `Err` carries a calculation failure message; it becomes an error value
/// in the result tree rather than failing the future.
pub type Pricer = Arc<dyn Fn(&RiskRequest) -> Result<ResultValue, String> + Send + Sync>;

fn price(pricer: &Pricer, request: &RiskRequest) -> ResultValue {
    match pricer(request) {
        Ok(value) => value,
        Err(message) => ResultValue::error(request.key.clone(), message),
    }
}

/// Prices requests on a rayon thread pool.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pricer_core::results::ResultValue;
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
/// use pricer_risk::context::{PricingService, RiskRequest, ThreadPoolPricingService};
/// use pricer_risk::portfolio::Instrument;
///
/// let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap());
/// let service = ThreadPoolPricingService::new(pool, |req: &RiskRequest| {
///     Ok(ResultValue::scalar(req.key.clone(), 42.0))
/// });
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let key = RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
/// let future = service.submit(RiskRequest { instrument: Instrument::new("IRSwap"), key });
/// assert_eq!(future.result(None).unwrap().as_f64(), Some(42.0));
/// ```
#[derive(Clone)]
pub struct ThreadPoolPricingService {
    pool: Arc<ThreadPool>,
    pricer: Pricer,
}

impl ThreadPoolPricingService {
    /// Prices on an existing pool.
    pub fn new<F>(pool: Arc<ThreadPool>, pricer: F) -> Self
    where
        F: Fn(&RiskRequest) -> Result<ResultValue, String> + Send + Sync + 'static,
    {
        Self {
            pool,
            pricer: Arc::new(pricer),
        }
    }

    /// Prices on a new pool sized by `config.worker_threads`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ThreadPool`] if the pool cannot be started.
    pub fn from_config<F>(config: &RiskConfig, pricer: F) -> Result<Self, ConfigError>
    where
        F: Fn(&RiskRequest) -> Result<ResultValue, String> + Send + Sync + 'static,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("risk-worker-{}", i))
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
        Ok(Self::new(Arc::new(pool), pricer))
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl PricingService for ThreadPoolPricingService {
    fn submit(&self, request: RiskRequest) -> PricingFuture {
        let future = PricingFuture::new();
        let sink = future.clone();
        let pricer = Arc::clone(&self.pricer);
        self.pool.spawn(move || {
            if sink.is_cancelled() {
                debug!(key = %request.key, "skipping cancelled request");
                return;
            }
            if let Err(err) = sink.set_value(price(&pricer, &request)) {
                debug!(%err, key = %request.key, "priced result discarded");
            }
        });
        future
    }
}

impl fmt::Debug for ThreadPoolPricingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolPricingService")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Prices requests synchronously on the submitting thread.
#[derive(Clone)]
pub struct InlinePricingService {
    pricer: Pricer,
}

impl InlinePricingService {
    /// Creates a service from a pricing function.
    pub fn new<F>(pricer: F) -> Self
    where
        F: Fn(&RiskRequest) -> Result<ResultValue, String> + Send + Sync + 'static,
    {
        Self {
            pricer: Arc::new(pricer),
        }
    }
}

impl PricingService for InlinePricingService {
    fn submit(&self, request: RiskRequest) -> PricingFuture {
        PricingFuture::from_value(price(&self.pricer, &request))
    }
}

impl fmt::Debug for InlinePricingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InlinePricingService")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::{Date, MarketContext, RiskMeasure};
    use std::time::Duration;

    fn request() -> RiskRequest {
        let d = Date::from_ymd(2024, 1, 2).unwrap();
        RiskRequest {
            instrument: Instrument::new("IRSwap").with_name("swap"),
            key: RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price")),
        }
    }

    #[test]
    fn test_thread_pool_service_prices_on_pool() {
        let service = ThreadPoolPricingService::from_config(&RiskConfig::default(), |req| {
            let on_worker = std::thread::current()
                .name()
                .map_or(false, |n| n.starts_with("risk-worker-"));
            if on_worker {
                Ok(ResultValue::scalar(req.key.clone(), 3.0))
            } else {
                Err("priced off the pool".to_string())
            }
        })
        .unwrap();
        assert_eq!(service.threads(), 4);

        let future = service.submit(request());
        let result = future.result(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(result.as_f64(), Some(3.0));
    }

    #[test]
    fn test_pricer_failure_becomes_error_value() {
        let service = InlinePricingService::new(|_| Err("no curve".to_string()));
        let value = service.submit(request()).result(None).unwrap().into_value().unwrap();
        assert!(value.is_error());
        assert_eq!(value.key(), &request().key);
    }

    #[test]
    fn test_submit_batch_keeps_order() {
        let service = InlinePricingService::new(|req| {
            let v = if req.instrument.name() == Some("a") { 1.0 } else { 2.0 };
            Ok(ResultValue::scalar(req.key.clone(), v))
        });
        let mut a = request();
        a.instrument = Instrument::new("IRSwap").with_name("a");
        let futures = service.submit_batch(vec![a, request()]);
        assert_eq!(futures[0].result(None).unwrap().as_f64(), Some(1.0));
        assert_eq!(futures[1].result(None).unwrap().as_f64(), Some(2.0));
    }
}
