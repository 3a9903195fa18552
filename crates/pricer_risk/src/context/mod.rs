//! Pricing contexts.
//!
//! This module provides:
//! - [`ContextId`]: A resolution token minted fresh for every context
//! - [`PricingContext`]: Pricing date(s), market location, parameters and
//!   scenario under which requests are made
//! - [`ContextGuard`]: Batches requests while a context is entered and
//!   dispatches them when the guard drops
//! - `service`: The [`PricingService`] collaborator producing leaf futures
//!
//! Futures produced inside an entered context stay pending until the
//! guard drops, so waiting on them from inside the same context fails
//! with [`RiskError::Reentrant`](crate::error::RiskError::Reentrant)
//! instead of deadlocking.

pub mod service;

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use pricer_core::types::{Date, KeyDates, MarketContext, RiskKey, RiskMeasure};
use tracing::debug;

pub use service::{InlinePricingService, Pricer, PricingService, RiskRequest, ThreadPoolPricingService};

use crate::future::{owning_composite, Aggregation, PricingFuture};
use crate::portfolio::{Instrument, PropertyValue};

/// Provider recorded in keys of requests made through a context.
pub const DEFAULT_PROVIDER: &str = "Risk";

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE: RefCell<Vec<ContextId>> = RefCell::new(Vec::new());
}

/// Token identifying one pricing context.
///
/// Instruments resolved under a context remember its token; result trees
/// only accept lookups by resolved instruments carrying one of their own
/// tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn fresh() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Whether `id` is entered on the current thread.
pub(crate) fn is_active(id: ContextId) -> bool {
    ACTIVE.with(|active| active.borrow().contains(&id))
}

#[derive(Default)]
struct Batch {
    depth: usize,
    requests: Vec<(RiskRequest, PricingFuture)>,
}

/// Where and when requests are priced.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pricer_core::results::ResultValue;
/// use pricer_core::types::{Date, RiskMeasure};
/// use pricer_risk::context::{InlinePricingService, PricingContext};
/// use pricer_risk::error::RiskError;
/// use pricer_risk::portfolio::Instrument;
///
/// let service = Arc::new(InlinePricingService::new(|req| Ok(ResultValue::scalar(req.key.clone(), 1.0))));
/// let context = PricingContext::new(Date::from_ymd(2024, 1, 2).unwrap(), service).with_location("LDN");
/// let swap = Instrument::new("IRSwap");
///
/// let price = {
///     let _guard = context.enter();
///     let price = context.calc(&swap, &RiskMeasure::new("Price"));
///     assert_eq!(price.result(None).unwrap_err(), RiskError::Reentrant);
///     price
/// };
/// assert_eq!(price.result(None).unwrap().as_f64(), Some(1.0));
/// ```
pub struct PricingContext {
    id: ContextId,
    dates: KeyDates,
    location: Option<String>,
    provider: String,
    params: Option<String>,
    scenario: Option<String>,
    service: Arc<dyn PricingService>,
    batch: Mutex<Batch>,
}

impl PricingContext {
    /// A context pricing as of one date.
    pub fn new(pricing_date: Date, service: Arc<dyn PricingService>) -> Self {
        Self::build(KeyDates::Single(pricing_date), service)
    }

    /// A context pricing every date in `dates`.
    pub fn historical(dates: impl IntoIterator<Item = Date>, service: Arc<dyn PricingService>) -> Self {
        let mut dates: Vec<Date> = dates.into_iter().collect();
        dates.sort();
        dates.dedup();
        Self::build(KeyDates::Range(dates), service)
    }

    fn build(dates: KeyDates, service: Arc<dyn PricingService>) -> Self {
        Self {
            id: ContextId::fresh(),
            dates,
            location: None,
            provider: DEFAULT_PROVIDER.to_string(),
            params: None,
            scenario: None,
            service,
            batch: Mutex::new(Batch::default()),
        }
    }

    /// Sets the market data location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets extra request parameters.
    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Sets the scenario applied to the market.
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Sets the provider recorded in keys.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// This context's resolution token.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Pricing date(s).
    pub fn dates(&self) -> &KeyDates {
        &self.dates
    }

    /// Market data location.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Whether the context prices a list of dates.
    pub fn is_historical(&self) -> bool {
        matches!(self.dates, KeyDates::Range(_))
    }

    /// Whether the context is entered on this thread.
    pub fn is_entered(&self) -> bool {
        is_active(self.id)
    }

    /// Enters the context. Requests made until the guard drops are
    /// dispatched together.
    ///
    /// Entering is re-entrant: only the outermost guard dispatches.
    pub fn enter(&self) -> ContextGuard<'_> {
        self.batch.lock().depth += 1;
        ACTIVE.with(|active| active.borrow_mut().push(self.id));
        ContextGuard {
            context: self,
            _thread_bound: PhantomData,
        }
    }

    /// The key for one measure on one date under this context.
    pub fn risk_key(&self, date: Date, measure: &RiskMeasure) -> RiskKey {
        let market = MarketContext {
            date: Some(date),
            location: self.location.clone(),
        };
        let mut key = RiskKey::new(self.provider.clone(), date, market, measure.clone());
        key.params = self.params.clone();
        key.scenario = self.scenario.clone();
        key
    }

    /// Requests one measure for one instrument.
    ///
    /// Historical contexts request one leaf per date and combine them along
    /// the date axis.
    pub fn calc(&self, instrument: &Instrument, measure: &RiskMeasure) -> PricingFuture {
        let leaf = |date: Date| {
            self.request(RiskRequest {
                instrument: instrument.clone(),
                key: self.risk_key(date, measure),
            })
        };
        match &self.dates {
            KeyDates::Single(date) => leaf(*date),
            KeyDates::Range(dates) => owning_composite(
                dates.iter().map(|d| leaf(*d)).collect(),
                Aggregation::historical(dates.iter().map(|d| self.risk_key(*d, measure)).collect()),
            ),
        }
    }

    /// Resolves an instrument under this context.
    pub fn resolve(&self, instrument: &Instrument, properties: IndexMap<String, PropertyValue>) -> Instrument {
        instrument.resolved_in(self.id, properties)
    }

    fn request(&self, request: RiskRequest) -> PricingFuture {
        let mut batch = self.batch.lock();
        if batch.depth > 0 {
            let future = PricingFuture::pending_in(self.id);
            batch.requests.push((request, future.clone()));
            return future;
        }
        drop(batch);
        self.service.submit(request)
    }

    fn dispatch(&self, pending: Vec<(RiskRequest, PricingFuture)>) {
        let (requests, targets): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .filter(|(_, target)| !target.done())
            .unzip();
        if requests.is_empty() {
            return;
        }
        debug!(context = %self.id, requests = requests.len(), "dispatching pricing batch");
        let submitted = self.service.submit_batch(requests);
        for (future, target) in submitted.into_iter().zip(targets) {
            future.add_done_callback(move |outcome| {
                if let Err(err) = target.complete(outcome.clone()) {
                    debug!(%err, "batched result discarded");
                }
            });
        }
    }
}

impl fmt::Debug for PricingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PricingContext")
            .field("id", &self.id)
            .field("dates", &self.dates)
            .field("location", &self.location)
            .field("provider", &self.provider)
            .field("params", &self.params)
            .field("scenario", &self.scenario)
            .finish()
    }
}

/// An entered [`PricingContext`]. Dispatches the batch when the outermost
/// guard drops.
#[must_use = "requests are dispatched when the guard drops"]
pub struct ContextGuard<'a> {
    context: &'a PricingContext,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let id = self.context.id;
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|a| *a == id) {
                active.remove(pos);
            }
        });

        let pending = {
            let mut batch = self.context.batch.lock();
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth == 0 {
                std::mem::take(&mut batch.requests)
            } else {
                Vec::new()
            }
        };
        self.context.dispatch(pending);
    }
}
