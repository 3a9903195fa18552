//! Single-assignment futures for in-flight calculations.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pricer_core::results::ResultValue;
use tracing::{debug, warn};

use super::risk_result::RiskResult;
use crate::config::RiskConfig;
use crate::context::{self, ContextId};
use crate::error::RiskError;

/// Final state of a future: a result or the reason there is none.
pub type Outcome = Result<RiskResult, RiskError>;

type Callback = Box<dyn FnOnce(&Outcome) + Send>;

enum Slot {
    Pending(Vec<Callback>),
    Done(Outcome),
}

struct FutureState {
    slot: Mutex<Slot>,
    ready: Condvar,
    origin: Option<ContextId>,
    owners: AtomicUsize,
    children: Vec<PricingFuture>,
    owns_children: bool,
    released: AtomicBool,
}

impl FutureState {
    /// Gives up the claims on owned children, once. Returns the children
    /// whose last claim this was.
    fn release_children(&self) -> Vec<&PricingFuture> {
        if !self.owns_children || self.released.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        self.children
            .iter()
            .filter(|child| child.0.owners.fetch_sub(1, Ordering::AcqRel) == 1)
            .collect()
    }
}

impl Drop for FutureState {
    fn drop(&mut self) {
        self.release_children();
    }
}

/// Handle to a value that a pricing service will produce.
///
/// Clones share state: every clone observes the same resolution. A future
/// is resolved exactly once, either with a [`RiskResult`], a failure, or by
/// cancellation.
///
/// # Examples
///
/// ```
/// use pricer_core::results::ResultValue;
/// use pricer_core::types::{Date, MarketContext, RiskKey, RiskMeasure};
/// use pricer_risk::future::PricingFuture;
///
/// let d = Date::from_ymd(2024, 1, 2).unwrap();
/// let key = RiskKey::new("Risk", d, MarketContext::close(d, "NYC"), RiskMeasure::new("Price"));
///
/// let price = PricingFuture::new();
/// let doubled = price.mul(2.0).unwrap();
/// assert!(!doubled.done());
///
/// price.set_value(ResultValue::scalar(key, 21.0)).unwrap();
/// assert_eq!(doubled.result(None).unwrap().as_f64(), Some(42.0));
/// ```
#[derive(Clone)]
pub struct PricingFuture(Arc<FutureState>);

/// Right-hand side of future arithmetic.
#[derive(Clone, Debug)]
pub enum Operand {
    /// A number broadcast over every value.
    Number(f64),
    /// Another future, composed once both resolve.
    Future(PricingFuture),
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<PricingFuture> for Operand {
    fn from(f: PricingFuture) -> Self {
        Operand::Future(f)
    }
}

impl From<&PricingFuture> for Operand {
    fn from(f: &PricingFuture) -> Self {
        Operand::Future(f.clone())
    }
}

impl Default for PricingFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingFuture {
    /// A pending future.
    pub fn new() -> Self {
        Self::build(None, Vec::new())
    }

    /// A pending future produced under a pricing context.
    pub(crate) fn pending_in(origin: ContextId) -> Self {
        Self::build(Some(origin), Vec::new())
    }

    /// A pending future over children, owning them for cancellation if
    /// `owns_children`.
    pub(crate) fn with_children(origin: Option<ContextId>, children: Vec<PricingFuture>, owns_children: bool) -> Self {
        Self::build_with(origin, children, owns_children)
    }

    fn build(origin: Option<ContextId>, children: Vec<PricingFuture>) -> Self {
        Self::build_with(origin, children, false)
    }

    fn build_with(origin: Option<ContextId>, children: Vec<PricingFuture>, owns_children: bool) -> Self {
        PricingFuture(Arc::new(FutureState {
            slot: Mutex::new(Slot::Pending(Vec::new())),
            ready: Condvar::new(),
            origin,
            owners: AtomicUsize::new(0),
            children,
            owns_children,
            released: AtomicBool::new(false),
        }))
    }

    /// A future already holding a result.
    pub fn resolved(result: RiskResult) -> Self {
        let future = Self::new();
        *future.0.slot.lock() = Slot::Done(Ok(result));
        future
    }

    /// A future already holding a value.
    pub fn from_value(value: ResultValue) -> Self {
        Self::resolved(RiskResult::Value(value))
    }

    /// The context that will produce this future, if any.
    pub fn origin(&self) -> Option<ContextId> {
        self.0.origin
    }

    /// Whether the future has been resolved, failed or cancelled.
    pub fn done(&self) -> bool {
        matches!(*self.0.slot.lock(), Slot::Done(_))
    }

    /// Whether the future was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.0.slot.lock(), Slot::Done(Err(RiskError::Cancelled)))
    }

    /// The outcome, if the future is done. Never blocks.
    pub fn try_result(&self) -> Option<Outcome> {
        match &*self.0.slot.lock() {
            Slot::Done(outcome) => Some(outcome.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Blocks until the future resolves or the timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`RiskError::Timeout`] if the wait exceeds `timeout`
    /// - [`RiskError::Cancelled`] if the future was cancelled
    /// - [`RiskError::Failed`] if the calculation failed
    /// - [`RiskError::Reentrant`] if called inside the pricing context that
    ///   has yet to dispatch this future
    pub fn result(&self, timeout: Option<Duration>) -> Outcome {
        let mut slot = self.0.slot.lock();
        if let Slot::Done(outcome) = &*slot {
            return outcome.clone();
        }
        if self.0.origin.map_or(false, context::is_active) {
            return Err(RiskError::Reentrant);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Slot::Done(outcome) = &*slot {
                return outcome.clone();
            }
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if self.0.ready.wait_until(&mut slot, deadline).timed_out() {
                        if let Slot::Done(outcome) = &*slot {
                            return outcome.clone();
                        }
                        warn!(?timeout, "timed out waiting for pricing result");
                        return Err(RiskError::Timeout(timeout));
                    }
                }
                _ => self.0.ready.wait(&mut slot),
            }
        }
    }

    /// Blocks using the configured default timeout.
    pub fn result_default(&self, config: &RiskConfig) -> Outcome {
        self.result(config.result_timeout())
    }

    /// Resolves the future with a result.
    ///
    /// # Errors
    ///
    /// [`RiskError::AlreadyResolved`] if the future is already done, or
    /// [`RiskError::Cancelled`] if it was cancelled.
    pub fn set_result(&self, result: RiskResult) -> Result<(), RiskError> {
        self.complete(Ok(result))
    }

    /// Resolves the future with a value.
    pub fn set_value(&self, value: ResultValue) -> Result<(), RiskError> {
        self.complete(Ok(RiskResult::Value(value)))
    }

    /// Fails the future.
    pub fn set_failure(&self, message: impl Into<String>) -> Result<(), RiskError> {
        self.complete(Err(RiskError::Failed(message.into())))
    }

    pub(crate) fn complete(&self, outcome: Outcome) -> Result<(), RiskError> {
        let callbacks = {
            let mut slot = self.0.slot.lock();
            match &mut *slot {
                Slot::Done(Err(RiskError::Cancelled)) => return Err(RiskError::Cancelled),
                Slot::Done(_) => return Err(RiskError::AlreadyResolved),
                Slot::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *slot = Slot::Done(outcome.clone());
                    callbacks
                }
            }
        };
        self.0.ready.notify_all();
        for callback in callbacks {
            callback(&outcome);
        }
        Ok(())
    }

    /// Registers a callback run once the future is done.
    ///
    /// Runs immediately on the calling thread if the future is already
    /// done, otherwise on the thread that resolves it. Callbacks must not
    /// block.
    pub fn add_done_callback(&self, callback: impl FnOnce(&Outcome) + Send + 'static) {
        let outcome = {
            let mut slot = self.0.slot.lock();
            match &mut *slot {
                Slot::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                Slot::Done(outcome) => outcome.clone(),
            }
        };
        callback(&outcome);
    }

    /// A future holding `f` applied to this future's result.
    pub fn map<F>(&self, f: F) -> PricingFuture
    where
        F: FnOnce(RiskResult) -> Result<RiskResult, RiskError> + Send + 'static,
    {
        let target = Self::build(self.0.origin, Vec::new());
        let sink = target.clone();
        self.add_done_callback(move |outcome| {
            if let Err(err) = sink.complete(outcome.clone().and_then(f)) {
                debug!(%err, "mapped result discarded");
            }
        });
        target
    }

    /// A future holding the sum of this future and `other`.
    ///
    /// Adding a number shifts every value; adding a future composes the
    /// two results once both resolve, the right operand winning where they
    /// overlap.
    pub fn add(&self, other: impl Into<Operand>) -> PricingFuture {
        match other.into() {
            Operand::Number(n) => self.map(move |r| r.shift(n)),
            Operand::Future(other) => super::composite::composite(
                vec![self.clone(), other],
                super::composite::Aggregation::custom(|mut results| {
                    let rhs = results.pop();
                    let lhs = results.pop();
                    match (lhs, rhs) {
                        (Some(lhs), Some(rhs)) => lhs.compose(&rhs),
                        _ => Err(RiskError::InvalidOperand("addition needs two results".into())),
                    }
                }),
            ),
        }
    }

    /// A future holding every value of this future scaled by a number.
    ///
    /// # Errors
    ///
    /// [`RiskError::InvalidOperand`] if `other` is not a number.
    pub fn mul(&self, other: impl Into<Operand>) -> Result<PricingFuture, RiskError> {
        match other.into() {
            Operand::Number(n) => Ok(self.map(move |r| r.scale(n))),
            Operand::Future(_) => Err(RiskError::InvalidOperand(
                "results can only be multiplied by a number".to_string(),
            )),
        }
    }

    /// Cancels the future if it is still pending.
    ///
    /// A composite that owns its children releases them: each child is
    /// cancelled only once no other owning composite still claims it.
    /// Children of a non-owning composite, and sources of mapped futures,
    /// are left alone. Returns whether this call cancelled the future.
    pub fn cancel(&self) -> bool {
        let cancelled = self.complete(Err(RiskError::Cancelled)).is_ok();
        if cancelled {
            for child in self.0.release_children() {
                child.cancel();
            }
        }
        cancelled
    }

    pub(crate) fn claim(&self) {
        self.0.owners.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn downgrade(&self) -> WeakFuture {
        WeakFuture(Arc::downgrade(&self.0))
    }

    /// Whether two handles share the same state.
    pub fn ptr_eq(&self, other: &PricingFuture) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A handle that does not keep the future alive.
#[derive(Clone)]
pub(crate) struct WeakFuture(Weak<FutureState>);

impl WeakFuture {
    pub(crate) fn upgrade(&self) -> Option<PricingFuture> {
        self.0.upgrade().map(PricingFuture)
    }
}

impl fmt::Debug for PricingFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.slot.lock() {
            Slot::Pending(_) => write!(f, "PricingFuture(pending)"),
            Slot::Done(Ok(result)) => write!(f, "PricingFuture({:?})", result),
            Slot::Done(Err(err)) => write!(f, "PricingFuture(error: {})", err),
        }
    }
}
