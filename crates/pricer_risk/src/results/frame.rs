//! Flattening result trees into frames.
//!
//! This module provides:
//! - Raw frames: one row per value, tagged with the enclosing
//!   sub-portfolios (`portfolio_name_<level>`), the instrument and the
//!   risk measure
//! - Pivoted views, either requested explicitly or chosen from the shape of
//!   the results
//!
//! # Default pivots
//!
//! | dated | multi-measure | single level | index | columns |
//! |-------|---------------|--------------|-------|---------|
//! | yes | yes | any | `dates` | portfolios, `instrument_name`, `risk_measure` |
//! | yes | no | any | `dates` | portfolios, `instrument_name` |
//! | no | no | no | portfolios | `instrument_name` |
//! | no | yes | no | portfolios, `instrument_name` | `risk_measure` |
//! | no | any | yes | `instrument_name` | `risk_measure` |
//!
//! Bucketed (table) results and results carrying errors are never
//! pivoted by default.

use std::time::Duration;

use pricer_core::frame::{Cell, Frame, PivotSpec, PivotTable};
use pricer_core::results::{DATE_COLUMN, VALUE_COLUMN};
use pricer_core::types::RiskMeasure;

use super::tree::{PortfolioRiskResult, ResultNode};
use crate::config::{RiskConfig, DEFAULT_MISSING_MARKER};
use crate::error::RiskError;
use crate::future::{RiskResult, RISK_MEASURE_COLUMN};
use crate::portfolio::frame::{portfolio_column, portfolio_label, INSTRUMENT_NAME_COLUMN};

/// How to lay out a flattened tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FrameSpec {
    /// Pivot chosen from the shape of the results.
    #[default]
    Default,
    /// No pivot.
    Raw,
    /// An explicit pivot over the raw columns.
    Pivot(PivotSpec),
}

/// A flattened tree.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameView {
    /// One row per value.
    Raw(Frame),
    /// Values pivoted into rows and columns.
    Pivot(PivotTable),
}

impl FrameView {
    /// The raw frame, if not pivoted.
    pub fn as_raw(&self) -> Option<&Frame> {
        match self {
            FrameView::Raw(frame) => Some(frame),
            FrameView::Pivot(_) => None,
        }
    }

    /// The pivot table, if pivoted.
    pub fn as_pivot(&self) -> Option<&PivotTable> {
        match self {
            FrameView::Pivot(table) => Some(table),
            FrameView::Raw(_) => None,
        }
    }
}

impl PortfolioRiskResult {
    /// Flattens the tree, waiting for every leaf.
    ///
    /// Absent sub-portfolio levels are filled with
    /// [`DEFAULT_MISSING_MARKER`] before pivoting.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use pricer_core::frame::Cell;
    /// use pricer_core::results::ResultValue;
    /// use pricer_core::types::{Date, RiskMeasure};
    /// use pricer_risk::context::{InlinePricingService, PricingContext};
    /// use pricer_risk::portfolio::{Instrument, Portfolio};
    /// use pricer_risk::results::FrameSpec;
    ///
    /// let service = Arc::new(InlinePricingService::new(|req| {
    ///     Ok(ResultValue::scalar(req.key.clone(), 1.5))
    /// }));
    /// let context = PricingContext::new(Date::from_ymd(2024, 1, 2).unwrap(), service);
    /// let book = Portfolio::new([Instrument::new("IRSwap").with_name("5y")]);
    /// let tree = book.calc(&[RiskMeasure::new("Price")], &context).unwrap();
    ///
    /// let view = tree.to_frame(&FrameSpec::Default).unwrap();
    /// let pivot = view.as_pivot().unwrap();
    /// assert_eq!(pivot.get(&[Cell::text("5y")], &[Cell::text("Price")]), Some(1.5));
    /// ```
    pub fn to_frame(&self, spec: &FrameSpec) -> Result<FrameView, RiskError> {
        self.frame_view(spec, DEFAULT_MISSING_MARKER, None)
    }

    /// [`to_frame`](Self::to_frame) with the missing marker and wait timeout
    /// taken from configuration.
    pub fn to_frame_with(&self, spec: &FrameSpec, config: &RiskConfig) -> Result<FrameView, RiskError> {
        self.frame_view(spec, &config.missing_marker, config.result_timeout())
    }

    fn frame_view(&self, spec: &FrameSpec, marker: &str, timeout: Option<Duration>) -> Result<FrameView, RiskError> {
        let (frame, depth) = self.raw_frame(marker, timeout)?;
        let pivot = match spec {
            FrameSpec::Raw => return Ok(FrameView::Raw(frame)),
            FrameSpec::Pivot(pivot) => pivot.clone(),
            FrameSpec::Default => match default_pivot(&frame, depth, self.risk_measures().len() > 1) {
                Some(pivot) => pivot,
                None => return Ok(FrameView::Raw(frame)),
            },
        };
        Ok(FrameView::Pivot(frame.pivot(&pivot)?))
    }

    fn raw_frame(&self, marker: &str, timeout: Option<Duration>) -> Result<(Frame, usize), RiskError> {
        let mut frames = Vec::new();
        self.collect_frames(&mut Vec::new(), timeout, &mut frames)?;
        let depth = frames.iter().map(|(levels, _)| *levels).max().unwrap_or(0);
        let frame = Frame::concat(frames.into_iter().map(|(_, frame)| frame));

        let levels: Vec<String> = (0..depth).map(portfolio_column).collect();
        let mut order: Vec<&str> = levels.iter().map(String::as_str).collect();
        order.push(INSTRUMENT_NAME_COLUMN);
        order.push(RISK_MEASURE_COLUMN);
        for column in frame.columns() {
            if !order.contains(&column.as_str()) {
                order.push(column);
            }
        }
        let mut frame = frame.select(&order)?;
        frame.fill_missing(&levels, marker);
        Ok((frame, depth))
    }

    fn collect_frames(
        &self,
        levels: &mut Vec<String>,
        timeout: Option<Duration>,
        out: &mut Vec<(usize, Frame)>,
    ) -> Result<(), RiskError> {
        for (i, (node, priceable)) in self.nodes().iter().zip(self.portfolio().priceables()).enumerate() {
            if let ResultNode::Portfolio(sub) = node {
                levels.push(portfolio_label(sub.portfolio(), i));
                sub.collect_frames(levels, timeout, out)?;
                levels.pop();
                continue;
            }
            let mut frame = leaf_frame(&node.result(timeout)?, self.risk_measures());
            let name = priceable
                .as_instrument()
                .map_or_else(|| format!("Instrument_{}", i), |instrument| instrument.display_name(i));
            frame.insert_column(0, INSTRUMENT_NAME_COLUMN, Cell::text(name));
            for (level, label) in levels.iter().enumerate() {
                frame.insert_column(level, portfolio_column(level), Cell::text(label.as_str()));
            }
            out.push((levels.len(), frame));
        }
        Ok(())
    }
}

fn leaf_frame(result: &RiskResult, measures: &[RiskMeasure]) -> Frame {
    match result {
        RiskResult::Value(value) => {
            let measure = match measures {
                [only] => only.name(),
                _ => value.key().risk_measure.name(),
            };
            let mut frame = value.raw_frame();
            frame.insert_column(0, RISK_MEASURE_COLUMN, Cell::text(measure));
            frame
        }
        RiskResult::Measures(m) => m.raw_frame(),
        RiskResult::Sequence(items) => Frame::concat(items.iter().map(|r| leaf_frame(r, measures))),
    }
}

fn default_pivot(frame: &Frame, depth: usize, multi_measure: bool) -> Option<PivotSpec> {
    let numeric = frame.column(VALUE_COLUMN).ok()?.iter().all(|c| c.as_f64().is_some());
    let bucketed = frame.columns().iter().any(|c| {
        !c.starts_with("portfolio_name_")
            && ![INSTRUMENT_NAME_COLUMN, RISK_MEASURE_COLUMN, DATE_COLUMN, VALUE_COLUMN].contains(&c.as_str())
    });
    if !numeric || bucketed {
        return None;
    }

    let dated = frame.has_column(DATE_COLUMN);
    let portfolios: Vec<String> = (0..depth).map(portfolio_column).collect();
    let with = |extra: &[&str]| -> Vec<String> {
        portfolios
            .iter()
            .cloned()
            .chain(extra.iter().map(|c| c.to_string()))
            .collect()
    };

    let spec = match (dated, multi_measure, depth == 0) {
        (true, true, _) => PivotSpec::new(
            VALUE_COLUMN,
            [DATE_COLUMN],
            with(&[INSTRUMENT_NAME_COLUMN, RISK_MEASURE_COLUMN]),
        ),
        (true, false, _) => PivotSpec::new(VALUE_COLUMN, [DATE_COLUMN], with(&[INSTRUMENT_NAME_COLUMN])),
        (false, _, true) => PivotSpec::new(VALUE_COLUMN, [INSTRUMENT_NAME_COLUMN], [RISK_MEASURE_COLUMN]),
        (false, false, false) => PivotSpec::new(VALUE_COLUMN, with(&[]), [INSTRUMENT_NAME_COLUMN]),
        (false, true, false) => {
            PivotSpec::new(VALUE_COLUMN, with(&[INSTRUMENT_NAME_COLUMN]), [RISK_MEASURE_COLUMN])
        }
    };
    Some(spec)
}
