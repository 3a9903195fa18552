//! Flattening portfolios into frames and rebuilding them.
//!
//! One row per instrument, depth-first. Enclosing sub-portfolios are named
//! in `portfolio_name_<level>` columns (unnamed ones as `Portfolio_<pos>`),
//! followed by `instrument_kind`, `instrument_name` and one column per
//! property.

use pricer_core::frame::{Cell, Frame};
use pricer_core::types::FrameError;

use super::{Instrument, Portfolio, Priceable};
use crate::error::RiskError;

/// Column holding the instrument kind.
pub const INSTRUMENT_KIND_COLUMN: &str = "instrument_kind";

/// Column holding the instrument name.
pub const INSTRUMENT_NAME_COLUMN: &str = "instrument_name";

/// Name of the column for sub-portfolios at a nesting level.
pub fn portfolio_column(level: usize) -> String {
    format!("portfolio_name_{}", level)
}

/// Name used for an unnamed sub-portfolio at a position.
pub(crate) fn portfolio_label(portfolio: &Portfolio, position: usize) -> String {
    portfolio
        .name()
        .map_or_else(|| format!("Portfolio_{}", position), str::to_string)
}

fn collect<'a>(portfolio: &'a Portfolio, levels: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a Instrument)>) {
    for (i, priceable) in portfolio.priceables.iter().enumerate() {
        match priceable {
            Priceable::Instrument(instrument) => out.push((levels.clone(), instrument)),
            Priceable::Portfolio(sub) => {
                levels.push(portfolio_label(sub, i));
                collect(sub, levels, out);
                levels.pop();
            }
        }
    }
}

impl Portfolio {
    /// Flattens the portfolio, one row per instrument.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricer_risk::portfolio::{Instrument, Portfolio, Priceable};
    ///
    /// let book = Portfolio::new(vec![
    ///     Priceable::from(Instrument::new("IRSwap").with_name("a").with_property("notional", 1e6)),
    ///     Portfolio::named("fx", [Instrument::new("FXForward")]).into(),
    /// ]);
    /// let frame = book.to_frame();
    ///
    /// assert_eq!(
    ///     frame.columns(),
    ///     &["portfolio_name_0", "instrument_kind", "instrument_name", "notional"]
    /// );
    /// assert_eq!(Portfolio::from_frame(&frame).unwrap(), book);
    /// ```
    pub fn to_frame(&self) -> Frame {
        let mut entries = Vec::new();
        collect(self, &mut Vec::new(), &mut entries);
        let depth = entries.iter().map(|(levels, _)| levels.len()).max().unwrap_or(0);

        let mut properties: Vec<&str> = Vec::new();
        for (_, instrument) in &entries {
            for key in instrument.properties().keys() {
                if !properties.contains(&key.as_str()) {
                    properties.push(key);
                }
            }
        }

        let mut columns: Vec<String> = (0..depth).map(portfolio_column).collect();
        columns.push(INSTRUMENT_KIND_COLUMN.to_string());
        columns.push(INSTRUMENT_NAME_COLUMN.to_string());
        columns.extend(properties.iter().map(|p| p.to_string()));

        let rows = entries
            .iter()
            .map(|(levels, instrument)| {
                let mut row: Vec<Cell> = (0..depth)
                    .map(|l| levels.get(l).map_or(Cell::Missing, |n| Cell::text(n.as_str())))
                    .collect();
                row.push(Cell::text(instrument.kind()));
                row.push(instrument.name().map_or(Cell::Missing, Cell::text));
                row.extend(properties.iter().map(|p| match instrument.property(p) {
                    Some(super::PropertyValue::Number(v)) => Cell::Number(*v),
                    Some(super::PropertyValue::Text(s)) => Cell::text(s.as_str()),
                    None => Cell::Missing,
                }));
                row
            })
            .collect();
        Frame::new(columns, rows)
    }

    /// Rebuilds a portfolio from [`to_frame`](Self::to_frame) output.
    ///
    /// Consecutive rows naming the same sub-portfolio are grouped into it.
    ///
    /// # Errors
    ///
    /// [`RiskError::Frame`] if `instrument_kind` is missing, and
    /// [`RiskError::InvalidOperand`] for a row without a kind.
    pub fn from_frame(frame: &Frame) -> Result<Portfolio, RiskError> {
        let kind_index = frame
            .column_index(INSTRUMENT_KIND_COLUMN)
            .ok_or_else(|| FrameError::UnknownColumn(INSTRUMENT_KIND_COLUMN.to_string()))?;
        let name_index = frame.column_index(INSTRUMENT_NAME_COLUMN);
        let level_indices: Vec<usize> = (0..)
            .map_while(|level| frame.column_index(&portfolio_column(level)))
            .collect();
        let property_indices: Vec<(usize, &str)> = frame
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != kind_index && Some(*i) != name_index && !level_indices.contains(i))
            .map(|(i, c)| (i, c.as_str()))
            .collect();

        let mut root = Portfolio::default();
        for (row_number, row) in frame.rows().iter().enumerate() {
            let kind = row[kind_index].as_str().ok_or_else(|| {
                RiskError::InvalidOperand(format!("row {} has no {}", row_number, INSTRUMENT_KIND_COLUMN))
            })?;
            let mut instrument = Instrument::new(kind);
            if let Some(name) = name_index.and_then(|i| row[i].as_str()) {
                instrument = instrument.with_name(name);
            }
            for &(i, column) in &property_indices {
                instrument = match &row[i] {
                    Cell::Missing => instrument,
                    Cell::Number(v) => instrument.with_property(column, *v),
                    Cell::Text(s) => instrument.with_property(column, s.as_str()),
                    Cell::Date(d) => instrument.with_property(column, d.to_string()),
                };
            }
            let levels: Vec<&str> = level_indices.iter().map_while(|&i| row[i].as_str()).collect();
            root.insert_at(&levels, instrument);
        }
        Ok(root)
    }

    fn insert_at(&mut self, levels: &[&str], instrument: Instrument) {
        let Some((name, rest)) = levels.split_first() else {
            self.priceables.push(Priceable::Instrument(instrument));
            return;
        };
        let reuse = matches!(self.priceables.last(), Some(Priceable::Portfolio(p)) if p.name() == Some(*name));
        if !reuse {
            self.priceables
                .push(Priceable::Portfolio(Portfolio::named(*name, Vec::<Priceable>::new())));
        }
        if let Some(Priceable::Portfolio(sub)) = self.priceables.last_mut() {
            sub.insert_at(rest, instrument);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Portfolio {
        Portfolio::named(
            "book",
            vec![
                Priceable::from(
                    Instrument::new("IRSwap")
                        .with_name("5y")
                        .with_property("notional", 1e8)
                        .with_property("currency", "EUR"),
                ),
                Portfolio::new(vec![
                    Priceable::from(Instrument::new("IRSwaption").with_property("strike", 0.03)),
                    Portfolio::named("deep", [Instrument::new("IRCap").with_name("cap")]).into(),
                ])
                .into(),
                Instrument::new("FXForward").with_name("eurusd").into(),
            ],
        )
    }

    #[test]
    fn test_to_frame_layout() {
        let frame = book().to_frame();
        assert_eq!(
            frame.columns(),
            &[
                "portfolio_name_0",
                "portfolio_name_1",
                "instrument_kind",
                "instrument_name",
                "notional",
                "currency",
                "strike"
            ]
        );
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.get(1, "portfolio_name_0"), Some(&Cell::text("Portfolio_1")));
        assert_eq!(frame.get(2, "portfolio_name_1"), Some(&Cell::text("deep")));
        assert_eq!(frame.get(1, "instrument_name"), Some(&Cell::Missing));
        assert_eq!(frame.get(0, "portfolio_name_0"), Some(&Cell::Missing));
    }

    #[test]
    fn test_round_trip_preserves_instruments() {
        let original = book();
        let rebuilt = Portfolio::from_frame(&original.to_frame()).unwrap();
        assert_eq!(rebuilt, original);

        let before: Vec<_> = original.all_instruments().into_iter().cloned().collect();
        let after: Vec<_> = rebuilt.all_instruments().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_from_frame_requires_kind() {
        let frame = Frame::new(vec![INSTRUMENT_NAME_COLUMN.to_string()], vec![vec![Cell::text("x")]]);
        assert!(matches!(
            Portfolio::from_frame(&frame),
            Err(RiskError::Frame(FrameError::UnknownColumn(_)))
        ));
    }
}
