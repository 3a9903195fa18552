//! Portfolio-shaped result trees.
//!
//! This module provides:
//! - `tree`: [`PortfolioRiskResult`] and its [`ResultNode`] entries
//! - `index`: Lookup by measure, date, instrument, name, position or path
//! - `algebra`: Adding trees together and broadcasting numbers over them
//! - `aggregate`: Summing a tree into a single result
//! - `frame`: Flattening and pivoting a tree

pub mod aggregate;
pub mod algebra;
pub mod frame;
pub mod index;
pub mod tree;

pub use frame::{FrameSpec, FrameView};
pub use index::{Indexed, ResultIndex};
pub use tree::{PortfolioRiskResult, ResultNode};
