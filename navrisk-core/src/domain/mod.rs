//! Domain types for fund valuation analytics
pub mod fault;
pub mod flow;
pub mod ids;
pub mod series;

pub use fault::{Fault, Metric};
pub use flow::{FlowKind, FlowRecord, FlowSeries, SegmentFlows};
pub use ids::{ConfigHash, DatasetHash, FundId};
pub use series::{DatedSeries, DateWindow, RawObservation, ReturnSeries, SeriesError, ValuationSeries};
