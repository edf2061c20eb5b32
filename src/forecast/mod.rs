pub mod analyzer;
pub mod arima;

pub use analyzer::{ForecastRow, ForecastSummary, TrendAnalyzer};
pub use arima::{ArimaFit, ArimaOrder, AutoArima};
