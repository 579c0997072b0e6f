//! Run-time output: the telemetry sink and the time-series writer.

mod tseries;

pub use tseries::{NullSink, StepRecord, TelemetrySink, TimeSeries};
