//! Tapline monitor service
//!
//! Library half of the `tapline-monitor` binary: the glue between a
//! connected [`network::ProxyClient`] and a [`telemetry::SeriesStore`].

pub mod pipeline;

pub use pipeline::{bootstrap, PipelineStats, PushPipeline};
