pub mod aggregate;
pub mod cardinality;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod transform;

pub use aggregate::{Aggregator, Bucket, QuantileEstimate, RunningStats};
pub use cardinality::{CardinalityEstimate, LabelCardinality};
pub use pipeline::Driver;
pub use report::{render, PipelineReport};
pub use source::{JsonLinesSource, MemorySource, RecordIter, RecordSource};
pub use transform::{celsius_to_fahrenheit, Transform};

pub use statpipe_common::{
    Config, PipelineConfig, Record, Reading, RejectionPolicy, Result, Stage, StatPipeError,
};
