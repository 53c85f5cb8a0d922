pub mod config;
pub mod constants;
pub mod exposures;
pub mod nightstack_errors;
pub mod pipeline;
pub mod simulator;
pub mod stage;
pub mod stacking;
pub mod store;

pub use config::PipelineConfig;
pub use constants::{ExposureSet, Exposures, GroupingKey};
pub use nightstack_errors::NightstackError;
pub use pipeline::{PartitionReport, RunOutcome, StackPipeline};
pub use stage::{Stage, Status};
pub use store::DateWindow;
