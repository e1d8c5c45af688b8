pub mod artifacts;
pub mod assembly;
pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod play_features;
pub mod query;
pub mod records;
pub mod schema;
pub mod server;
pub mod skill_proxy;
pub mod tables;
pub mod tracking;
pub mod train;

pub use batch::{ScoringSummary, run_batch_scoring};
pub use config::{BoxRegion, MissingPolicy, PipelineConfig, ServeConfig};
pub use error::{PipelineError, QueryError, Result};
pub use query::{PredictionStore, QueryService, SearchQuery};
pub use train::{TrainingSummary, run_training};
