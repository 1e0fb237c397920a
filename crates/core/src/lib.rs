pub mod config;
pub mod controller;
pub mod converter;
pub mod metrics;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod testing;

pub use config::{
    load_settings, load_settings_from_str, normalize_extensions, settings_figment, ConfigError,
    RunConfig, Settings, TargetFormat,
};
pub use controller::{RunController, RunError};
pub use converter::{build_converter, ConversionInvoker, Converter, ConverterError};
pub use planner::{Job, JobId, JobPlanner, JobStatus, Plan};
pub use pool::WorkerPool;
pub use progress::{JobRecord, ProgressAggregator, ProgressSnapshot, RunEvent, RunStatus};
pub use report::RunReport;
pub use scanner::{ScanError, TreeScanner};
