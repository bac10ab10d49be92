pub mod backoff;
pub mod shutdown;
pub mod task;
pub mod telemetry;
pub mod text;
