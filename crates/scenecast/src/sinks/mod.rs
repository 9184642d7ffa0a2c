//! Where a finished run goes once the orchestrator settles.

pub mod file;
pub mod stdout;

use async_trait::async_trait;

use crate::{workflow::Snapshot, Result};

pub use file::FileSink;
pub use stdout::{OutputFormat, StdoutSink};

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, snapshot: &Snapshot) -> Result<()>;
}
