use amqp_types::{Encoder, PackRecycler, PipelinePack};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;

/// What the hosting pipeline hands an output when it starts running it.
pub struct OutputRunner {
    pub(crate) input: mpsc::Receiver<PipelinePack>,
    pub(crate) encoder: Option<Arc<dyn Encoder>>,
    pub(crate) recycler: Arc<dyn PackRecycler>,
}

impl OutputRunner {
    pub fn new(
        input: mpsc::Receiver<PipelinePack>,
        encoder: Option<Arc<dyn Encoder>>,
        recycler: Arc<dyn PackRecycler>,
    ) -> Self {
        Self {
            input,
            encoder,
            recycler,
        }
    }

    pub fn encoder(&self) -> Option<&Arc<dyn Encoder>> {
        self.encoder.as_ref()
    }
}

/// Lifecycle every output plugin exposes to the pipeline.
#[async_trait]
pub trait Output: Send {
    type Config: Send;

    async fn init(&mut self, config: Self::Config) -> Result<()>;

    /// Block until the output stops. Returns the error that stopped it, if any.
    ///
    /// Packs still queued on the input when `run` returns, including early
    /// error returns, have been handed back to the recycler.
    async fn run(&mut self, runner: OutputRunner) -> Result<()>;

    fn cleanup_for_restart(&mut self);
}
