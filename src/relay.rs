//! Feed JSON-lines messages into an AMQP output.
//!
//! Each non-blank line is one `Message`. Lines that fail to parse are logged
//! and skipped; they never reach the output.

use amqp_output::{AmqpOutput, Output, OutputRunner, RunStats};
use amqp_types::{Encoder, Message, PackPool, PackRecycler, PipelinePack};
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Line counters for one input stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub lines: u64,
    /// Messages handed to the output.
    pub queued: u64,
    pub rejected: u64,
}

/// Outcome of a completed `relay`.
#[derive(Debug, Clone, Default)]
pub struct RelaySummary {
    /// `None` if the reader was still blocked when the output stopped.
    pub read: Option<ReadStats>,
    pub output: RunStats,
}

/// Parse messages from `reader` and send them to `tx` until the input ends
/// or the receiving side goes away.
pub async fn read_messages<R>(
    reader: R,
    pool: Arc<PackPool>,
    tx: mpsc::Sender<PipelinePack>,
) -> anyhow::Result<ReadStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReadStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        stats.lines += 1;
        if line.trim().is_empty() {
            continue;
        }

        let message: Message = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Skipping line {}: {e}", stats.lines);
                stats.rejected += 1;
                continue;
            }
        };

        if let Err(mpsc::error::SendError(pack)) = tx.send(pool.get(message)).await {
            pool.recycle(pack);
            tracing::debug!("Output stopped accepting messages at line {}", stats.lines);
            break;
        }
        stats.queued += 1;
    }

    tracing::debug!(
        "Finished reading input: {} lines, {} queued, {} rejected",
        stats.lines,
        stats.queued,
        stats.rejected
    );
    Ok(stats)
}

/// Run an initialized `output` over every message in `reader`.
///
/// Returns once the output has stopped and its connection is released. A
/// reader still blocked on input at that point is abandoned.
pub async fn relay<R>(
    output: &mut AmqpOutput,
    encoder: Arc<dyn Encoder>,
    reader: R,
    buffer: usize,
) -> anyhow::Result<RelaySummary>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let buffer = buffer.max(1);
    let pool = Arc::new(PackPool::new(buffer));
    let (tx, rx) = mpsc::channel(buffer);

    let reading = tokio::spawn(read_messages(reader, pool.clone(), tx));
    let outcome = output
        .run(OutputRunner::new(rx, Some(encoder), pool.clone()))
        .await;

    if !reading.is_finished() {
        reading.abort();
    }
    let read = reading.await;
    outcome.context("AMQP output failed")?;

    let read = match read {
        Ok(stats) => Some(stats?),
        Err(e) if e.is_cancelled() => {
            tracing::debug!("Input reader abandoned after output stopped");
            None
        }
        Err(e) => return Err(e).context("Input reader panicked"),
    };
    tracing::debug!(
        "Pack pool: {} issued, {} recycled",
        pool.issued(),
        pool.recycled()
    );

    Ok(RelaySummary {
        read,
        output: output.stats().clone(),
    })
}
