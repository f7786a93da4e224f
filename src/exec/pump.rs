// src/exec/pump.rs

//! Copies a child pipe into an [`OutputSink`] chunk by chunk.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::types::OutputStream;

use super::backend::OutputSink;

/// Size of a single read from a child pipe.
const PUMP_BUFFER_SIZE: usize = 8 * 1024;

/// Spawn a task that drains `reader` into `sink` until end-of-file.
///
/// The pipe is always drained to the end, even when the sink reports an
/// error, so the child never stalls on a full pipe.
pub fn spawn_pump<R>(mut reader: R, sink: Arc<dyn OutputSink>, stream: OutputStream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
        let mut total = 0usize;

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    if let Err(e) = sink.write(&buf[..n]) {
                        error!(%stream, error = %e, "failed to record process output chunk");
                    }
                }
                Err(e) => {
                    warn!(%stream, error = %e, "error reading process output; stopping pump");
                    break;
                }
            }
        }

        sink.finish();
        debug!(%stream, bytes = total, "output pump ended");
    })
}
