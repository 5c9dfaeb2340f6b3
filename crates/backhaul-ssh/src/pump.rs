//! Per-connection bidirectional relay
//!
//! Moves bytes between the accepted tunnel channel and the dialed
//! destination socket until either side ends, then shuts both down. A broken
//! relay is not retried.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const RELAY_BUFFER_SIZE: usize = 8192;

/// Relays bytes both ways until either side reaches end-of-stream or fails.
///
/// Returns (bytes relayed inbound→outbound, bytes relayed outbound→inbound).
pub async fn relay<A, B>(inbound: A, outbound: B) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut inbound_read, mut inbound_write) = tokio::io::split(inbound);
    let (mut outbound_read, mut outbound_write) = tokio::io::split(outbound);

    let mut inbound_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut outbound_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut to_outbound: u64 = 0;
    let mut to_inbound: u64 = 0;

    loop {
        tokio::select! {
            read = inbound_read.read(&mut inbound_buf) => match read {
                Ok(0) => {
                    debug!("inbound channel reached end of stream");
                    break;
                }
                Ok(n) => {
                    if let Err(e) = outbound_write.write_all(&inbound_buf[..n]).await {
                        debug!("write to destination failed: {}", e);
                        break;
                    }
                    to_outbound += n as u64;
                }
                Err(e) => {
                    debug!("read from inbound channel failed: {}", e);
                    break;
                }
            },
            read = outbound_read.read(&mut outbound_buf) => match read {
                Ok(0) => {
                    debug!("destination socket reached end of stream");
                    break;
                }
                Ok(n) => {
                    if let Err(e) = inbound_write.write_all(&outbound_buf[..n]).await {
                        debug!("write to inbound channel failed: {}", e);
                        break;
                    }
                    to_inbound += n as u64;
                }
                Err(e) => {
                    debug!("read from destination socket failed: {}", e);
                    break;
                }
            },
        }
    }

    // Close the other side too; either end-of-stream tears the relay down.
    let _ = inbound_write.shutdown().await;
    let _ = outbound_write.shutdown().await;

    (to_outbound, to_inbound)
}
