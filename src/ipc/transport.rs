//! Serialized frame output
//!
//! Several handlers or callers may finish at the same moment; each one encodes
//! its frame first and then writes it under a single lock, so frames never
//! interleave on the wire.

use futures_lite::io::{AsyncWrite, AsyncWriteExt};
use smol::lock::Mutex;

use crate::ipc::codec::encode_frame_with_max;
use crate::ipc::protocol::IpcError;

/// Write half of a connection that emits whole frames
pub struct FrameWriter<W> {
    inner: Mutex<W>,
    max_frame_len: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W, max_frame_len: usize) -> Self {
        Self {
            inner: Mutex::new(writer),
            max_frame_len,
        }
    }

    /// Frame `payload` and write it in one piece
    pub async fn send(&self, payload: &[u8]) -> Result<(), IpcError> {
        let frame = encode_frame_with_max(payload, self.max_frame_len)?;

        let mut writer = self.inner.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the underlying writer
    pub async fn close(&self) -> Result<(), IpcError> {
        self.inner.lock().await.close().await?;
        Ok(())
    }
}
