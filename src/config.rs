use std::time::Duration;

use crate::ipc::codec::MAX_FRAME_LEN;

/// Tuning for one IPC endpoint (client or server)
#[derive(Debug, Clone)]
pub struct IpcConfig {
    max_frame_len: usize,
    read_chunk_size: usize,
    call_timeout: Option<Duration>,
    max_pending_calls: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
            read_chunk_size: 64 * 1024,
            call_timeout: None,
            max_pending_calls: 1024,
        }
    }
}

impl IpcConfig {
    /// Create a new builder for IpcConfig
    pub fn builder() -> IpcConfigBuilder {
        IpcConfigBuilder::default()
    }

    /// Largest frame payload accepted or emitted
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Bytes requested from the transport per read
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    /// Deadline applied to [`IpcClient::call`](crate::IpcClient::call); `None` waits forever
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn max_pending_calls(&self) -> usize {
        self.max_pending_calls
    }
}

/// Builder for IpcConfig
#[derive(Debug, Default)]
pub struct IpcConfigBuilder {
    inner: IpcConfig,
}

impl IpcConfigBuilder {
    /// Lower the frame ceiling. Values above 10,000,000 are clamped.
    pub fn max_frame_len(mut self, bytes: usize) -> Self {
        self.inner.max_frame_len = bytes.min(MAX_FRAME_LEN);
        self
    }

    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.inner.read_chunk_size = bytes.max(1);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.inner.call_timeout = Some(timeout);
        self
    }

    pub fn max_pending_calls(mut self, count: usize) -> Self {
        self.inner.max_pending_calls = count.max(1);
        self
    }

    pub fn build(self) -> IpcConfig {
        self.inner
    }
}
