//! Host-side IPC client
//!
//! Owns the [`Correlator`] for one connection. Calls are written through a
//! shared [`FrameWriter`]; a reader task routes every response frame back to
//! the call that issued it. Dropping the client stops that task and releases
//! its half of the connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_io::Timer;
use async_net::unix::UnixStream;
use executor_core::{Executor, Task};
use futures_lite::future;
use futures_lite::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use serde_json::Value;
use smol::channel::{self, Receiver, Sender};

use crate::config::IpcConfig;
use crate::ipc::codec::FrameDecoder;
use crate::ipc::correlator::{Correlator, PendingCall};
use crate::ipc::protocol::{IpcError, Message, Request};
use crate::ipc::transport::FrameWriter;

pub struct IpcClient<W> {
    correlator: Arc<Correlator>,
    writer: FrameWriter<W>,
    config: IpcConfig,
    // Never sent on; dropping it stops the reader task
    _shutdown: Sender<()>,
}

impl IpcClient<UnixStream> {
    /// Connect to a worker listening on a Unix domain socket
    pub async fn connect<E: Executor>(
        socket_path: impl AsRef<Path>,
        config: IpcConfig,
        executor: &E,
    ) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(socket_path.as_ref()).await?;
        tracing::debug!(path = %socket_path.as_ref().display(), "connected to worker");
        Ok(Self::new(stream.clone(), stream, config, executor))
    }
}

impl<W: AsyncWrite + Unpin> IpcClient<W> {
    /// Wrap an already connected byte stream
    ///
    /// The read half is consumed by a task spawned on `executor`. When it
    /// ends, for whatever reason, every outstanding call fails with
    /// [`IpcError::Disconnected`]. The task also ends when the client is
    /// dropped.
    pub fn new<R, E>(reader: R, writer: W, config: IpcConfig, executor: &E) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        E: Executor,
    {
        let correlator = Arc::new(Correlator::new(config.max_pending_calls()));
        let (shutdown, dropped) = channel::bounded(1);
        executor
            .spawn(read_responses(
                reader,
                Arc::clone(&correlator),
                config.clone(),
                dropped,
            ))
            .detach();
        Self {
            correlator,
            writer: FrameWriter::new(writer, config.max_frame_len()),
            config,
            _shutdown: shutdown,
        }
    }

    /// Call `method` and wait for its result
    ///
    /// Uses the configured call timeout if there is one, otherwise waits
    /// until the worker answers or the connection ends.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, IpcError> {
        match self.config.call_timeout() {
            Some(timeout) => self.call_with_timeout(method, params, timeout).await,
            None => self.start(method, params).await?.wait().await,
        }
    }

    /// Call `method`, giving up after `timeout`
    ///
    /// On expiry the pending call is removed; a response arriving later is
    /// discarded.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, IpcError> {
        let pending = self.start(method, params).await?;
        let id = pending.id();
        future::or(pending.wait(), async move {
            Timer::after(timeout).await;
            tracing::debug!(id, ?timeout, "call timed out");
            Err(IpcError::Timeout { id, after: timeout })
        })
        .await
    }

    /// Send a request without waiting for the answer
    ///
    /// The call is registered before the frame is written. Dropping the
    /// returned handle cancels it locally.
    pub async fn start(&self, method: &str, params: Value) -> Result<PendingCall, IpcError> {
        let pending = self.correlator.register()?;
        let body = Request::new(pending.id(), method, params).to_vec()?;
        self.writer.send(&body).await?;
        tracing::debug!(id = pending.id(), method, "request sent");
        Ok(pending)
    }

    /// Ids of calls still waiting for a response
    pub fn pending_ids(&self) -> Vec<u64> {
        self.correlator.pending_ids()
    }

    pub fn is_connected(&self) -> bool {
        !self.correlator.is_closed()
    }

    /// Fail outstanding calls and close the write half
    pub async fn close(&self) -> Result<(), IpcError> {
        self.correlator.fail_all("client closed");
        self.writer.close().await
    }
}

impl<W> Drop for IpcClient<W> {
    fn drop(&mut self) {
        self.correlator.fail_all("client dropped");
    }
}

async fn read_responses<R>(
    mut reader: R,
    correlator: Arc<Correlator>,
    config: IpcConfig,
    dropped: Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    let routed = future::or(
        async { Some(route_responses(&mut reader, &correlator, &config).await) },
        async {
            let _ = dropped.recv().await;
            None
        },
    )
    .await;

    let reason = match routed {
        None => {
            tracing::debug!("client dropped, closing connection");
            "client dropped".to_string()
        }
        Some(Ok(())) => "worker closed the connection".to_string(),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "IPC connection failed");
            e.to_string()
        }
    };
    correlator.fail_all(reason);
}

async fn route_responses<R>(
    reader: &mut R,
    correlator: &Correlator,
    config: &IpcConfig,
) -> Result<(), IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::with_max_frame_len(config.max_frame_len());
    let mut chunk = vec![0u8; config.read_chunk_size()];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            decoder.finish()?;
            return Ok(());
        }
        for frame in decoder.feed(&chunk[..n]) {
            match Message::from_slice(&frame?) {
                Ok(Message::Response(response)) => {
                    correlator.resolve(response);
                }
                Ok(Message::Request(request)) => {
                    tracing::warn!(id = request.id, method = %request.method, "host does not serve requests, dropping");
                }
                Err(invalid) => {
                    tracing::warn!(id = ?invalid.id, error = %invalid.error, "discarding undecodable frame");
                }
            }
        }
    }
}
