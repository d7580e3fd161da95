//! Worker-side IPC server
//!
//! Every decoded request frame is dispatched on its own task, so a handler
//! waiting on the wallet library does not hold up the frames behind it.
//! Responses go out through one [`FrameWriter`] per connection and may leave
//! in a different order than their requests arrived.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_net::unix::{UnixListener, UnixStream};
use blocking::Unblock;
use bytes::Bytes;
use executor_core::{Executor, Task};
use futures_lite::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::config::IpcConfig;
use crate::dispatch::Dispatcher;
use crate::ipc::codec::{FrameDecoder, FrameError};
use crate::ipc::protocol::{IpcError, Response, RpcError};
use crate::ipc::transport::FrameWriter;
use crate::wallet::WalletBackend;

/// Unix domain socket server
///
/// All connections share one [`Dispatcher`] and therefore one wallet
/// session. The socket file is removed when the server is dropped.
pub struct IpcServer<B: WalletBackend> {
    dispatcher: Arc<Dispatcher<B>>,
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
}

impl<B: WalletBackend> IpcServer<B> {
    /// Bind `socket_path` and start accepting connections on `executor`
    pub async fn new<E>(
        dispatcher: Arc<Dispatcher<B>>,
        socket_path: impl AsRef<Path>,
        config: IpcConfig,
        executor: E,
    ) -> crate::Result<Self>
    where
        E: Executor + Clone + Send + Sync + 'static,
    {
        let socket_path = socket_path.as_ref().to_path_buf();
        let running = Arc::new(AtomicBool::new(true));

        // Stale socket from a previous run
        let _ = std::fs::remove_file(&socket_path);
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(&socket_path)?;

        tracing::info!(path = %socket_path.display(), "IPC server started");

        executor
            .spawn(accept_loop(
                listener,
                Arc::clone(&dispatcher),
                config,
                Arc::clone(&running),
                executor.clone(),
            ))
            .detach();

        Ok(Self {
            dispatcher,
            socket_path,
            running,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<B>> {
        &self.dispatcher
    }

    /// Stop accepting new connections
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(path = %self.socket_path.display(), "IPC server stopping");
    }
}

impl<B: WalletBackend> Drop for IpcServer<B> {
    fn drop(&mut self) {
        self.stop();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn accept_loop<B, E>(
    listener: UnixListener,
    dispatcher: Arc<Dispatcher<B>>,
    config: IpcConfig,
    running: Arc<AtomicBool>,
    executor: E,
) where
    B: WalletBackend,
    E: Executor + Clone + Send + Sync + 'static,
{
    while running.load(Ordering::SeqCst) {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let dispatcher = Arc::clone(&dispatcher);
                let config = config.clone();
                let task_executor = executor.clone();
                executor
                    .spawn(async move {
                        if let Err(e) =
                            serve_unix(stream, dispatcher, &config, &task_executor).await
                        {
                            tracing::warn!(error = %e, "IPC connection closed with error");
                        }
                    })
                    .detach();
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "failed to accept IPC connection");
                }
            }
        }
    }
}

async fn serve_unix<B, E>(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher<B>>,
    config: &IpcConfig,
    executor: &E,
) -> Result<(), IpcError>
where
    B: WalletBackend,
    E: Executor,
{
    serve_connection(stream.clone(), stream, dispatcher, config, executor).await
}

/// Serve one duplex byte stream until the peer closes it
///
/// Returns `Ok` on a clean close at a frame boundary. A truncated or
/// oversize frame, or an I/O error, ends the connection with that error;
/// handlers still running finish and try to write their responses.
pub async fn serve_connection<B, R, W, E>(
    mut reader: R,
    writer: W,
    dispatcher: Arc<Dispatcher<B>>,
    config: &IpcConfig,
    executor: &E,
) -> Result<(), IpcError>
where
    B: WalletBackend,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    E: Executor,
{
    let writer = Arc::new(FrameWriter::new(writer, config.max_frame_len()));
    let mut decoder = FrameDecoder::with_max_frame_len(config.max_frame_len());
    let mut chunk = vec![0u8; config.read_chunk_size()];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            decoder.finish()?;
            tracing::debug!("peer closed IPC connection");
            return Ok(());
        }

        for frame in decoder.feed(&chunk[..n]) {
            let frame = frame.inspect_err(|e| {
                tracing::warn!(error = %e, "fatal framing error, dropping connection");
            })?;
            tracing::debug!(len = frame.len(), "request frame decoded");
            executor
                .spawn(handle_frame(
                    frame,
                    Arc::clone(&dispatcher),
                    Arc::clone(&writer),
                ))
                .detach();
        }
    }
}

/// Serve the process's stdin/stdout
///
/// Stdout carries frames only; logs belong on stderr.
pub async fn serve_stdio<B, E>(
    dispatcher: Arc<Dispatcher<B>>,
    config: &IpcConfig,
    executor: &E,
) -> Result<(), IpcError>
where
    B: WalletBackend,
    E: Executor,
{
    let stdin = Unblock::new(std::io::stdin());
    let stdout = Unblock::new(std::io::stdout());
    serve_connection(stdin, stdout, dispatcher, config, executor).await
}

async fn handle_frame<B, W>(frame: Bytes, dispatcher: Arc<Dispatcher<B>>, writer: Arc<FrameWriter<W>>)
where
    B: WalletBackend,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let Some(response) = dispatcher.handle_frame(&frame).await else {
        return;
    };
    if let Err(e) = send_response(&writer, &response).await {
        tracing::debug!(id = ?response.id, error = %e, "failed to write response");
    }
}

/// Write `response`, replacing it with an error if it does not fit in a frame
async fn send_response<W>(writer: &FrameWriter<W>, response: &Response) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
{
    let body = response.to_vec()?;
    match writer.send(&body).await {
        Err(IpcError::Frame(FrameError::Oversize { len, max })) => {
            tracing::warn!(id = ?response.id, len, max, "response exceeds frame limit");
            let fallback = Response::failure(
                response.id,
                RpcError::internal(format!(
                    "response of {len} bytes exceeds the {max} byte frame limit"
                )),
            );
            writer.send(&fallback.to_vec()?).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use async_net::unix::UnixStream;
    use executor_core::tokio::TokioGlobal;
    use futures_lite::io::AsyncWriteExt;
    use serde_json::{Value, json};

    use super::*;
    use crate::ipc::codec::encode_frame;
    use crate::ipc::protocol::{ErrorCode, Message, Request};
    use crate::wallet::testing::MockBackend;

    async fn read_responses(stream: &mut UnixStream, count: usize) -> Vec<Response> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        while out.len() < count {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "worker closed early");
            for frame in decoder.feed(&buf[..n]) {
                match Message::from_slice(&frame.unwrap()).unwrap() {
                    Message::Response(response) => out.push(response),
                    Message::Request(request) => panic!("unexpected request {request:?}"),
                }
            }
        }
        out
    }

    fn spawn_worker(worker: UnixStream) -> Arc<Dispatcher<MockBackend>> {
        let dispatcher = Arc::new(Dispatcher::new(MockBackend::default()));
        let served = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let config = IpcConfig::default();
            serve_connection(worker.clone(), worker, served, &config, &TokioGlobal).await
        });
        dispatcher
    }

    async fn send(stream: &mut UnixStream, request: &Request) {
        let frame = encode_frame(&request.to_vec().unwrap()).unwrap();
        stream.write_all(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_in_one_write() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        spawn_worker(worker);

        let mut bytes = Vec::new();
        for id in 1..=3 {
            let body = Request::new(id, "ping", json!({})).to_vec().unwrap();
            bytes.extend(encode_frame(&body).unwrap());
        }
        host.write_all(&bytes).await.unwrap();

        let mut ids: Vec<_> = read_responses(&mut host, 3)
            .await
            .into_iter()
            .map(|r| {
                assert_eq!(r.outcome, Ok(json!({ "pong": true })));
                r.id.unwrap()
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_slow_handler_does_not_block_later_frames() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        let dispatcher = spawn_worker(worker);
        let networks = json!({ "ethereum": {} });
        dispatcher
            .session()
            .install(crate::wallet::WalletBackend::initialize(
                &MockBackend::default(),
                b"seed",
                networks.as_object().unwrap(),
            ))
            .await
            .unwrap();

        send(
            &mut host,
            &Request::new(
                1,
                "callMethod",
                json!({ "network": "ethereum", "accountIndex": 0, "methodName": "sleep", "args": [300] }),
            ),
        )
        .await;
        send(&mut host, &Request::new(2, "ping", json!({}))).await;

        let responses = read_responses(&mut host, 2).await;
        assert_eq!(responses[0].id, Some(2));
        assert_eq!(responses[1].id, Some(1));
        assert_eq!(responses[1].outcome, Ok(json!(300)));
    }

    #[tokio::test]
    async fn test_errors_keep_connection_usable() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        spawn_worker(worker);

        host.write_all(&encode_frame(b"not json").unwrap()).await.unwrap();
        send(&mut host, &Request::new(4, "nope", json!({}))).await;

        let mut responses = read_responses(&mut host, 2).await;
        responses.sort_by_key(|r| r.id);
        assert_eq!(responses[0].id, None);
        assert_eq!(
            responses[0].outcome.as_ref().unwrap_err().code,
            ErrorCode::BadRequest
        );
        assert_eq!(
            responses[1].outcome.as_ref().unwrap_err().code,
            ErrorCode::UnknownMethod
        );

        send(&mut host, &Request::new(5, "ping", json!({}))).await;
        let responses = read_responses(&mut host, 1).await;
        assert_eq!(responses[0].outcome, Ok(json!({ "pong": true })));
    }

    #[tokio::test]
    async fn test_oversize_prefix_closes_connection() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(MockBackend::default()));
        let task = tokio::spawn(async move {
            let config = IpcConfig::default();
            serve_connection(worker.clone(), worker, dispatcher, &config, &TokioGlobal).await
        });

        host.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(IpcError::Frame(FrameError::Oversize { .. }))
        ));
    }

    #[tokio::test]
    async fn test_partial_frame_at_close_is_error() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(MockBackend::default()));
        let task = tokio::spawn(async move {
            let config = IpcConfig::default();
            serve_connection(worker.clone(), worker, dispatcher, &config, &TokioGlobal).await
        });

        host.write_all(&[0, 0, 0, 9, b'{']).await.unwrap();
        host.close().await.unwrap();
        drop(host);
        assert!(matches!(
            task.await.unwrap(),
            Err(IpcError::Frame(FrameError::Truncated { buffered: 5 }))
        ));
    }

    #[tokio::test]
    async fn test_oversize_response_is_replaced() {
        let (mut host, worker) = UnixStream::pair().unwrap();
        let writer = FrameWriter::new(worker, 200);
        let response = Response::success(8, Value::String("x".repeat(300)));
        send_response(&writer, &response).await.unwrap();
        drop(writer);

        let responses = read_responses(&mut host, 1).await;
        assert_eq!(responses[0].id, Some(8));
        assert_eq!(
            responses[0].outcome.as_ref().unwrap_err().code,
            ErrorCode::InternalError
        );
    }

    #[tokio::test]
    async fn test_unix_socket_server() {
        let dir = std::env::temp_dir().join(format!("wdk-bridge-test-{}", std::process::id()));
        let path = dir.join("worker.sock");
        let dispatcher = Arc::new(Dispatcher::new(MockBackend::default()));
        let server = IpcServer::new(dispatcher, &path, IpcConfig::default(), TokioGlobal)
            .await
            .unwrap();
        assert_eq!(server.socket_path(), path.as_path());

        let mut stream = UnixStream::connect(&path).await.unwrap();
        send(&mut stream, &Request::new(1, "ping", json!({}))).await;
        let responses = read_responses(&mut stream, 1).await;
        assert_eq!(responses[0].outcome, Ok(json!({ "pong": true })));

        drop(server);
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
