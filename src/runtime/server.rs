//! Runtime server - bridges a controller socket to the program handler

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;
use tokio::io::BufReader;
use tokio::sync::{mpsc, oneshot};

use super::handler::{Outbound, ProgramHandler};
use super::transport::{self, Envelope};
use crate::common::{paths, Error, Result};
use crate::message::Response;

/// How long the forwarder waits on the outbound queues before rechecking
const FORWARD_POLL: Duration = Duration::from_millis(200);

/// Capacity of the channel between the forwarder and the socket writer
const WRITE_BUFFER: usize = 64;

pub struct RuntimeServer {
    handler: Arc<ProgramHandler>,
}

/// Marks the end of a controller session, even when the session future is dropped
struct SessionGuard {
    handler: Arc<ProgramHandler>,
    stop: Arc<AtomicBool>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.handler.disconnect();
    }
}

impl RuntimeServer {
    pub fn new(handler: Arc<ProgramHandler>) -> Self {
        Self { handler }
    }

    /// Listen on the default socket until SIGINT/SIGTERM
    pub async fn run(&self) -> Result<()> {
        // Signal handlers go in before the socket appears
        let shutdown = shutdown_signal()?;
        let listener = transport::create_listener()?;
        tracing::info!("Runtime listening on {}", paths::socket_name());

        self.serve(listener, shutdown).await;

        paths::remove_socket()?;
        tracing::info!("Runtime shutdown complete");
        Ok(())
    }

    /// Accept controllers one at a time until `shutdown` completes
    pub async fn serve<F>(&self, listener: transport::Listener, shutdown: F)
    where
        F: Future<Output = io::Result<&'static str>>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    log_shutdown(signal);
                    break;
                }
                accept_result = listener.accept() => {
                    let stream = match accept_result {
                        Ok(stream) => stream,
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    tokio::select! {
                        result = self.handle_client(stream) => {
                            if let Err(e) = result {
                                tracing::error!("Error handling controller: {}", e);
                            }
                        }
                        signal = &mut shutdown => {
                            log_shutdown(signal);
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Stopping program handler");
        let handler = self.handler.clone();
        if tokio::task::spawn_blocking(move || handler.shutdown())
            .await
            .is_err()
        {
            tracing::error!("Program handler shutdown panicked");
        }
    }

    /// Handle a single controller connection
    async fn handle_client(&self, stream: transport::Stream) -> Result<()> {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        self.handler.connect();
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = SessionGuard {
            handler: self.handler.clone(),
            stop: stop.clone(),
        };

        // Blocking queue pops run off the async threads. An item the writer
        // no longer accepts is returned instead of dropped.
        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(WRITE_BUFFER);
        let forwarder = {
            let handler = self.handler.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                while !stop.load(Ordering::SeqCst) {
                    if let Some(item) = handler.recv_outbound(FORWARD_POLL) {
                        if let Err(mpsc::error::SendError(item)) = out_tx.blocking_send(item) {
                            return Some(item);
                        }
                    }
                }
                None
            })
        };

        // Returns everything it took but did not write
        let (writer_stop_tx, mut writer_stop_rx) = oneshot::channel::<()>();
        let writer_task = tokio::spawn(async move {
            let mut unsent = Vec::new();
            loop {
                let item = tokio::select! {
                    _ = &mut writer_stop_rx => break,
                    item = out_rx.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };
                let envelope = Envelope::from(item.clone());
                if let Err(e) = transport::send_envelope(&mut writer, &envelope).await {
                    tracing::error!("Error writing to controller: {}", e);
                    unsent.push(item);
                    break;
                }
            }
            out_rx.close();
            while let Ok(item) = out_rx.try_recv() {
                unsent.push(item);
            }
            unsent
        });

        loop {
            let data = match transport::recv_message(&mut reader).await {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("Controller disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Error reading from controller: {}", e);
                    break;
                }
            };

            let envelope: Envelope = match serde_json::from_slice(&data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!("Invalid frame from controller: {}", e);
                    if let Some(resp) = transport::reject_request(&data, &e) {
                        self.reply(resp).await;
                    }
                    continue;
                }
            };

            if let Err(e) = self.deliver(envelope).await {
                tracing::warn!("{}", e);
            }
        }

        // Undelivered items wait for the next controller. The writer closes
        // the channel first so the forwarder cannot slip anything past it.
        stop.store(true, Ordering::SeqCst);
        let _ = writer_stop_tx.send(());
        let mut unsent = writer_task.await.unwrap_or_default();
        if let Ok(Some(item)) = forwarder.await {
            unsent.push(item);
        }
        self.handler.requeue(unsent);
        Ok(())
    }

    /// Answer the controller directly, bypassing the program
    async fn reply(&self, resp: Response) {
        let handler = self.handler.clone();
        let id = resp.id();
        match tokio::task::spawn_blocking(move || handler.reply_to_controller(resp)).await {
            Ok(true) => tracing::debug!(id, "Rejected undecodable request"),
            _ => tracing::warn!(id, "Could not answer undecodable request"),
        }
    }

    /// Push one inbound envelope into the handler's queues
    async fn deliver(&self, envelope: Envelope) -> Result<()> {
        let handler = self.handler.clone();
        tokio::task::spawn_blocking(move || match envelope {
            Envelope::Message(msg) => {
                tracing::debug!(id = msg.id(), "Message from controller");
                handler
                    .send_msg_to_script(msg)
                    .then_some(())
                    .ok_or(Error::QueueClosed("inbound_msgs"))
            }
            Envelope::Response(resp) => {
                tracing::debug!(id = resp.id(), "Response from controller");
                handler
                    .send_resp_to_script(resp)
                    .then_some(())
                    .ok_or(Error::QueueClosed("inbound_resps"))
            }
        })
        .await
        .map_err(|e| Error::Internal(format!("delivery task failed: {}", e)))?
    }
}

fn log_shutdown(signal: io::Result<&'static str>) {
    match signal {
        Ok(name) => tracing::info!("Received {}, shutting down gracefully", name),
        Err(e) => tracing::error!("Signal handler failed, shutting down: {}", e),
    }
}

#[cfg(unix)]
fn shutdown_signal() -> io::Result<impl Future<Output = io::Result<&'static str>>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> io::Result<impl Future<Output = io::Result<&'static str>>> {
    Ok(async { tokio::signal::ctrl_c().await.map(|()| "Ctrl+C") })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::common::config::Config;
    use crate::message::{DebugCmd, DebugRequest, Notification};
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debug_request_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("runtime.sock").to_string_lossy().into_owned();
        let listener = transport::bind(&name).unwrap();

        let handler = ProgramHandler::new(&Config::default());
        handler.start().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            RuntimeServer::new(handler)
                .serve(listener, async move {
                    let _ = stop_rx.await;
                    Ok("test")
                })
                .await
        });

        let stream = transport::connect_to(&name).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let request = DebugRequest::new(DebugCmd::GetEntryPoints);
        let id = request.id;
        transport::send_envelope(&mut writer, &Envelope::Message(Notification::Debug(request)))
            .await
            .unwrap();

        let data = tokio::time::timeout(Duration::from_secs(5), transport::recv_message(&mut reader))
            .await
            .unwrap()
            .unwrap();
        match serde_json::from_slice::<Envelope>(&data).unwrap() {
            Envelope::Response(Response::Debug(resp)) => {
                assert_eq!(resp.id, id);
                assert!(resp.success);
            }
            other => panic!("Expected debug response, got {other:?}"),
        }

        // A request that cannot be decoded is still answered under its id
        let malformed = br#"{"kind":"message","payload":{"type":"debug","body":{"id":99,"command":{"type":"step_over","thread_id":-1}}}}"#;
        transport::send_message(&mut writer, malformed).await.unwrap();

        let data = tokio::time::timeout(Duration::from_secs(5), transport::recv_message(&mut reader))
            .await
            .unwrap()
            .unwrap();
        match serde_json::from_slice::<Envelope>(&data).unwrap() {
            Envelope::Response(Response::Debug(resp)) => {
                assert_eq!(resp.id, 99);
                assert!(!resp.success);
                assert_eq!(resp.exception.unwrap().code, "INVALID_REQUEST");
            }
            other => panic!("Expected debug failure, got {other:?}"),
        }

        drop(writer);
        drop(reader);
        stop_tx.send(()).unwrap();
        server.await.unwrap();
    }
}
