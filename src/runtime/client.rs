//! Controller-side client for a running runtime

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::io::{BufReader, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::transport::{self, Envelope, Stream};
use crate::common::{Error, Result};
use crate::message::{
    DebugCmd, DebugRequest, DebugResult, MessageId, Notification, ProgramEvent, Response,
    TextIoCmd,
};

/// Frames buffered between the socket reader and the client
const FRAME_BUFFER: usize = 256;

/// Client used by a controller to talk to the runtime
pub struct ControllerClient {
    writer: WriteHalf<Stream>,
    frames: mpsc::Receiver<Result<Envelope>>,
    /// Notifications that arrived while waiting for a response
    backlog: VecDeque<Notification>,
    reader_task: JoinHandle<()>,
}

impl ControllerClient {
    /// Connect to the runtime on its default socket
    pub async fn connect() -> Result<Self> {
        Self::from_connect(transport::connect().await)
    }

    /// Connect to a runtime listening on `name`
    pub async fn connect_to(name: &str) -> Result<Self> {
        Self::from_connect(transport::connect_to(name).await)
    }

    fn from_connect(result: std::io::Result<Stream>) -> Result<Self> {
        let stream = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound
                || e.kind() == std::io::ErrorKind::ConnectionRefused
            {
                Error::RuntimeNotRunning
            } else {
                Error::RuntimeConnectionFailed(e)
            }
        })?;

        let (reader, writer) = tokio::io::split(stream);
        let (tx, frames) = mpsc::channel(FRAME_BUFFER);

        // Frame reads are not cancel safe, so they run in their own task
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                let data = match transport::recv_message(&mut reader).await {
                    Ok(data) => data,
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        let _ = tx.send(Err(Error::RuntimeCommunication(e.to_string()))).await;
                        break;
                    }
                };
                let frame = serde_json::from_slice::<Envelope>(&data).map_err(Error::from);
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            writer,
            frames,
            backlog: VecDeque::new(),
            reader_task,
        })
    }

    /// Send one frame to the runtime
    pub async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        transport::send_envelope(&mut self.writer, envelope)
            .await
            .map_err(|e| Error::RuntimeCommunication(e.to_string()))
    }

    /// Next frame from the runtime, or `None` if `timeout` elapses first
    pub async fn recv(&mut self, timeout: Duration) -> Result<Option<Envelope>> {
        match tokio::time::timeout(timeout, self.frames.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(frame)) => frame.map(Some),
            Ok(None) => Err(Error::RuntimeCommunication(
                "runtime closed the connection".to_string(),
            )),
        }
    }

    /// Wait for the response to `id`, keeping notifications that arrive meanwhile
    pub async fn await_response(&mut self, id: MessageId, timeout: Duration) -> Result<Response> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv(remaining).await? {
                None => return Err(Error::Timeout(format!("response to message {}", id))),
                Some(Envelope::Response(resp)) if resp.id() == id => return Ok(resp),
                Some(Envelope::Response(resp)) => {
                    tracing::debug!(id = resp.id(), "Ignoring unmatched response");
                }
                Some(Envelope::Message(msg)) => self.backlog.push_back(msg),
            }
        }
    }

    /// Run a debug command and return its result payload
    pub async fn debug(&mut self, command: DebugCmd, timeout: Duration) -> Result<Option<DebugResult>> {
        let request = DebugRequest::new(command);
        let id = request.id;
        self.send(&Envelope::Message(Notification::Debug(request)))
            .await?;

        match self.await_response(id, timeout).await? {
            Response::Debug(resp) if resp.success => Ok(resp.result),
            Response::Debug(resp) => Err(resp.exception.map(Error::from).unwrap_or_else(|| {
                Error::RuntimeCommunication(format!("{:?} failed without an error", resp.kind))
            })),
            other => Err(Error::RuntimeCommunication(format!(
                "unexpected response to debug command: {:?}",
                other
            ))),
        }
    }

    /// Deliver a line of text input. False if the runtime's buffer was full.
    pub async fn send_input(&mut self, text: &str, timeout: Duration) -> Result<bool> {
        let cmd = TextIoCmd::input(text);
        let id = cmd.id();
        self.send(&Envelope::Message(Notification::TextIo(cmd)))
            .await?;

        match self.await_response(id, timeout).await? {
            Response::TextIo(resp) => Ok(resp.success()),
            other => Err(Error::RuntimeCommunication(format!(
                "unexpected response to text input: {:?}",
                other
            ))),
        }
    }

    /// Fire a program event
    pub async fn fire_event(&mut self, name: &str) -> Result<()> {
        self.send(&Envelope::Message(Notification::Event(ProgramEvent::new(name))))
            .await
    }

    /// Answer a command the runtime sent
    pub async fn respond(&mut self, resp: Response) -> Result<()> {
        self.send(&Envelope::Response(resp)).await
    }

    /// Next notification, or `None` if `timeout` elapses first
    pub async fn next_notification(&mut self, timeout: Duration) -> Result<Option<Notification>> {
        if let Some(msg) = self.backlog.pop_front() {
            return Ok(Some(msg));
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv(remaining).await? {
                None => return Ok(None),
                Some(Envelope::Message(msg)) => return Ok(Some(msg)),
                Some(Envelope::Response(resp)) => {
                    tracing::debug!(id = resp.id(), "Ignoring unsolicited response");
                }
            }
        }
    }

    /// Collect notifications until none arrives for `quiet`
    pub async fn drain_notifications(&mut self, quiet: Duration) -> Result<Vec<Notification>> {
        let mut notifications = Vec::new();
        while let Some(msg) = self.next_notification(quiet).await? {
            notifications.push(msg);
        }
        Ok(notifications)
    }
}

impl Drop for ControllerClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
