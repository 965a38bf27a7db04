//! Cross-platform local socket transport
//!
//! Unix domain sockets (Unix/macOS) and named pipes (Windows) through the
//! interprocess crate. Every frame is a little-endian `u32` length followed
//! by a JSON-encoded [`Envelope`].

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::handler::Outbound;
use crate::common::{paths, Error};
use crate::message::{DebugKind, DebugResponse, Notification, Response};

/// Maximum frame size (10 MB)
const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

#[cfg(unix)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericFilePath, ListenerOptions};
}

#[cfg(windows)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericNamespaced, ListenerOptions};
}

use platform::*;

pub use platform::{Listener, Stream};

/// One frame on the controller socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Envelope {
    Message(Notification),
    Response(Response),
}

impl From<Outbound> for Envelope {
    fn from(item: Outbound) -> Self {
        match item {
            Outbound::Message(msg) => Envelope::Message(msg),
            Outbound::Response(resp) => Envelope::Response(resp),
        }
    }
}

/// Failure response for a debug request that does not decode but still
/// carries its id and command type
pub fn reject_request(data: &[u8], error: &serde_json::Error) -> Option<Response> {
    let frame: serde_json::Value = serde_json::from_slice(data).ok()?;
    if frame.get("kind")?.as_str()? != "message"
        || frame.pointer("/payload/type")?.as_str()? != "debug"
    {
        return None;
    }
    let request = frame.pointer("/payload/body")?;
    let id = request.get("id")?.as_u64()?;
    let kind = DebugKind::deserialize(request.pointer("/command/type")?).ok()?;
    Some(Response::Debug(DebugResponse::failure(
        id,
        kind,
        &Error::InvalidRequest(error.to_string()),
    )))
}

/// Create the listener at the default socket location
pub fn create_listener() -> io::Result<Listener> {
    // Ensure socket directory exists (Unix) and clean up stale socket
    paths::ensure_socket_dir()?;
    paths::remove_socket()?;
    bind(&paths::socket_name())
}

/// Create a listener on `name` (a file path on Unix, a pipe name on Windows)
pub fn bind(name: &str) -> io::Result<Listener> {
    #[cfg(unix)]
    let listener = {
        let fs_name = name.to_fs_name::<GenericFilePath>()?;
        ListenerOptions::new().name(fs_name).create_tokio()?
    };

    #[cfg(windows)]
    let listener = {
        let ns_name = name.to_ns_name::<GenericNamespaced>()?;
        ListenerOptions::new().name(ns_name).create_tokio()?
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(name, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(listener)
}

/// Connect to the runtime's default socket
pub async fn connect() -> io::Result<Stream> {
    connect_to(&paths::socket_name()).await
}

/// Connect to the runtime listening on `name`
pub async fn connect_to(name: &str) -> io::Result<Stream> {
    #[cfg(unix)]
    let stream = {
        let fs_name = name.to_fs_name::<GenericFilePath>()?;
        Stream::connect(fs_name).await?
    };

    #[cfg(windows)]
    let stream = {
        let ns_name = name.to_ns_name::<GenericNamespaced>()?;
        Stream::connect(ns_name).await?
    };

    Ok(stream)
}

/// Send a length-prefixed frame
pub async fn send_message<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_MESSAGE_SIZE as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Message too large"));
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Receive a length-prefixed frame
pub async fn recv_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);

    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Message too large: {} bytes", len),
        ));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Encode and send one envelope
pub async fn send_envelope<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> crate::common::Result<()> {
    let json = serde_json::to_vec(envelope)?;
    send_message(writer, &json).await?;
    Ok(())
}
