use std::io;
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::constants::BUFFER_SIZE;
use super::progress::ProgressReporter;
use super::protocol::{FileHeader, copy_content, write_header};
use crate::address::PeerAddress;
use crate::error::{ChatError, Result};
use crate::{AppEvent, EventSink};

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFile {
    pub name: String,
    pub byte_count: u64,
}

/// Resolve `peer` and stream `path` to its file port.
pub async fn send_file(
    peer: &PeerAddress,
    path: &Path,
    events: Option<&EventSink>,
) -> Result<SentFile> {
    let resolved = peer.resolve(None).await.map_err(|e| match e {
        ChatError::BindFailed { target, source } => ChatError::ConnectionFailed {
            addr: target,
            source,
        },
        other => other,
    })?;
    send_file_to(resolved.file_addr, path, events).await
}

/// Stream `path` to `target`: header first, then the raw content.
pub async fn send_file_to(
    target: SocketAddr,
    path: &Path,
    events: Option<&EventSink>,
) -> Result<SentFile> {
    let file = File::open(path).await?;
    let content_length = file.metadata().await?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let header = FileHeader::new(name, content_length)?;

    let stream = TcpStream::connect(target)
        .await
        .map_err(|source| ChatError::ConnectionFailed {
            addr: target.to_string(),
            source,
        })?;
    info!(
        "Sending file: {} ({} bytes) to {}",
        header.name, header.content_length, target
    );
    if let Some(events) = events {
        events.emit(AppEvent::FileSendStarted {
            name: header.name.clone(),
            byte_count: header.content_length,
        });
    }

    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, stream);
    let mut progress = ProgressReporter::new(events, &header.name, content_length, true);
    let sent = write_transfer(&mut writer, &header, file, |done| progress.update(done)).await?;
    writer.shutdown().await?;

    debug!("Finished sending {} ({} bytes)", header.name, sent);
    Ok(SentFile {
        name: header.name,
        byte_count: sent,
    })
}

/// Write one complete transfer (header + `header.content_length` bytes of
/// `content`) and flush.
pub async fn write_transfer<W, R, F>(
    writer: &mut W,
    header: &FileHeader,
    mut content: R,
    on_progress: F,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    F: FnMut(u64),
{
    write_header(writer, header).await?;
    writer.flush().await?;

    let sent = copy_content(&mut content, writer, header.content_length, on_progress)
        .await
        .map_err(|e| match e {
            ChatError::TransferIncomplete { expected, received } => {
                ChatError::IoFailure(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "local file shrank while sending: read {} of {} bytes",
                        received, expected
                    ),
                ))
            }
            other => other,
        })?;
    writer.flush().await?;
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::protocol::read_header;

    #[tokio::test]
    async fn test_write_transfer_layout() {
        let header = FileHeader::new("a.txt", 3).unwrap();
        let mut wire = Vec::new();
        let content: &[u8] = b"abc";
        let sent = write_transfer(&mut wire, &header, content, |_| {})
            .await
            .unwrap();
        assert_eq!(sent, 3);

        let mut expected = header.encode().to_vec();
        expected.extend_from_slice(b"abc");
        assert_eq!(wire, expected);

        let mut reader = &wire[..];
        let decoded = read_header(&mut reader).await.unwrap();
        assert_eq!(decoded, header);
        assert_eq!(reader, b"abc");
    }

    #[tokio::test]
    async fn test_write_transfer_short_source() {
        let header = FileHeader::new("grown.log", 10).unwrap();
        let mut wire = Vec::new();
        let content: &[u8] = b"abc";
        let err = write_transfer(&mut wire, &header, content, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::IoFailure(_)), "{err}");
    }

    #[tokio::test]
    async fn test_send_to_closed_port_is_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        tokio::fs::write(&path, b"hi").await.unwrap();

        // Grab a free port, then release it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = send_file_to(addr, &path, None).await.unwrap_err();
        assert!(matches!(err, ChatError::ConnectionFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_missing_local_file_is_io_failure() {
        let err = send_file_to(
            "127.0.0.1:9".parse().unwrap(),
            Path::new("/definitely/not/here.bin"),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::IoFailure(_)), "{err}");
    }
}
