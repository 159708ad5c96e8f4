use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::constants::{BUFFER_SIZE, UNNAMED_FILE};
use super::progress::ProgressReporter;
use super::protocol::{copy_content, read_header};
use crate::EventSink;
use crate::error::Result;

/// A file that was fully received and written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub byte_count: u64,
    pub path: PathBuf,
}

/// Accept one connection on `listener` and receive a single file from it.
pub async fn accept_once(
    listener: &TcpListener,
    download_dir: &Path,
    events: Option<&EventSink>,
) -> Result<(ReceivedFile, SocketAddr)> {
    let (mut stream, remote_addr) = listener.accept().await?;
    info!("Incoming file connection from {}", remote_addr);
    let received = receive_file(&mut stream, download_dir, events).await?;
    Ok((received, remote_addr))
}

/// Read one transfer from `stream` and materialize it under `download_dir`.
///
/// The received name is joined verbatim: separators, `..` components and
/// absolute paths all take effect. An empty name is reported as-is but its
/// content lands in [`UNNAMED_FILE`]. An existing file is never overwritten.
/// On failure whatever was already written stays on disk.
pub async fn receive_file<R>(
    stream: &mut R,
    download_dir: &Path,
    events: Option<&EventSink>,
) -> Result<ReceivedFile>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, stream);
    let header = read_header(&mut reader).await?;
    info!(
        "Receiving file: {} ({} bytes)",
        header.name, header.content_length
    );

    let (path, file) = if header.name.is_empty() {
        create_unnamed(download_dir).await?
    } else {
        let path = download_dir.join(&header.name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        (path, file)
    };
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

    let mut progress = ProgressReporter::new(events, &header.name, header.content_length, false);
    let copied = copy_content(
        &mut reader,
        &mut writer,
        header.content_length,
        |done| progress.update(done),
    )
    .await;
    let flushed = writer.flush().await;

    let byte_count = match copied {
        Ok(n) => n,
        Err(e) => {
            warn!("Transfer of {} failed: {}", header.name, e);
            return Err(e);
        }
    };
    flushed?;

    Ok(ReceivedFile {
        name: header.name,
        byte_count,
        path,
    })
}

/// First free placeholder path in `download_dir`.
async fn create_unnamed(download_dir: &Path) -> Result<(PathBuf, File)> {
    let mut suffix = 0u32;
    loop {
        let name = match suffix {
            0 => UNNAMED_FILE.to_string(),
            n => format!("{}.{}", UNNAMED_FILE, n),
        };
        let path = download_dir.join(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && suffix < u32::MAX => {
                suffix += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
