use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::{BUFFER_SIZE, FIXED_HEADER_LEN, MAX_NAME_LENGTH};
use crate::error::{ChatError, Result};

/// Header that precedes the content of every transferred file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub name: String,
    pub content_length: u64,
}

impl FileHeader {
    pub fn new(name: impl Into<String>, content_length: u64) -> Result<Self> {
        let name = name.into();
        if name.len() > MAX_NAME_LENGTH {
            return Err(ChatError::IoFailure(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "file name is {} bytes, max {}",
                    name.len(),
                    MAX_NAME_LENGTH
                ),
            )));
        }
        Ok(Self {
            name,
            content_length,
        })
    }

    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.name.len()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(self.name.len() as u32);
        buf.put_u64(self.content_length);
        buf.put_slice(self.name.as_bytes());
        buf.freeze()
    }
}

/// Write the encoded header. The caller flushes.
pub async fn write_header<W>(writer: &mut W, header: &FileHeader) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&header.encode()).await?;
    Ok(())
}

/// Read the fixed fields and the name.
///
/// A stream that ends anywhere inside the header is `HeaderCorrupted`.
/// Name lengths above [`MAX_NAME_LENGTH`] are refused the same way, even
/// though the length field itself would allow up to `u32::MAX`.
pub async fn read_header<R>(reader: &mut R) -> Result<FileHeader>
where
    R: AsyncRead + Unpin,
{
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    reader
        .read_exact(&mut fixed)
        .await
        .map_err(|e| header_error(e, "stream ended before the length fields"))?;

    let mut fields = &fixed[..];
    let name_len = fields.get_u32() as usize;
    let content_length = fields.get_u64();

    if name_len > MAX_NAME_LENGTH {
        return Err(ChatError::HeaderCorrupted(format!(
            "name length {} exceeds {}",
            name_len, MAX_NAME_LENGTH
        )));
    }

    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name).await.map_err(|e| {
        header_error(
            e,
            &format!("stream ended before the {}-byte name", name_len),
        )
    })?;

    Ok(FileHeader {
        name: String::from_utf8_lossy(&name).into_owned(),
        content_length,
    })
}

fn header_error(err: io::Error, what: &str) -> ChatError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ChatError::HeaderCorrupted(what.to_string())
    } else {
        ChatError::IoFailure(err)
    }
}

/// Copy exactly `len` bytes from `reader` to `writer`.
///
/// Fails with `TransferIncomplete` if `reader` ends first. `on_progress`
/// sees the running total after every chunk.
pub async fn copy_content<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
    mut on_progress: F,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(u64),
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut done: u64 = 0;

    while done < len {
        let to_read = std::cmp::min(BUFFER_SIZE as u64, len - done) as usize;
        let n = reader.read(&mut buffer[..to_read]).await?;
        if n == 0 {
            return Err(ChatError::TransferIncomplete {
                expected: len,
                received: done,
            });
        }
        writer.write_all(&buffer[..n]).await?;
        done += n as u64;
        on_progress(done);
    }

    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_wire_layout() {
        let header = FileHeader::new("a.txt", 3).unwrap();
        let bytes = header.encode();
        assert_eq!(
            &bytes[..],
            &[
                0x00, 0x00, 0x00, 0x05, // name length
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, // content length
                b'a', b'.', b't', b'x', b't',
            ]
        );
        assert_eq!(header.encoded_len(), 17);
    }

    #[test]
    fn test_name_too_long_rejected() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(FileHeader::new(long, 0).is_err());
        assert!(FileHeader::new("x".repeat(MAX_NAME_LENGTH), 0).is_ok());
    }

    #[tokio::test]
    async fn test_read_header_short_fixed_part() {
        let mut input: &[u8] = &[0, 0, 0, 5, 0, 0, 0];
        let err = read_header(&mut input).await.unwrap_err();
        assert!(matches!(err, ChatError::HeaderCorrupted(_)), "{err}");
    }

    #[tokio::test]
    async fn test_read_header_short_name() {
        let mut wire = FileHeader::new("report.pdf", 10).unwrap().encode().to_vec();
        wire.truncate(FIXED_HEADER_LEN + 4);
        let mut input = &wire[..];
        let err = read_header(&mut input).await.unwrap_err();
        assert!(matches!(err, ChatError::HeaderCorrupted(_)), "{err}");
    }

    #[tokio::test]
    async fn test_read_header_oversized_name_length() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(u32::MAX).to_be_bytes());
        wire.extend_from_slice(&0u64.to_be_bytes());
        let mut input = &wire[..];
        let err = read_header(&mut input).await.unwrap_err();
        assert!(matches!(err, ChatError::HeaderCorrupted(_)), "{err}");
    }

    #[tokio::test]
    async fn test_read_header_lossy_name() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&2u32.to_be_bytes());
        wire.extend_from_slice(&0u64.to_be_bytes());
        wire.extend_from_slice(&[0xff, b'a']);
        let mut input = &wire[..];
        let header = read_header(&mut input).await.unwrap();
        assert_eq!(header.name, "\u{fffd}a");
    }

    #[tokio::test]
    async fn test_copy_content_exact_and_short() {
        let mut source: &[u8] = b"hello world";
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        let n = copy_content(&mut source, &mut sink, 5, |done| seen.push(done))
            .await
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(sink, b"hello");
        assert_eq!(seen.last(), Some(&5));
        // Bytes past the declared length stay in the reader.
        assert_eq!(source, b" world");

        let mut short: &[u8] = b"abc";
        let mut sink = Vec::new();
        let err = copy_content(&mut short, &mut sink, 10, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::TransferIncomplete {
                expected: 10,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_copy_content_zero_length() {
        let mut source: &[u8] = b"";
        let mut sink = Vec::new();
        let n = copy_content(&mut source, &mut sink, 0, |_| {}).await.unwrap();
        assert_eq!(n, 0);
        assert!(sink.is_empty());
    }
}
