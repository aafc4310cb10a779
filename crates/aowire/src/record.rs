use bytes::Bytes;
use bytes::BytesMut;
use memchr::memchr;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    buf: BytesMut,
    max_record_len: usize,
}

impl<R> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
            max_record_len: 16 * 1024,
        }
    }

    pub fn max_record_len(mut self, max: usize) -> Self {
        self.max_record_len = max.max(1);
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Feed bytes that arrived out of band (e.g. from a WebSocket message)
    /// into the record buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop one buffered record without reading from the inner source.
    pub fn pop_buffered(&mut self) -> Option<Bytes> {
        let i = memchr(b'%', &self.buf)?;
        let raw = self.buf.split_to(i + 1);
        Some(trim_record(raw.freeze()))
    }
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    /// Read one `%`-delimited record, trimming surrounding whitespace.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` for a record (may be empty),
    /// - `Ok(None)` on EOF. A partial record left in the buffer at EOF is
    ///   discarded, never surfaced.
    pub async fn read_record(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(rec) = self.pop_buffered() {
                return Ok(Some(rec));
            }

            if self.buf.len() > self.max_record_len {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "record too long",
                ));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }
}

fn trim_record(b: Bytes) -> Bytes {
    let mut start = 0usize;
    let mut end = b.len();
    // Drop the '%' delimiter itself.
    if end > 0 && b[end - 1] == b'%' {
        end -= 1;
    }
    while start < end && b[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && b[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    b.slice(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_delimited_records() {
        let (a, b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut b = b;
            b.write_all(b"HI#abc#%ID#AO2#2.10#%").await.unwrap();
        });

        let mut rr = RecordReader::new(a);
        let r1 = rr.read_record().await.unwrap().unwrap();
        let r2 = rr.read_record().await.unwrap().unwrap();
        assert_eq!(&r1[..], b"HI#abc#");
        assert_eq!(&r2[..], b"ID#AO2#2.10#");
        assert!(rr.read_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trims_surrounding_whitespace() {
        let (a, b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut b = b;
            b.write_all(b"\r\nCH#  %").await.unwrap();
        });

        let mut rr = RecordReader::new(a);
        let r = rr.read_record().await.unwrap().unwrap();
        assert_eq!(&r[..], b"CH#");
    }

    #[tokio::test]
    async fn discards_partial_record_at_eof() {
        let (a, b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut b = b;
            b.write_all(b"CH#%HI#trunc").await.unwrap();
        });

        let mut rr = RecordReader::new(a);
        assert!(rr.read_record().await.unwrap().is_some());
        assert!(rr.read_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_oversized_record() {
        let (a, b) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let mut b = b;
            b.write_all(&[b'a'; 512]).await.unwrap();
        });

        let mut rr = RecordReader::new(a).max_record_len(64);
        let err = rr.read_record().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn push_feeds_out_of_band_bytes() {
        let (a, _b) = tokio::io::duplex(64);
        let mut rr = RecordReader::new(a);
        rr.push(b"MS#chat#%CH");
        assert_eq!(&rr.pop_buffered().unwrap()[..], b"MS#chat#");
        assert!(rr.pop_buffered().is_none());
        rr.push(b"#%");
        assert_eq!(&rr.pop_buffered().unwrap()[..], b"CH#");
    }
}
