//! Packet framing over a byte stream
//!
//! The server terminates every packet with a blank line (`\r\n\r\n`). There
//! is no length prefix, so the reader accumulates bytes until the terminator
//! appears and has no built-in upper bound on packet size.

use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::{
    buffer::PacketBuffer,
    constants::{PACKET_TERMINATOR, SOCKET_BUF_SIZE},
    error::{AmiError, AmiResult},
};

/// Splits a byte stream into raw packet strings.
///
/// Yields each packet's text with the terminator removed, in wire order.
/// Once the peer closes the stream (a zero-byte read) or a read fails, the
/// reader is finished and every later call returns `Ok(None)`.
pub struct FrameReader<R> {
    reader: R,
    buffer: PacketBuffer,
    read_buf: Vec<u8>,
    max_packet_size: Option<usize>,
    finished: bool,
}

impl<R> std::fmt::Debug for FrameReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buffer.len())
            .field("max_packet_size", &self.max_packet_size)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Reader with the default chunk size and no packet size limit.
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, SOCKET_BUF_SIZE, None)
    }

    /// Reader with an explicit socket read chunk size and an optional cap on
    /// how many bytes may be buffered while waiting for a terminator.
    pub fn with_limits(reader: R, read_buffer_size: usize, max_packet_size: Option<usize>) -> Self {
        Self {
            reader,
            buffer: PacketBuffer::new(),
            read_buf: vec![0u8; read_buffer_size.max(1)],
            max_packet_size,
            finished: false,
        }
    }

    /// Wait for the next complete packet.
    ///
    /// Returns `Ok(None)` at end of stream. A partial packet left in the
    /// buffer when the peer closes is discarded.
    pub async fn next_packet(&mut self) -> AmiResult<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            if let Some(frame) = self
                .buffer
                .take_until(PACKET_TERMINATOR.as_bytes())
            {
                trace!("[RECV] Framed packet of {} bytes", frame.len());
                return Ok(Some(String::from_utf8_lossy(&frame[..]).into_owned()));
            }

            if let Some(max) = self.max_packet_size {
                if self.buffer.len() > max {
                    self.finished = true;
                    return Err(AmiError::PacketTooLarge {
                        size: self.buffer.len(),
                        max,
                    });
                }
            }

            let bytes_read = match self
                .reader
                .read(&mut self.read_buf)
                .await
            {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(AmiError::Io(e));
                }
            };

            if bytes_read == 0 {
                if !self
                    .buffer
                    .is_empty()
                {
                    debug!(
                        "[RECV] Stream closed with {} bytes of incomplete packet",
                        self.buffer.len()
                    );
                }
                self.buffer
                    .clear();
                self.finished = true;
                return Ok(None);
            }

            trace!("[RECV] Read {} bytes from socket", bytes_read);
            self.buffer
                .extend_from_slice(&self.read_buf[..bytes_read]);
        }
    }

    /// `true` once end of stream or a read error has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Turn the reader into a lazy stream of packets.
    ///
    /// The stream ends at end of input. A read error is yielded once and then
    /// the stream ends.
    pub fn into_stream(self) -> impl Stream<Item = AmiResult<String>> {
        futures_util::stream::unfold(self, |mut reader| async move {
            match reader
                .next_packet()
                .await
            {
                Ok(Some(packet)) => Some((Ok(packet), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    /// Give back the underlying reader, dropping any buffered bytes.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn yields_each_packet_in_order() {
        let mock = Builder::new()
            .read(b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n")
            .read(b"Event: FullyBooted\r\nStatus: Fully Booted\r\n\r\n")
            .build();
        let mut reader = FrameReader::new(mock);

        assert_eq!(
            reader
                .next_packet()
                .await
                .unwrap()
                .as_deref(),
            Some("Response: Success\r\nMessage: Authentication accepted")
        );
        assert_eq!(
            reader
                .next_packet()
                .await
                .unwrap()
                .as_deref(),
            Some("Event: FullyBooted\r\nStatus: Fully Booted")
        );
        assert_eq!(
            reader
                .next_packet()
                .await
                .unwrap(),
            None
        );
        assert!(reader.is_finished());
    }

    #[tokio::test]
    async fn partial_reads_are_reassembled() {
        let mock = Builder::new()
            .read(b"Event: New")
            .read(b"channel\r\nChannel: SIP/100")
            .read(b"\r\n\r")
            .read(b"\nEvent: Hangup\r\n\r\n")
            .build();
        let packets: Vec<String> = FrameReader::new(mock)
            .into_stream()
            .map(|p| p.unwrap())
            .collect()
            .await;
        assert_eq!(
            packets,
            vec![
                "Event: Newchannel\r\nChannel: SIP/100".to_string(),
                "Event: Hangup".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn many_packets_in_one_read() {
        let packets = ["A: 1", "B: 2\r\nC: 3", "D: 4"];
        let wire: String = packets
            .iter()
            .map(|p| format!("{p}\r\n\r\n"))
            .collect();
        let mock = Builder::new()
            .read(wire.as_bytes())
            .build();
        let got: Vec<String> = FrameReader::new(mock)
            .into_stream()
            .map(|p| p.unwrap())
            .collect()
            .await;
        assert_eq!(got, packets);
    }

    #[tokio::test]
    async fn small_read_chunks() {
        let mock = Builder::new()
            .read(b"Asterisk Call Manager/9.0.0\r\nA: 1\r\n\r\nB: 2\r\n\r\n")
            .build();
        let got: Vec<String> = FrameReader::with_limits(mock, 3, None)
            .into_stream()
            .map(|p| p.unwrap())
            .collect()
            .await;
        assert_eq!(got, vec!["Asterisk Call Manager/9.0.0\r\nA: 1", "B: 2"]);
    }

    #[tokio::test]
    async fn incomplete_packet_at_eof_is_dropped() {
        let mock = Builder::new()
            .read(b"A: 1\r\n\r\nB: 2\r\n")
            .build();
        let mut reader = FrameReader::new(mock);
        assert_eq!(
            reader
                .next_packet()
                .await
                .unwrap()
                .as_deref(),
            Some("A: 1")
        );
        assert!(reader
            .next_packet()
            .await
            .unwrap()
            .is_none());
        assert!(reader
            .next_packet()
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn read_error_ends_stream() {
        let mock = Builder::new()
            .read(b"A: 1\r\n\r\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut stream = Box::pin(FrameReader::new(mock).into_stream());

        assert_eq!(
            stream
                .next()
                .await
                .unwrap()
                .unwrap(),
            "A: 1"
        );
        assert!(matches!(
            stream
                .next()
                .await,
            Some(Err(AmiError::Io(_)))
        ));
        assert!(stream
            .next()
            .await
            .is_none());
    }

    #[tokio::test]
    async fn size_limit_is_enforced_when_configured() {
        let mock = Builder::new()
            .read(b"Key: 0123456789abcdef")
            .build();
        let mut reader = FrameReader::with_limits(mock, 64, Some(8));
        assert!(matches!(
            reader
                .next_packet()
                .await,
            Err(AmiError::PacketTooLarge { max: 8, .. })
        ));
        assert!(reader
            .next_packet()
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn non_utf8_is_replaced_not_rejected() {
        let mock = Builder::new()
            .read(b"Name: caf\xe9\r\n\r\n")
            .build();
        let mut reader = FrameReader::new(mock);
        let packet = reader
            .next_packet()
            .await
            .unwrap()
            .unwrap();
        assert!(packet.starts_with("Name: caf"));
        assert!(packet.ends_with('\u{FFFD}'));
    }
}
