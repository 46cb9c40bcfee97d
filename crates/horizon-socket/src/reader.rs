//! Delimiter-driven reads with a carry-over buffer.
//!
//! A single receive can hold the tail of one message and the head of the
//! next. [`DelimitedReader`] returns everything before the first delimiter
//! occurrence, drops the delimiter, and keeps the remainder for the next call.

use std::time::Instant;

use horizon_socket_core::logging::targets;

use crate::codec::{StreamDecoder, TextCodec};
use crate::controller::{ConnectionController, Received};
use crate::error::Result;

/// Reads text from a [`ConnectionController`] up to a delimiter or timeout.
#[derive(Debug)]
pub struct DelimitedReader {
    buffer: String,
    decoder: StreamDecoder,
    recv_buf: Vec<u8>,
}

impl DelimitedReader {
    /// Create a reader decoding with `codec`, pulling at most
    /// `recv_buffer_size` bytes per receive.
    pub fn new(codec: TextCodec, recv_buffer_size: usize) -> Self {
        Self {
            buffer: String::new(),
            decoder: codec.decoder(),
            recv_buf: vec![0u8; recv_buffer_size.max(1)],
        }
    }

    /// Text already received but not yet returned to a caller.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Discard buffered text and any partially decoded character.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.decoder.reset();
    }

    /// Read whatever arrives within one timeout window.
    ///
    /// Equivalent to [`read_until`](Self::read_until) with no delimiter.
    pub fn read(&mut self, controller: &mut ConnectionController) -> Result<String> {
        self.read_until(controller, None)
    }

    /// Read until `delimiter` or until the receive times out.
    ///
    /// - With a delimiter, returns the text before its first occurrence and
    ///   keeps the text after it for the next call. The delimiter itself is
    ///   never returned. A delimiter split across receives is still found.
    /// - Without a delimiter (or with an empty one), buffered text is returned
    ///   as is; otherwise data is accumulated until the receive times out, or
    ///   in non-blocking mode until nothing more is pending.
    /// - Buffered text without the delimiter is returned as is when nothing
    ///   more is pending on the socket, so a second call after a split does
    ///   not wait for a timeout.
    /// - A timeout returns the partial text; it is not an error.
    /// - End-of-stream returns the partial text and moves the connection to
    ///   `Fault`, with or without a delimiter and in non-blocking mode too. No
    ///   error is raised; the next reconnect replaces the socket.
    ///
    /// With a zero read timeout and a delimiter that never arrives this loops
    /// until the peer sends it, closes, or the socket fails.
    #[tracing::instrument(skip_all, target = "horizon_socket::reader", level = "trace")]
    pub fn read_until(
        &mut self,
        controller: &mut ConnectionController,
        delimiter: Option<&str>,
    ) -> Result<String> {
        let delimiter = delimiter.filter(|d| !d.is_empty());
        tracing::debug!(target: targets::READER, ?delimiter, buffer = %self.buffer, "ReadUntil");

        let poll_interval = controller.config().poll_interval();
        let started = Instant::now();
        let mut output = String::new();

        loop {
            std::thread::sleep(poll_interval);

            let from_buffer = !self.buffer.is_empty();
            let mut peer_closed = false;
            let chunk = if from_buffer {
                std::mem::take(&mut self.buffer)
            } else {
                match controller.receive(&mut self.recv_buf)? {
                    Received::Data(n) => self.decoder.decode(&self.recv_buf[..n]),
                    Received::Empty if delimiter.is_none() => break,
                    Received::Empty => continue,
                    Received::TimedOut => {
                        tracing::debug!(
                            target: targets::READER,
                            "Socket timeout after {} ms",
                            started.elapsed().as_millis()
                        );
                        break;
                    }
                    Received::Eof => {
                        peer_closed = true;
                        self.decoder.finish()
                    }
                }
            };

            let search_from = match delimiter {
                Some(d) => floor_char_boundary(&output, output.len().saturating_sub(d.len() - 1)),
                None => output.len(),
            };
            output.push_str(&chunk);

            if let Some(d) = delimiter
                && let Some(offset) = output[search_from..].find(d)
            {
                let at = search_from + offset;
                self.buffer = output[at + d.len()..].to_string();
                output.truncate(at);
                tracing::debug!(
                    target: targets::READER,
                    output = %output,
                    buffer = %self.buffer,
                    "ReadUntil({d}) matched"
                );
                if peer_closed {
                    controller.mark_peer_closed();
                }
                return Ok(output);
            }

            if peer_closed {
                controller.mark_peer_closed();
                break;
            }
            if from_buffer && (delimiter.is_none() || !controller.has_pending_input()) {
                break;
            }
        }

        Ok(output)
    }
}

/// Largest char boundary of `s` at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SocketConfig;
    use crate::state::ConnectionState;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    fn connected(timeout: Duration) -> (ConnectionController, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut controller =
            ConnectionController::new(SocketConfig::new("127.0.0.1", port).read_timeout(timeout));
        controller.reconnect().unwrap();
        let (peer, _) = listener.accept().unwrap();
        (controller, peer)
    }

    fn reader() -> DelimitedReader {
        DelimitedReader::new(TextCodec::default(), 1024)
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 0), 0);
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 10), 3);
    }

    #[test]
    fn test_split_at_first_delimiter() {
        let (mut controller, mut peer) = connected(Duration::from_millis(100));
        let mut reader = reader();

        peer.write_all(b"one\r\ntwo\r\nthree").unwrap();

        assert_eq!(reader.read_until(&mut controller, Some("\r\n")).unwrap(), "one");
        assert_eq!(reader.buffered(), "two\r\nthree");
        assert_eq!(reader.read_until(&mut controller, Some("\r\n")).unwrap(), "two");
        assert_eq!(reader.buffered(), "three");
    }

    #[test]
    fn test_read_returns_buffer_without_socket_wait() {
        let (mut controller, mut peer) = connected(Duration::from_secs(5));
        let mut reader = reader();

        peer.write_all(b"ACK;rest").unwrap();
        assert_eq!(reader.read_until(&mut controller, Some(";")).unwrap(), "ACK");

        let started = Instant::now();
        assert_eq!(reader.read(&mut controller).unwrap(), "rest");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(reader.buffered(), "");
    }

    #[test]
    fn test_timeout_returns_partial_data() {
        let (mut controller, mut peer) = connected(Duration::from_millis(50));
        let mut reader = reader();

        peer.write_all(b"no terminator here").unwrap();
        let text = reader.read_until(&mut controller, Some("\n")).unwrap();

        assert_eq!(text, "no terminator here");
        assert_eq!(controller.state(), ConnectionState::Open);
    }

    #[test]
    fn test_empty_delimiter_means_none() {
        let (mut controller, mut peer) = connected(Duration::from_millis(50));
        let mut reader = reader();

        peer.write_all(b"abc").unwrap();
        assert_eq!(reader.read_until(&mut controller, Some("")).unwrap(), "abc");
    }

    #[test]
    fn test_eof_returns_partial_and_faults() {
        let (mut controller, mut peer) = connected(Duration::from_secs(5));
        let mut reader = reader();

        peer.write_all(b"last words").unwrap();
        drop(peer);

        let text = reader.read_until(&mut controller, Some("\n")).unwrap();
        assert_eq!(text, "last words");
        assert_eq!(controller.state(), ConnectionState::Fault);
    }

    #[test]
    fn test_non_blocking_read_returns_pending_chunk() {
        let (mut controller, mut peer) = connected(Duration::ZERO);
        let mut reader = reader();

        assert_eq!(reader.read(&mut controller).unwrap(), "");

        peer.write_all(b"pending").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reader.read(&mut controller).unwrap(), "pending");
    }

    #[test]
    fn test_read_without_connection_faults() {
        let mut controller = ConnectionController::new(SocketConfig::new("127.0.0.1", 1));
        let mut reader = reader();

        assert!(reader.read(&mut controller).is_err());
        assert_eq!(controller.state(), ConnectionState::Fault);
    }

    #[test]
    fn test_clear_discards_buffer() {
        let (mut controller, mut peer) = connected(Duration::from_millis(50));
        let mut reader = reader();

        peer.write_all(b"a|b").unwrap();
        assert_eq!(reader.read_until(&mut controller, Some("|")).unwrap(), "a");
        reader.clear();
        assert_eq!(reader.buffered(), "");
    }

    #[test]
    fn test_read_until_returns_suffix_without_socket_wait() {
        let (mut controller, mut peer) = connected(Duration::from_secs(2));
        let mut reader = reader();

        peer.write_all(b"pre;post").unwrap();
        assert_eq!(reader.read_until(&mut controller, Some(";")).unwrap(), "pre");

        let started = Instant::now();
        assert_eq!(reader.read_until(&mut controller, Some(";")).unwrap(), "post");
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(controller.state(), ConnectionState::Open);
    }

    #[test]
    fn test_buffered_prefix_joins_pending_data() {
        let (mut controller, mut peer) = connected(Duration::from_millis(500));
        let mut reader = reader();

        peer.write_all(b"a;b").unwrap();
        assert_eq!(reader.read_until(&mut controller, Some(";")).unwrap(), "a");

        peer.write_all(b"c;d").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reader.read_until(&mut controller, Some(";")).unwrap(), "bc");
        assert_eq!(reader.buffered(), "d");
    }

    #[test]
    fn test_non_blocking_eof_faults() {
        let (mut controller, mut peer) = connected(Duration::ZERO);
        let mut reader = reader();

        peer.write_all(b"bye").unwrap();
        drop(peer);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(reader.read(&mut controller).unwrap(), "bye");
        assert_eq!(controller.state(), ConnectionState::Fault);
    }
}
