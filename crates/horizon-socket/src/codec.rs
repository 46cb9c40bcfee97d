//! Text codec used to convert between socket bytes and command strings.

use encoding_rs::{CoderResult, Decoder, Encoding};

use crate::error::{Result, SocketError};

/// A resolved text encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl TextCodec {
    /// Resolve a WHATWG encoding label such as `"utf-8"` or `"latin1"`.
    ///
    /// Labels that can only be decoded, such as `"replacement"`, are rejected.
    pub fn for_label(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| SocketError::config(format!("unknown encoding '{label}'")))?;
        if !is_utf16(encoding) && encoding.output_encoding() != encoding {
            return Err(SocketError::config(format!(
                "encoding '{label}' cannot be used for writing"
            )));
        }
        Ok(Self { encoding })
    }

    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Encode `text` for the wire.
    ///
    /// Fails with [`SocketError::Encode`] if `text` holds a character the
    /// encoding cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        if self.encoding == encoding_rs::UTF_16LE {
            return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
        }
        if self.encoding == encoding_rs::UTF_16BE {
            return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
        }

        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(SocketError::Encode {
                encoding: self.name(),
                character: self.first_unmappable(text),
            });
        }
        Ok(bytes.into_owned())
    }

    fn first_unmappable(&self, text: &str) -> char {
        let mut utf8 = [0u8; 4];
        text.chars()
            .find(|c| self.encoding.encode(c.encode_utf8(&mut utf8)).2)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Start a streaming decoder.
    pub fn decoder(&self) -> StreamDecoder {
        StreamDecoder {
            codec: *self,
            inner: self.encoding.new_decoder_without_bom_handling(),
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
        }
    }
}

// encoding_rs only decodes UTF-16; its encoder falls back to UTF-8.
fn is_utf16(encoding: &'static Encoding) -> bool {
    encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE
}

/// Decoder that keeps partial multi-byte sequences between chunks.
///
/// A character split across two socket receives is emitted whole once its
/// last byte arrives. Malformed input decodes to U+FFFD.
pub struct StreamDecoder {
    codec: TextCodec,
    inner: Decoder,
}

impl StreamDecoder {
    /// Decode one chunk, returning the complete characters it finishes.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.run(bytes, false)
    }

    /// Decode any bytes still pending and reset the decoder.
    pub fn finish(&mut self) -> String {
        let tail = self.run(&[], true);
        self.reset();
        tail
    }

    /// Drop any pending partial sequence.
    pub fn reset(&mut self) {
        self.inner = self.codec.encoding.new_decoder_without_bom_handling();
    }

    fn run(&mut self, mut bytes: &[u8], last: bool) -> String {
        let mut out = String::new();
        loop {
            let needed = self
                .inner
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len() * 3 + 16);
            out.reserve(needed);
            let (result, read, _) = self.inner.decode_to_string(bytes, &mut out, last);
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => return out,
                CoderResult::OutputFull => continue,
            }
        }
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("encoding", &self.codec.name())
            .finish()
    }
}
