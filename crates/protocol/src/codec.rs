//! Newline framing for renderer sessions.
//!
//! Each frame is one compact JSON message followed by `\n`. A line that
//! fails to decode is yielded as `Some(Err(_))` so the stream keeps going;
//! only I/O failures and oversized frames end it.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::constants::MAX_FRAME_SIZE;
use crate::envelope::Message;
use crate::error::DecodeError;

/// Stream-level codec error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl From<CodecError> for std::io::Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Codec for [`Message`] lines, used in both directions.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Bytes already scanned for a newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = Result<Message, DecodeError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(CodecError::FrameTooLarge {
                        size: src.len(),
                        max: MAX_FRAME_SIZE,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let newline = self.next_index + offset;
            self.next_index = 0;
            if newline > MAX_FRAME_SIZE {
                return Err(CodecError::FrameTooLarge {
                    size: newline,
                    max: MAX_FRAME_SIZE,
                });
            }

            let frame = src.split_to(newline + 1);
            let mut line = &frame[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.is_empty() {
                continue;
            }
            return Ok(Some(Message::decode_slice(line)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if !src.is_empty() {
            tracing::debug!(bytes = src.len(), "discarding unterminated trailing bytes");
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<&Message> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.encode();
        if line.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Encodes one message as a complete frame.
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let mut line = message.encode().into_bytes();
    line.push(b'\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MessageType, ROLE_RENDERER};
    use crate::envelope::Payload;

    fn decode_all(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<Result<Message, DecodeError>> {
        let mut out = Vec::new();
        while let Some(item) = codec.decode(buf).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn split_read_yields_one_message() {
        let hello = Message::hello(ROLE_RENDERER, "stage-left");
        let frame = encode_frame(&hello);

        for split in 1..frame.len() {
            let mut codec = LineCodec::new();
            let mut buf = BytesMut::from(&frame[..split]);
            assert!(codec.decode(&mut buf).unwrap().is_none(), "split at {split}");

            buf.extend_from_slice(&frame[split..]);
            let decoded = decode_all(&mut codec, &mut buf);
            assert_eq!(decoded.len(), 1, "split at {split}");
            assert_eq!(decoded[0].as_ref().unwrap(), &hello);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn two_messages_in_one_read() {
        let first = Message::load_scene("scene-1");
        let second = Message::play_cue("cue-42");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(&first));
        buf.extend_from_slice(&encode_frame(&second));

        let decoded = decode_all(&mut LineCodec::new(), &mut buf);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().unwrap(), &first);
        assert_eq!(decoded[1].as_ref().unwrap(), &second);
    }

    #[test]
    fn crlf_and_blank_lines() {
        let ack = Message::ack("cmd-1");
        let mut buf = BytesMut::from("\n\r\n");
        buf.extend_from_slice(ack.encode().as_bytes());
        buf.extend_from_slice(b"\r\n");

        let decoded = decode_all(&mut LineCodec::new(), &mut buf);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap(), &ack);
    }

    #[test]
    fn bad_line_does_not_poison_stream() {
        let mut buf = BytesMut::from("{\"type\":\"bogus\",\"commandId\":\"x\",\"payload\":{}}\n");
        buf.extend_from_slice(&encode_frame(&Message::play_cue("cue-1")));

        let decoded = decode_all(&mut LineCodec::new(), &mut buf);
        assert_eq!(decoded.len(), 2);
        assert!(matches!(
            decoded[0],
            Err(DecodeError::InvalidMessageType(ref s)) if s == "bogus"
        ));
        let msg = decoded[1].as_ref().unwrap();
        assert_eq!(msg.message_type(), MessageType::PlayCue);
        assert!(matches!(&msg.payload, Payload::PlayCue(p) if p.cue_id.value == "cue-1"));
    }

    #[test]
    fn eof_discards_partial_frame() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("{\"type\":\"ack\"");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn eof_still_yields_complete_frames() {
        let mut codec = LineCodec::new();
        let ack = Message::ack("cmd-9");
        let mut buf = BytesMut::from(&encode_frame(&ack)[..]);
        buf.extend_from_slice(b"{\"partial");

        let first = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(first.unwrap(), ack);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&vec![b'x'; MAX_FRAME_SIZE + 1][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn encoder_appends_newline() {
        let mut codec = LineCodec::new();
        let mut dst = BytesMut::new();
        let msg = Message::load_scene("scene-2");
        codec.encode(&msg, &mut dst).unwrap();
        assert_eq!(dst.last(), Some(&b'\n'));
        assert_eq!(dst.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(&dst[..], &encode_frame(&msg)[..]);
    }
}
