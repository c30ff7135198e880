use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};

/// Default upper bound for the bytes buffered while waiting for a single frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = frame::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > self.max_frame_size {
            return Err(frame::Error::FrameTooLarge {
                size: src.len(),
                limit: self.max_frame_size,
            });
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            // Not enough data to parse a frame.
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => return Err(err),
        };

        // The cursor never moves past the end of the buffer.
        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = frame::Error;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&frame.serialize());
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = frame::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<&Frame>::encode(self, &frame, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_waits_for_a_complete_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfo"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        // Nothing is consumed until the frame is complete.
        assert_eq!(buf.len(), 19);

        buf.extend_from_slice(b"o\r\n");
        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(
            frame,
            Some(Frame::Array(vec![
                Frame::Bulk(Bytes::from("GET")),
                Frame::Bulk(Bytes::from("foo")),
            ]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_leaves_pipelined_frames_in_the_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"+OK\r\n:42\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("OK".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Integer(42)));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_rejects_oversized_buffers() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"$10\r\n0123456789\r\n"[..]);

        let err = codec.decode(&mut buf).unwrap_err();

        assert!(matches!(
            err,
            frame::Error::FrameTooLarge { size: 17, limit: 8 }
        ));
    }

    #[test]
    fn decode_rejects_deeply_nested_arrays() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*1\r\n".repeat(200_000)[..]);

        let err = codec.decode(&mut buf).unwrap_err();

        assert!(matches!(err, frame::Error::NestingTooDeep(_)));
    }

    #[test]
    fn encode_appends_serialized_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        codec
            .encode(Frame::Bulk(Bytes::from("bar")), &mut buf)
            .unwrap();
        codec
            .encode(&Frame::Simple("OK".to_string()), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], b"$3\r\nbar\r\n+OK\r\n");
    }
}
