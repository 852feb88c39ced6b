use crate::error::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Max bytes a WebSocket frame header can occupy: 2 base + 8 extended
/// length + 4 masking key. See RFC 6455 §5.2.
pub const MAX_HEADER_BYTES: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single WebSocket frame: one unit of wire transmission. A message may
/// be split across several frames (`final_fragment = false` until the
/// last one).
#[derive(Debug, Clone)]
pub struct Frame {
    pub final_fragment: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(final_fragment: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            final_fragment,
            opcode,
            payload,
        }
    }

    /// Reads one frame off `reader`, unmasking the payload if the frame
    /// carries a masking key (as client-to-server frames must, per RFC
    /// 6455).
    ///
    /// Built on `AsyncReadExt::read_exact`, which blocks until enough
    /// bytes have arrived regardless of how the underlying stream splits
    /// them across TCP segments — the Tokio-native equivalent of feeding
    /// arbitrary byte spans through a header/payload state machine.
    pub async fn read_from<R: AsyncRead + Unpin>(
        reader: &mut R,
        max_frame_size: usize,
    ) -> Result<Frame, Error> {
        let mut header = [0u8; 2];
        reader.read_exact(&mut header).await?;

        let final_fragment = (header[0] & 0b1000_0000) != 0;
        let opcode = OpCode::from_byte(header[0] & 0b0000_1111)?;

        let rsv1 = (header[0] & 0b0100_0000) != 0;
        let rsv2 = (header[0] & 0b0010_0000) != 0;
        let rsv3 = (header[0] & 0b0001_0000) != 0;
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::RSVNotZero);
        }

        if !final_fragment && opcode.is_control() {
            return Err(Error::ControlFramesFragmented);
        }

        let masked = (header[1] & 0b1000_0000) != 0;
        let mut length = (header[1] & 0b0111_1111) as u64;

        if length > 125 && opcode.is_control() {
            return Err(Error::ControlFramePayloadSize);
        }

        if length == 126 {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await?;
            length = u16::from_be_bytes(ext) as u64;
        } else if length == 127 {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext).await?;
            length = u64::from_be_bytes(ext);
        }

        if length as usize > max_frame_size {
            return Err(Error::MaxFrameSize(length as usize, max_frame_size));
        }

        let mask = if masked {
            let mut mask = [0u8; 4];
            reader.read_exact(&mut mask).await?;
            Some(mask)
        } else {
            None
        };

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload).await?;

        if let Some(mask) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % 4];
            }
        }

        Ok(Frame {
            final_fragment,
            opcode,
            payload,
        })
    }

    /// Writes this frame unmasked, as RFC 6455 requires for server-to-client
    /// frames.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), Error> {
        let first_byte = (self.final_fragment as u8) << 7 | self.opcode.as_u8();
        let payload_len = self.payload.len();

        writer.write_all(&[first_byte]).await?;

        if payload_len <= 125 {
            writer.write_all(&[payload_len as u8]).await?;
        } else if payload_len <= 65535 {
            writer
                .write_all(&[126, (payload_len >> 8) as u8, payload_len as u8])
                .await?;
        } else {
            let bytes = (payload_len as u64).to_be_bytes();
            let mut header = [127u8; 9];
            header[1..].copy_from_slice(&bytes);
            writer.write_all(&header).await?;
        }

        writer.write_all(&self.payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_small_frame() {
        let frame = Frame::new(true, OpCode::Text, b"hello".to_vec());
        let mut buf = Vec::new();
        frame.write_to(&mut buf).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let parsed = Frame::read_from(&mut cursor, 1 << 20).await.unwrap();
        assert!(parsed.final_fragment);
        assert_eq!(parsed.opcode, OpCode::Text);
        assert_eq!(parsed.payload, b"hello");
    }

    #[tokio::test]
    async fn round_trips_zero_length_payload() {
        let frame = Frame::new(true, OpCode::Ping, Vec::new());
        let mut buf = Vec::new();
        frame.write_to(&mut buf).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let parsed = Frame::read_from(&mut cursor, 1 << 20).await.unwrap();
        assert_eq!(parsed.payload.len(), 0);
        assert!(parsed.final_fragment);
    }

    #[tokio::test]
    async fn extended_length_126_boundary() {
        let payload = vec![b'a'; 126];
        let frame = Frame::new(true, OpCode::Binary, payload.clone());
        let mut buf = Vec::new();
        frame.write_to(&mut buf).await.unwrap();
        assert_eq!(buf[1], 126);

        let mut cursor = Cursor::new(buf);
        let parsed = Frame::read_from(&mut cursor, 1 << 20).await.unwrap();
        assert_eq!(parsed.payload, payload);
    }

    #[tokio::test]
    async fn extended_length_127_boundary() {
        let payload = vec![b'b'; 70_000];
        let frame = Frame::new(true, OpCode::Binary, payload.clone());
        let mut buf = Vec::new();
        frame.write_to(&mut buf).await.unwrap();
        assert_eq!(buf[1], 127);

        let mut cursor = Cursor::new(buf);
        let parsed = Frame::read_from(&mut cursor, 1 << 21).await.unwrap();
        assert_eq!(parsed.payload, payload);
    }

    #[tokio::test]
    async fn byte_split_independence() {
        let frame = Frame::new(false, OpCode::Binary, vec![1, 2, 3, 4, 5]);
        let mut buf = Vec::new();
        frame.write_to(&mut buf).await.unwrap();

        struct OneByteAtATime(Vec<u8>, usize);
        impl AsyncRead for OneByteAtATime {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                if self.1 < self.0.len() {
                    buf.put_slice(&[self.0[self.1]]);
                    self.1 += 1;
                }
                std::task::Poll::Ready(Ok(()))
            }
        }

        let mut reader = OneByteAtATime(buf, 0);
        let parsed = Frame::read_from(&mut reader, 1 << 20).await.unwrap();
        assert_eq!(parsed.payload, vec![1, 2, 3, 4, 5]);
        assert!(!parsed.final_fragment);
    }

    #[test]
    fn rejects_reserved_opcode() {
        assert!(OpCode::from_byte(0x3).is_err());
        assert!(OpCode::from_byte(0xB).is_err());
    }

    #[test]
    fn control_frame_predicate() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(!OpCode::Continuation.is_control());
    }
}
