//! The [`Message`] definition used for client/server communication.
//!
//! Every request and response travels as a single length-delimited frame:
//!
//! | id (4 bytes) | request_id length (4 bytes) | request_id | payload length (4 bytes) | payload |
//!
//! The id tells the server which command the payload encodes. The request_id
//! is generated by clients and echoed back on responses so that traces on
//! both sides of the wire can be correlated.
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

use crate::error::{Error, InvalidRequest, Result};
use crate::utils::generate_request_id;

/// Maximum accepted payload size, in bytes. Build artifacts can be chunky but
/// a frame larger than this is almost certainly a protocol error.
pub const MAX_MESSAGE_SIZE: u32 = 32 * 1024 * 1024;

/// Trait implemented by command and response types that can be turned into
/// a [`Message`].
pub trait IntoMessage: Serialize {
    fn id(&self) -> u32;
    fn request_id(&self) -> String {
        generate_request_id()
    }
    fn payload(&self) -> Option<Bytes> {
        match serde_json::to_vec(self) {
            Ok(serialized) => Some(Bytes::from(serialized)),
            Err(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    /// Command id this message encodes (see [`crate::cmd`]).
    pub id: u32,
    /// Unique id of the request, echoed on the response.
    pub request_id: String,
    /// json serialized payload
    pub payload: Option<Bytes>,
}

impl Message {
    pub fn new(id: u32, payload: Option<Bytes>) -> Self {
        Self {
            id,
            request_id: generate_request_id(),
            payload,
        }
    }

    /// Constructs a [`Message`] by reading data from the provided [`AsyncRead`] object
    pub async fn try_from_async_read(reader: &mut (impl AsyncRead + Unpin)) -> Result<Self> {
        let id = reader.read_u32().await?;

        let request_id_length = reader.read_u32().await?;
        if request_id_length == 0 {
            return Err(Error::InvalidRequest(
                InvalidRequest::MessageReceivedWithoutRequestId,
            ));
        }
        let mut request_id_buf = vec![0u8; request_id_length as usize];
        reader.read_exact(&mut request_id_buf).await?;
        let request_id = String::from_utf8(request_id_buf).map_err(|_| {
            Error::InvalidRequest(InvalidRequest::MessageRequestIdMustBeUtf8Encoded)
        })?;

        let payload_length = reader.read_u32().await?;
        if payload_length > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidRequest(
                InvalidRequest::MaxMessageSizeExceeded {
                    max: MAX_MESSAGE_SIZE,
                    got: payload_length,
                },
            ));
        }

        let payload = if payload_length == 0 {
            None
        } else {
            let mut buf = vec![0u8; payload_length as usize];
            reader.read_exact(&mut buf).await?;
            Some(buf.into())
        };

        Ok(Self {
            id,
            request_id,
            payload,
        })
    }

    /// Serializes the [`Message`] into the wire format
    pub fn serialize(&self) -> Bytes {
        let payload_length = self.payload.as_ref().map_or(0, |p| p.len());
        let mut buf = BytesMut::with_capacity(12 + self.request_id.len() + payload_length);
        buf.put_u32(self.id);
        buf.put_u32(self.request_id.len() as u32);
        buf.put_slice(self.request_id.as_bytes());
        buf.put_u32(payload_length as u32);
        if let Some(payload) = self.payload.as_ref() {
            buf.put_slice(payload);
        }
        buf.freeze()
    }
}

impl<T: IntoMessage> From<&T> for Message {
    fn from(value: &T) -> Self {
        Self {
            id: value.id(),
            request_id: value.request_id(),
            payload: value.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::Poll;

    use bytes::{BufMut, BytesMut};
    use tokio::io::AsyncRead;

    use super::{Message, MAX_MESSAGE_SIZE};
    use crate::error::{Error, InvalidRequest};

    /// [`AsyncRead`] impl that serves a canned frame byte by byte.
    struct AsyncReadMock {
        data: BytesMut,
        cursor: usize,
    }

    impl AsyncRead for AsyncReadMock {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let this = self.get_mut();
            let remaining = &this.data[this.cursor..];
            let n = std::cmp::min(remaining.len(), buf.remaining());
            buf.put_slice(&remaining[..n]);
            this.cursor += n;
            Poll::Ready(Ok(()))
        }
    }

    fn frame(id: u32, request_id: &str, payload: &[u8]) -> AsyncReadMock {
        let mut data = BytesMut::new();
        data.put_u32(id);
        data.put_u32(request_id.len() as u32);
        data.put_slice(request_id.as_bytes());
        data.put_u32(payload.len() as u32);
        data.put_slice(payload);
        AsyncReadMock { data, cursor: 0 }
    }

    #[tokio::test]
    async fn roundtrip_through_wire_format() {
        let message = Message::new(42, Some("{\"success\":true}".into()));
        let serialized = message.serialize();

        let mut reader = AsyncReadMock {
            data: BytesMut::from(&serialized[..]),
            cursor: 0,
        };
        let parsed = Message::try_from_async_read(&mut reader).await.unwrap();
        assert_eq!(parsed.id, message.id);
        assert_eq!(parsed.request_id, message.request_id);
        assert_eq!(parsed.payload, message.payload);
    }

    #[tokio::test]
    async fn message_above_max_size_is_rejected() {
        let mut data = BytesMut::new();
        data.put_u32(1);
        data.put_u32(4);
        data.put_slice(b"abcd");
        data.put_u32(MAX_MESSAGE_SIZE + 1);
        let mut reader = AsyncReadMock { data, cursor: 0 };

        let err = Message::try_from_async_read(&mut reader).await.err().unwrap();
        match err {
            Error::InvalidRequest(InvalidRequest::MaxMessageSizeExceeded { max, got }) => {
                assert_eq!(max, MAX_MESSAGE_SIZE);
                assert_eq!(got, MAX_MESSAGE_SIZE + 1);
            }
            _ => panic!("unexpected error: {:?}", err),
        }
    }

    #[tokio::test]
    async fn missing_request_id_is_rejected() {
        let mut reader = frame(1, "", b"");
        let err = Message::try_from_async_read(&mut reader).await.err().unwrap();
        assert!(matches!(
            err,
            Error::InvalidRequest(InvalidRequest::MessageReceivedWithoutRequestId)
        ));
    }

    #[tokio::test]
    async fn empty_payload_deserializes_to_none() {
        let mut reader = frame(7, "req-1", b"");
        let parsed = Message::try_from_async_read(&mut reader).await.unwrap();
        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.request_id, "req-1");
        assert!(parsed.payload.is_none());
    }
}
