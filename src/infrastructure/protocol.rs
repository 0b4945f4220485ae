//! Binary wire protocol.
//!
//! Every message starts with a big-endian `u32` type tag. Variable-length
//! fields (topic names, payloads) are length-prefixed with a `u32`; there is
//! no outer frame length, so the decoder reads exactly the bytes each variant
//! defines. Numeric fields are big-endian.
//!
//! Request layouts after the tag:
//! * `Metadata`: no further fields.
//! * `Read`: topic length `u32`, topic bytes, partition `u32`, last seen
//!   offset `u64`.
//! * `Write`: topic length `u32`, topic bytes, partition `u32`, payload
//!   length `u32`, payload bytes.
//!
//! Response layouts after the tag:
//! * `Metadata`: no further fields.
//! * `Read`: offset `u64`, payload length `u32`, payload bytes.
//! * `Write`: assigned offset `i64`.
//! * `Error`: message length `u32`, message bytes.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{Offset, PartitionId, TopicName};

/// Upper bound for any length-prefixed field.
pub const MAX_FIELD_LEN: u32 = 1024 * 1024;

/// Wire tags shared by requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Metadata = 0,
    Read = 1,
    Write = 2,
    Error = 3,
}

impl TryFrom<u32> for MessageType {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, WireError> {
        match value {
            0 => Ok(MessageType::Metadata),
            1 => Ok(MessageType::Read),
            2 => Ok(MessageType::Write),
            3 => Ok(MessageType::Error),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("field of {len} bytes exceeds limit of {max}")]
    FieldTooLarge { len: u32, max: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A client-to-broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Metadata,
    Read {
        topic: TopicName,
        partition: PartitionId,
        last_offset: Offset,
    },
    Write {
        topic: TopicName,
        partition: PartitionId,
        payload: Bytes,
    },
}

impl Request {
    /// Read requests leave the session open for further polls; everything
    /// else is answered once and the connection closed.
    pub fn keep_alive(&self) -> bool {
        matches!(self, Request::Read { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Metadata => "metadata",
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
        }
    }

    pub async fn decode<R>(reader: &mut R) -> Result<Self, WireError>
    where
        R: AsyncRead + Unpin,
    {
        let tag = reader.read_u32().await?;
        Self::decode_body(reader, tag).await
    }

    /// Like `decode`, but a peer that closes cleanly between frames yields
    /// `Ok(None)`. EOF after the first byte of a frame is still an error.
    pub async fn decode_opt<R>(reader: &mut R) -> Result<Option<Self>, WireError>
    where
        R: AsyncRead + Unpin,
    {
        let mut tag = [0u8; 4];
        let n = reader.read(&mut tag).await?;
        if n == 0 {
            return Ok(None);
        }
        reader.read_exact(&mut tag[n..]).await?;
        Self::decode_body(reader, u32::from_be_bytes(tag))
            .await
            .map(Some)
    }

    async fn decode_body<R>(reader: &mut R, tag: u32) -> Result<Self, WireError>
    where
        R: AsyncRead + Unpin,
    {
        match MessageType::try_from(tag)? {
            MessageType::Metadata => Ok(Request::Metadata),
            MessageType::Read => {
                let topic = TopicName::from(read_field(reader).await?);
                let partition = PartitionId::new(reader.read_u32().await?);
                let last_offset = Offset::new(reader.read_u64().await?);
                Ok(Request::Read {
                    topic,
                    partition,
                    last_offset,
                })
            }
            MessageType::Write => {
                let topic = TopicName::from(read_field(reader).await?);
                let partition = PartitionId::new(reader.read_u32().await?);
                let payload = read_field(reader).await?;
                Ok(Request::Write {
                    topic,
                    partition,
                    payload,
                })
            }
            MessageType::Error => Err(WireError::UnknownMessageType(tag)),
        }
    }

    pub async fn encode<W>(&self, writer: &mut W) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::new();
        match self {
            Request::Metadata => {
                buf.put_u32(MessageType::Metadata as u32);
            }
            Request::Read {
                topic,
                partition,
                last_offset,
            } => {
                buf.put_u32(MessageType::Read as u32);
                put_field(&mut buf, topic.as_bytes())?;
                buf.put_u32(partition.value());
                buf.put_u64(last_offset.value());
            }
            Request::Write {
                topic,
                partition,
                payload,
            } => {
                buf.put_u32(MessageType::Write as u32);
                put_field(&mut buf, topic.as_bytes())?;
                buf.put_u32(partition.value());
                put_field(&mut buf, payload)?;
            }
        }
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// A broker-to-client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Metadata,
    Read { offset: Offset, payload: Bytes },
    Write { offset: Offset },
    Error { message: Bytes },
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Metadata => "metadata",
            Response::Read { .. } => "read",
            Response::Write { .. } => "write",
            Response::Error { .. } => "error",
        }
    }

    pub async fn decode<R>(reader: &mut R) -> Result<Self, WireError>
    where
        R: AsyncRead + Unpin,
    {
        let tag = reader.read_u32().await?;
        match MessageType::try_from(tag)? {
            MessageType::Metadata => Ok(Response::Metadata),
            MessageType::Read => {
                let offset = Offset::new(reader.read_u64().await?);
                let payload = read_field(reader).await?;
                Ok(Response::Read { offset, payload })
            }
            MessageType::Write => {
                let offset = Offset::new(reader.read_i64().await? as u64);
                Ok(Response::Write { offset })
            }
            MessageType::Error => {
                let message = read_field(reader).await?;
                Ok(Response::Error { message })
            }
        }
    }

    pub async fn encode<W>(&self, writer: &mut W) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::new();
        match self {
            Response::Metadata => {
                buf.put_u32(MessageType::Metadata as u32);
            }
            Response::Read { offset, payload } => {
                buf.put_u32(MessageType::Read as u32);
                buf.put_u64(offset.value());
                put_field(&mut buf, payload)?;
            }
            Response::Write { offset } => {
                buf.put_u32(MessageType::Write as u32);
                buf.put_i64(offset.value() as i64);
            }
            Response::Error { message } => {
                buf.put_u32(MessageType::Error as u32);
                put_field(&mut buf, message)?;
            }
        }
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

async fn read_field<R>(reader: &mut R) -> Result<Bytes, WireError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FIELD_LEN {
        return Err(WireError::FieldTooLarge {
            len,
            max: MAX_FIELD_LEN,
        });
    }
    let mut field = vec![0u8; len as usize];
    reader.read_exact(&mut field).await?;
    Ok(Bytes::from(field))
}

fn put_field(buf: &mut BytesMut, field: &[u8]) -> Result<(), WireError> {
    if field.len() > MAX_FIELD_LEN as usize {
        return Err(WireError::FieldTooLarge {
            len: field.len() as u32,
            max: MAX_FIELD_LEN,
        });
    }
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
    Ok(())
}
