//! JSON wire codec.
//!
//! Frame layout: one version byte followed by the JSON document.

use crate::domain::{CodecError, RpcRequest, RpcResponse};
use crate::ports::Codec;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current wire format version
pub const WIRE_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn encode<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
        let body = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
        let mut frame = BytesMut::with_capacity(body.len() + 1);
        frame.put_u8(WIRE_VERSION);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        match bytes.split_first() {
            Some((&WIRE_VERSION, body)) => {
                serde_json::from_slice(body).map_err(|e| CodecError::Decode(e.to_string()))
            }
            Some((version, _)) => Err(CodecError::Decode(format!(
                "unsupported wire version {}",
                version
            ))),
            None => Err(CodecError::Decode("empty frame".into())),
        }
    }
}

impl Codec for JsonCodec {
    fn encode_request(&self, request: &RpcRequest) -> Result<Bytes, CodecError> {
        Self::encode(request)
    }

    fn decode_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError> {
        Self::decode(bytes)
    }

    fn encode_response(&self, response: &RpcResponse) -> Result<Bytes, CodecError> {
        Self::encode(response)
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError> {
        Self::decode(bytes)
    }
}
