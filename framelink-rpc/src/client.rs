//! Client-side RPC codec.
//!
//! Mirrors the server codec: requests go out under one configured payload
//! codec, responses come back under whatever codec the frame announces.
//! Responses may arrive in any order; correlation is by the sequence id in
//! the option words.

use crate::body::Body;
use crate::error::RpcError;
use crate::pool;
use crate::server::{RequestHeader, ResponseHeader};
use framelink_protocol::{Frame, FrameFlags, PayloadCodec, PROTOCOL_VERSION};
use framelink_relay::Relay;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// The frame held between the paired response header and body reads.
struct PendingResponse {
    frame: Frame,
    body_start: usize,
}

/// Client-side codec over one connection.
pub struct ClientCodec<R, W> {
    relay: Relay<R, W>,
    /// Codec applied to outgoing request bodies.
    codec: PayloadCodec,
    pending: Mutex<Option<PendingResponse>>,
}

impl<S> ClientCodec<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a codec over a single bidirectional stream, sending request
    /// bodies under the native codec.
    pub fn new(stream: S) -> Self {
        Self::from_relay(Relay::new(stream))
    }
}

impl<R, W> ClientCodec<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a codec over an existing relay.
    pub fn from_relay(relay: Relay<R, W>) -> Self {
        Self {
            relay,
            codec: PayloadCodec::Native,
            pending: Mutex::new(None),
        }
    }

    /// Sets the payload codec for outgoing request bodies.
    pub fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Serializes `body` and sends a request frame with options
    /// `[seq, method_len]` and payload `method || body`.
    pub async fn write_request<B: Body>(
        &self,
        req: &RequestHeader,
        body: Option<&B>,
    ) -> Result<(), RpcError> {
        let mut frame = pool::frame();
        frame.set_version(PROTOCOL_VERSION);
        if let Err(e) = frame.append_options(&[req.seq as u32, req.service_method.len() as u32]) {
            pool::release_frame(frame);
            return Err(RpcError::InvalidFrame(match e {
                framelink_protocol::FrameError::TooManyOptions { .. } => "too many option words",
            }));
        }

        let mut payload = pool::buffer(req.service_method.len());
        payload.extend_from_slice(req.service_method.as_bytes());
        if let Some(body) = body {
            if let Err(e) = body.encode(self.codec, &mut payload) {
                pool::release_buffer(payload);
                pool::release_frame(frame);
                return Err(e.into());
            }
        }

        frame.or_flags(FrameFlags::from_bits(self.codec.bit()));
        frame.set_payload_len(payload.len() as u32);
        frame.write_payload(&payload);
        frame.write_crc();
        pool::release_buffer(payload);

        tracing::debug!(seq = req.seq, method = %req.service_method, "request written");
        let sent = self.relay.send(&frame).await;
        pool::release_frame(frame);
        sent.map_err(RpcError::from)
    }

    /// Reads the next response frame and fills `resp` with its sequence
    /// id, method name, and error text if the frame carries the `ERROR`
    /// flag.
    ///
    /// The frame is retained for the paired
    /// [`read_response_body`](Self::read_response_body) call. Error frames
    /// retain nothing decodable; their body read is an empty-body no-op.
    pub async fn read_response_header(&self, resp: &mut ResponseHeader) -> Result<(), RpcError> {
        let mut frame = pool::frame();
        if let Err(e) = self.relay.receive(&mut frame).await {
            pool::release_frame(frame);
            return Err(e.into());
        }

        match split_response(&frame, resp) {
            Ok(body_start) => {
                let previous = self.pending.lock().replace(PendingResponse { frame, body_start });
                if let Some(stale) = previous {
                    pool::release_frame(stale.frame);
                }
                Ok(())
            }
            Err(e) => {
                pool::release_frame(frame);
                Err(e)
            }
        }
    }

    /// Decodes the retained response body into `out` under the codec the
    /// frame announces. `None` discards the body.
    pub async fn read_response_body<B: Body>(&self, out: Option<&mut B>) -> Result<(), RpcError> {
        let pending = self.pending.lock().take();
        let Some(PendingResponse { frame, body_start }) = pending else {
            return Err(RpcError::InvalidFrame("no response pending a body read"));
        };

        let result = match out {
            None => Ok(()),
            Some(body) => {
                let bytes = &frame.payload()[body_start..];
                if bytes.is_empty() {
                    Ok(())
                } else {
                    let codec = PayloadCodec::from_flags(frame.flags());
                    body.decode(codec, bytes).map_err(RpcError::from)
                }
            }
        };
        pool::release_frame(frame);
        result
    }

    /// Closes the underlying stream. Idempotent.
    pub async fn close(&self) -> Result<(), RpcError> {
        self.relay.close().await.map_err(Into::into)
    }
}

/// Validates the frame structure and extracts the response envelope.
/// Returns the payload offset where the body starts.
fn split_response(frame: &Frame, resp: &mut ResponseHeader) -> Result<usize, RpcError> {
    let options = frame.options();
    if options.len() != 2 {
        return Err(RpcError::InvalidFrame("expected exactly two option words"));
    }

    let method_len = options[1] as usize;
    let payload = frame.payload();
    if method_len > payload.len() {
        return Err(RpcError::InvalidFrame("method name extends past the payload"));
    }

    resp.service_method = std::str::from_utf8(&payload[..method_len])
        .map_err(|_| RpcError::InvalidFrame("method name is not valid UTF-8"))?
        .to_owned();
    resp.seq = u64::from(options[0]);

    if frame.flags().is_error() {
        resp.error = Some(String::from_utf8_lossy(&payload[method_len..]).into_owned());
        // The whole remaining payload is the error text; nothing is left
        // for the body read.
        Ok(payload.len())
    } else {
        resp.error = None;
        Ok(method_len)
    }
}
