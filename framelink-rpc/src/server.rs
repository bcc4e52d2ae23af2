//! Server-side RPC codec.
//!
//! Bridges an RPC dispatcher speaking `(sequence, method, body)` to the
//! frame relay. The dispatcher's read side is a strictly paired
//! `read_request_header` / `read_request_body` sequence; responses for any
//! sequence may be written concurrently from other tasks, each answered
//! with the payload codec its request arrived under.

use crate::body::Body;
use crate::error::RpcError;
use crate::pool;
use dashmap::DashMap;
use framelink_protocol::{Frame, FrameFlags, PayloadCodec, PROTOCOL_VERSION};
use framelink_relay::Relay;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// Incoming request envelope filled by
/// [`read_request_header`](ServerCodec::read_request_header).
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    /// Dotted service/method name, e.g. `"Svc.Ping"`.
    pub service_method: String,
    /// Dispatcher-assigned sequence id correlating the response. Carried
    /// on the wire as a 32-bit option word.
    pub seq: u64,
}

/// Outgoing response envelope passed to
/// [`write_response`](ServerCodec::write_response).
#[derive(Debug, Clone, Default)]
pub struct ResponseHeader {
    pub service_method: String,
    pub seq: u64,
    /// Dispatcher-level failure. When set, the response frame carries the
    /// message text instead of a body.
    pub error: Option<String>,
}

/// The frame held between the paired header and body reads.
struct PendingRequest {
    frame: Frame,
    body_start: usize,
    codec: PayloadCodec,
}

/// Server-side codec over one connection.
///
/// All methods take `&self`: reads and writes may run from different
/// tasks, with writes serialized by the relay and the per-request codec
/// table shared through a concurrent map.
pub struct ServerCodec<R, W> {
    relay: Relay<R, W>,
    /// sequence id -> codec the request arrived under. Entries are
    /// inserted by `read_request_header` and atomically removed by
    /// `write_response`.
    codecs: DashMap<u64, PayloadCodec>,
    pending: Mutex<Option<PendingRequest>>,
}

impl<S> ServerCodec<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a codec over a single bidirectional stream.
    pub fn new(stream: S) -> Self {
        Self::from_relay(Relay::new(stream))
    }
}

impl<R, W> ServerCodec<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a codec over an existing relay, e.g. one built from a pipe
    /// pair.
    pub fn from_relay(relay: Relay<R, W>) -> Self {
        Self {
            relay,
            codecs: DashMap::new(),
            pending: Mutex::new(None),
        }
    }

    /// Reads the next request frame and fills `req` with its sequence id
    /// and method name.
    ///
    /// The frame is retained for the paired
    /// [`read_request_body`](Self::read_request_body) call, and the codec
    /// it arrived under is remembered until the matching response is
    /// written. A clean peer close surfaces unchanged as an EOF relay
    /// error.
    pub async fn read_request_header(&self, req: &mut RequestHeader) -> Result<(), RpcError> {
        let mut frame = pool::frame();
        if let Err(e) = self.relay.receive(&mut frame).await {
            pool::release_frame(frame);
            return Err(e.into());
        }

        match split_request(&frame, req) {
            Ok((body_start, codec)) => {
                self.codecs.insert(req.seq, codec);
                tracing::debug!(
                    seq = req.seq,
                    method = %req.service_method,
                    ?codec,
                    "request header read"
                );
                let previous = self
                    .pending
                    .lock()
                    .replace(PendingRequest {
                        frame,
                        body_start,
                        codec,
                    });
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

    /// Decodes the retained request body into `out` under the codec the
    /// request arrived with. `None` discards the body. An empty body
    /// succeeds without touching `out` for every codec.
    pub async fn read_request_body<B: Body>(&self, out: Option<&mut B>) -> Result<(), RpcError> {
        let pending = self.pending.lock().take();
        let Some(PendingRequest {
            frame,
            body_start,
            codec,
        }) = pending
        else {
            return Err(RpcError::InvalidFrame("no request pending a body read"));
        };

        let result = match out {
            None => Ok(()),
            Some(body) => {
                let bytes = &frame.payload()[body_start..];
                if bytes.is_empty() {
                    Ok(())
                } else {
                    body.decode(codec, bytes).map_err(RpcError::from)
                }
            }
        };
        pool::release_frame(frame);
        result
    }

    /// Serializes `body` under the codec remembered for `resp.seq` and
    /// sends the response frame.
    ///
    /// The codec-table entry is removed atomically; a sequence that was
    /// never fully read falls back to the native codec. A dispatcher error
    /// or marshalling failure is sent to the peer as an error frame and
    /// returned to the caller.
    pub async fn write_response<B: Body>(
        &self,
        resp: &ResponseHeader,
        body: Option<&B>,
    ) -> Result<(), RpcError> {
        let codec = self
            .codecs
            .remove(&resp.seq)
            .map(|(_, codec)| codec)
            .unwrap_or(PayloadCodec::Native);

        let mut frame = pool::frame();
        frame.set_version(PROTOCOL_VERSION);
        if let Err(e) = frame.append_options(&[resp.seq as u32, resp.service_method.len() as u32]) {
            pool::release_frame(frame);
            return Err(RpcError::InvalidFrame(match e {
                framelink_protocol::FrameError::TooManyOptions { .. } => "too many option words",
            }));
        }

        if let Some(message) = resp.error.as_deref().filter(|m| !m.is_empty()) {
            self.write_error(frame, resp, message).await;
            return Err(RpcError::Service(message.to_owned()));
        }

        let mut payload = pool::buffer(resp.service_method.len());
        payload.extend_from_slice(resp.service_method.as_bytes());
        if let Some(body) = body {
            if let Err(e) = body.encode(codec, &mut payload) {
                pool::release_buffer(payload);
                self.write_error(frame, resp, &e.to_string()).await;
                return Err(e.into());
            }
        }

        frame.or_flags(FrameFlags::from_bits(codec.bit()));
        frame.set_payload_len(payload.len() as u32);
        frame.write_payload(&payload);
        frame.write_crc();
        pool::release_buffer(payload);

        tracing::debug!(seq = resp.seq, ?codec, "response written");
        let sent = self.relay.send(&frame).await;
        pool::release_frame(frame);
        sent.map_err(RpcError::from)
    }

    /// Sends an error frame carrying `method || message` with the `ERROR`
    /// flag replacing any codec bits. Send failures are swallowed; the
    /// peer will notice on its next receive.
    async fn write_error(&self, mut frame: Frame, resp: &ResponseHeader, message: &str) {
        let mut payload = pool::buffer(resp.service_method.len() + message.len());
        payload.extend_from_slice(resp.service_method.as_bytes());
        payload.extend_from_slice(message.as_bytes());

        frame.set_flags(FrameFlags::from_bits(FrameFlags::ERROR));
        frame.set_payload_len(payload.len() as u32);
        frame.write_payload(&payload);
        frame.write_crc();

        if let Err(e) = self.relay.send(&frame).await {
            tracing::warn!(seq = resp.seq, error = %e, "failed to deliver error frame");
        }
        pool::release_buffer(payload);
        pool::release_frame(frame);
    }

    /// Number of requests whose responses have not yet been written.
    pub fn pending_codec_count(&self) -> usize {
        self.codecs.len()
    }

    /// Closes the underlying stream. Idempotent.
    pub async fn close(&self) -> Result<(), RpcError> {
        self.relay.close().await.map_err(Into::into)
    }
}

/// Validates the frame structure and extracts the request envelope.
fn split_request(frame: &Frame, req: &mut RequestHeader) -> Result<(usize, PayloadCodec), RpcError> {
    let options = frame.options();
    if options.len() != 2 {
        return Err(RpcError::InvalidFrame("expected exactly two option words"));
    }

    let method_len = options[1] as usize;
    let payload = frame.payload();
    if method_len > payload.len() {
        return Err(RpcError::InvalidFrame("method name extends past the payload"));
    }

    req.service_method = std::str::from_utf8(&payload[..method_len])
        .map_err(|_| RpcError::InvalidFrame("method name is not valid UTF-8"))?
        .to_owned();
    req.seq = u64::from(options[0]);

    Ok((method_len, PayloadCodec::from_flags(frame.flags())))
}
