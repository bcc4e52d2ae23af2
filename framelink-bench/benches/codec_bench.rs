//! End-to-end codec round-trip benchmarks over in-memory streams.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framelink_protocol::PayloadCodec;
use framelink_rpc::{ClientCodec, RequestHeader, ResponseHeader, SerdeBody, ServerCodec};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Payload {
    data: String,
    counter: u64,
}

fn bench_request_response(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("request_response");
    for (name, codec) in [
        ("json", PayloadCodec::Json),
        ("msgpack", PayloadCodec::Msgpack),
        ("native", PayloadCodec::Native),
    ] {
        for size in [100usize, 10000] {
            let payload = Payload {
                data: "x".repeat(size),
                counter: 7,
            };

            let (client, server) = tokio::io::duplex(256 * 1024);
            let client_codec = ClientCodec::new(client).with_codec(codec);
            let server_codec = ServerCodec::new(server);

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &payload,
                |b, payload| {
                    let mut seq = 0u64;
                    b.to_async(&rt).iter(|| {
                        seq += 1;
                        let client_codec = &client_codec;
                        let server_codec = &server_codec;
                        let payload = payload.clone();
                        async move {
                            let req = RequestHeader {
                                service_method: "Svc.Echo".to_string(),
                                seq,
                            };
                            client_codec
                                .write_request(&req, Some(&SerdeBody(payload)))
                                .await
                                .unwrap();

                            let mut incoming = RequestHeader::default();
                            server_codec.read_request_header(&mut incoming).await.unwrap();
                            let mut body = SerdeBody(Payload::default());
                            server_codec.read_request_body(Some(&mut body)).await.unwrap();

                            let resp = ResponseHeader {
                                service_method: incoming.service_method,
                                seq: incoming.seq,
                                error: None,
                            };
                            server_codec
                                .write_response(&resp, Some(&body))
                                .await
                                .unwrap();

                            let mut reply = ResponseHeader::default();
                            client_codec.read_response_header(&mut reply).await.unwrap();
                            let mut out = SerdeBody(Payload::default());
                            client_codec.read_response_body(Some(&mut out)).await.unwrap();
                            black_box(out.0.counter)
                        }
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_request_response);
criterion_main!(benches);
