//! Codec and reassembly benchmarks.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framewire_protocol::message::{HelloRequest, Ping};
use framewire_protocol::{FrameDecoder, Message, MessageCodec, SerializerAlgorithm};

fn hello(body_size: usize) -> Message {
    Message::new(
        1,
        HelloRequest {
            name: "bench".to_string(),
            body: "x".repeat(body_size),
        },
    )
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for algorithm in SerializerAlgorithm::ALL {
        let codec = MessageCodec::new(algorithm);
        for size in [100, 1000, 10000] {
            let message = hello(size);

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(algorithm.name(), size),
                &message,
                |b, message| {
                    b.iter(|| black_box(codec.encode(message).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for algorithm in SerializerAlgorithm::ALL {
        let codec = MessageCodec::new(algorithm);
        for size in [100, 1000, 10000] {
            let encoded = codec.encode(&hello(size)).unwrap();

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(algorithm.name(), size),
                &encoded,
                |b, encoded| {
                    b.iter(|| black_box(codec.decode(encoded).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");
    let codec = MessageCodec::new(SerializerAlgorithm::Binary);

    let mut stream = BytesMut::new();
    for seq in 0..1000 {
        codec
            .encode_into(&Message::new(seq, Ping { time: seq as i64 }), &mut stream)
            .unwrap();
    }

    group.throughput(Throughput::Elements(1000));
    for chunk in [7, 64, 4096] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new();
                let mut count = 0;
                for piece in stream.chunks(chunk) {
                    decoder.extend(piece);
                    while let Some(message) = decoder.decode_next(&codec).unwrap() {
                        black_box(message);
                        count += 1;
                    }
                }
                assert_eq!(count, 1000);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_reassembly);

criterion_main!(benches);
