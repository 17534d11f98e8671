use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use fernq::core::frame::Frame;
use fernq::protocol::address::resolve;
use fernq::protocol::message::{
    create_p2p_relay, create_receive_message, create_request, parse_receive_message,
    parse_request, parse_transit_message, forward_transit,
};
use fernq::TypeCode;

#[allow(clippy::unwrap_used)]
fn bench_message_envelopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_envelopes");
    let payloads = vec![b"hello world".to_vec(), vec![b'a'; 1024], vec![0u8; 64 * 1024]];

    group.bench_function("create_p2p_relay", |b| {
        b.iter_batched(
            || payloads.clone(),
            |payloads| {
                for p in payloads {
                    let _ = create_p2p_relay("alice", "bob", &p);
                }
            },
            BatchSize::SmallInput,
        )
    });

    let delivered = Frame::from_bytes(&create_receive_message("bob", &vec![b'a'; 1024])).unwrap();
    group.bench_function("parse_receive_message", |b| {
        b.iter(|| {
            let _ = parse_receive_message(&delivered.payload).unwrap();
        })
    });

    let (_, request) = create_request("alice", "bob", "/status", &vec![1u8; 256]);
    let transit = parse_transit_message(&Frame::from_bytes(&request).unwrap().payload).unwrap();
    let forwarded = Frame::from_bytes(&forward_transit(TypeCode::RequestMessage, &transit)).unwrap();
    group.bench_function("parse_request", |b| {
        b.iter(|| {
            let _ = parse_request(&forwarded.payload).unwrap();
        })
    });

    group.bench_function("resolve_url", |b| {
        b.iter(|| {
            let _ = resolve("fernq://alice@relay.example.com:7000/room#lobby?room_pass=pw", "alice")
                .unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_message_envelopes);
criterion_main!(benches);
