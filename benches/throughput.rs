use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use slirc_client::dispatch::{DispatchChain, NumericTranslator};
use slirc_client::outbound::wire;
use slirc_client::{EventFactory, EventKind, OutboundQueue, Priority};

// Per-event overhead of the engine itself; no transport involved.

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let chain = DispatchChain::builder()
        .handler(NumericTranslator)
        .build(Arc::new(EventFactory::new()), Arc::new(OutboundQueue::new()));

    group.bench_function("walk_privmsg", |b| {
        b.iter(|| {
            let event = chain
                .factory()
                .inbound(EventKind::Privmsg {
                    targets: vec!["#channel".to_string()],
                    text: "Hello world".to_string(),
                })
                .source("sender!user@host")
                .finish()
                .unwrap();
            chain.dispatch(event)
        })
    });

    group.bench_function("translate_sasl_numeric", |b| {
        b.iter(|| {
            let event = chain
                .factory()
                .inbound(EventKind::Numeric {
                    code: 903,
                    params: vec!["bot".to_string(), "SASL authentication successful".to_string()],
                })
                .finish()
                .unwrap();
            chain.dispatch(event)
        })
    });

    group.finish();
}

fn queue_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound");
    group.throughput(Throughput::Elements(3));

    let factory = EventFactory::new();
    let queue = OutboundQueue::new();

    group.bench_function("enqueue_drain_mixed", |b| {
        b.iter(|| {
            for priority in [Priority::Low, Priority::High, Priority::Normal] {
                let event = factory
                    .outbound(EventKind::Pong {
                        token: "lag".to_string(),
                    })
                    .finish()
                    .unwrap();
                queue.enqueue(event, priority).unwrap();
            }
            while let Some(item) = queue.try_next() {
                std::hint::black_box(wire::serialize(&item.event));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark, queue_benchmark);
criterion_main!(benches);
