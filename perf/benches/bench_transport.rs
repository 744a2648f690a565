use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use piper_perf::{sample_component_sizes, temp_pipe_path};
use piper_transport::{Backer, Medium, Transport};

const CONTENT: usize = 1;

fn make_transport(label: &str, slot_count: u32) -> (Backer, Medium, std::path::PathBuf) {
    let path = std::path::PathBuf::from(temp_pipe_path(label));
    let metadata = vec![0u8; 64];
    let backer = Backer::create(&path, &metadata, &sample_component_sizes(), slot_count)
        .expect("create backer");
    let medium = Medium::open(&backer).expect("open medium");
    (backer, medium, path)
}

fn bench_flush(c: &mut Criterion) {
    let (backer, medium, path) = make_transport("crit_flush", 65536);
    let transport = Transport::new(&backer, &medium);
    let session = transport.begin().expect("begin");

    let mut group = c.benchmark_group("transport");
    group.throughput(Throughput::Elements(1));
    group.bench_function("flush", |b| {
        b.iter(|| black_box(transport.flush(session)));
    });

    group.finish();
    transport.finish(session).unwrap();
    let _ = std::fs::remove_file(&path);
}

fn bench_input_then_flush(c: &mut Criterion) {
    let (backer, medium, path) = make_transport("crit_input", 65536);
    let transport = Transport::new(&backer, &medium);
    let session = transport.begin().expect("begin");

    let mut group = c.benchmark_group("transport");
    group.throughput(Throughput::Elements(1));
    group.bench_function("input_then_flush", |b| {
        b.iter(|| {
            let position = transport.middle();
            let slot = transport.input(session, position, CONTENT).unwrap();
            slot[0] = black_box(slot[0].wrapping_add(1));
            transport.flush(session).unwrap();
        });
    });

    group.finish();
    transport.finish(session).unwrap();
    let _ = std::fs::remove_file(&path);
}

fn bench_view(c: &mut Criterion) {
    let (backer, medium, path) = make_transport("crit_view", 65536);
    let transport = Transport::new(&backer, &medium);
    let session = transport.begin().expect("begin");
    for _ in 0..1024 {
        let p = transport.middle();
        transport.input(session, p, CONTENT).unwrap();
        transport.flush(session).unwrap();
    }

    let mut group = c.benchmark_group("transport");
    group.throughput(Throughput::Elements(1));
    group.bench_function("view", |b| {
        b.iter(|| {
            let p = transport.middle() - 1;
            black_box(transport.view(p, CONTENT).unwrap());
        });
    });

    group.finish();
    transport.finish(session).unwrap();
    let _ = std::fs::remove_file(&path);
}

fn bench_begin_finish(c: &mut Criterion) {
    let (backer, medium, path) = make_transport("crit_session", 8);
    let transport = Transport::new(&backer, &medium);

    let mut group = c.benchmark_group("transport");
    group.throughput(Throughput::Elements(1));
    group.bench_function("begin_finish", |b| {
        b.iter(|| {
            let s = transport.begin().unwrap();
            transport.finish(s).unwrap();
        });
    });

    group.finish();
    let _ = std::fs::remove_file(&path);
}

fn bench_round_trip_capacities(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_capacity");
    group.throughput(Throughput::Elements(1));

    for &cap in &[1024u32, 4096, 16384, 65536] {
        let (backer, medium, path) = make_transport(&format!("crit_cap_{cap}"), cap);
        let transport = Transport::new(&backer, &medium);
        let session = transport.begin().unwrap();

        group.bench_function(format!("round_trip_cap_{cap}"), |b| {
            b.iter(|| {
                let p = transport.middle();
                transport.input(session, p, CONTENT).unwrap();
                transport.flush(session).unwrap();
                black_box(transport.view(p, CONTENT).unwrap());
            });
        });

        transport.finish(session).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_flush,
    bench_input_then_flush,
    bench_view,
    bench_begin_finish,
    bench_round_trip_capacities,
);
criterion_main!(benches);
