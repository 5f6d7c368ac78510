use chrono::{Local, TimeZone};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use statwidget::pipeline::{Renderer, channel};
use statwidget::system::gpu::{GpuBackends, GpuProbe, GpuSettings};
use statwidget::system::snapshot::{BatteryReading, GpuReading, GpuSource, MemoryReading, Snapshot};
use statwidget::ui::{self, dashboard::Dashboard};
use std::hint::black_box;

fn make_snapshot(cpu: f32) -> Snapshot {
    let gb = 1024 * 1024 * 1024;
    Snapshot {
        timestamp: Local::now(),
        cpu_percent: cpu,
        memory: MemoryReading::new(6 * gb, 16 * gb),
        gpu: Some(GpuReading::new(cpu * 0.7, "Integrated GPU (estimated)", GpuSource::Estimated)),
        battery: Some(BatteryReading::new(73.0, false)),
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for capacity in [1usize, 4, 64] {
        group.bench_with_input(
            BenchmarkId::new("stalled_consumer", capacity),
            &capacity,
            |b, &capacity| {
                let (tx, rx) = channel(capacity);
                let snapshot = make_snapshot(40.0);
                b.iter(|| black_box(tx.dispatch(snapshot.clone())));
                drop(rx);
            },
        );
    }

    group.bench_function("dispatch_then_drain", |b| {
        let (tx, mut rx) = channel(4);
        let snapshot = make_snapshot(40.0);
        b.iter(|| {
            tx.dispatch(snapshot.clone());
            black_box(rx.try_recv())
        });
    });

    group.finish();
}

fn bench_gpu_estimate(c: &mut Criterion) {
    let mut probe = GpuProbe::detect(
        GpuBackends {
            integrated_by_convention: true,
            ..GpuBackends::none()
        },
        GpuSettings::default(),
    );
    c.bench_function("gpu_estimate_read", |b| {
        b.iter(|| {
            probe.observe_cpu(black_box(55.0));
            black_box(probe.read())
        })
    });
}

fn bench_dashboard_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("dashboard_render");
    let now = Local
        .with_ymd_and_hms(2024, 3, 5, 9, 7, 3)
        .single()
        .unwrap_or_else(Local::now);

    for (width, height) in [(40u16, 24u16), (120, 40)] {
        let mut dashboard = Dashboard::new(true, true, "Linux 6.8 \u{2022} x86_64".to_string());
        dashboard.on_snapshot(make_snapshot(63.0));
        group.bench_with_input(
            BenchmarkId::new("draw", format!("{width}x{height}")),
            &(width, height),
            |b, &(w, h)| {
                let backend = TestBackend::new(w, h);
                let mut terminal = Terminal::new(backend).unwrap();
                b.iter(|| {
                    terminal
                        .draw(|frame| ui::draw(frame, &dashboard, now))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_gpu_estimate,
    bench_dashboard_render
);
criterion_main!(benches);
