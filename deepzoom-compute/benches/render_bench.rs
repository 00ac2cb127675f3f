use criterion::{criterion_group, criterion_main, Criterion};

use deepzoom_compute::{Coordinator, CoreConfig, RenderRequest};
use deepzoom_core::{BigFloat, Complex, ComplexBig, FractalKind, Viewport};

fn bench_full_frame_direct(c: &mut Criterion) {
    let viewport = Viewport::default_mandelbrot(640, 480);

    c.bench_function("direct_640x480", |b| {
        b.iter(|| {
            let mut coordinator = Coordinator::new(CoreConfig::default());
            let request = RenderRequest::new(640, 480, viewport.clone(), FractalKind::Mandelbrot);
            coordinator.render(&request, None).unwrap()
        });
    });
}

fn bench_iteration_throughput(c: &mut Criterion) {
    let viewport = Viewport::new(Complex::new(-0.5, 0.0), 0.005, 256, 256).unwrap();

    c.bench_function("render_256x256_1000iter", |b| {
        b.iter(|| {
            let mut coordinator = Coordinator::new(CoreConfig::default());
            let mut request = RenderRequest::new(256, 256, viewport.clone(), FractalKind::Mandelbrot);
            request.max_iterations = Some(1000);
            coordinator.render(&request, None).unwrap()
        });
    });
}

fn bench_deep_zoom_perturbation(c: &mut Criterion) {
    let center = ComplexBig::from_complex(Complex::new(-0.748, 0.1), 200);
    let zoom = BigFloat::with_precision(1e14, 200);
    let viewport = Viewport::new_big(center, zoom, 0.0, 256, 256).unwrap();

    c.bench_function("deep_zoom_256x256_perturbation", |b| {
        b.iter(|| {
            let mut coordinator = Coordinator::new(CoreConfig::default());
            let mut request = RenderRequest::new(256, 256, viewport.clone(), FractalKind::Mandelbrot);
            request.max_iterations = Some(500);
            coordinator.render(&request, None).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_full_frame_direct,
    bench_iteration_throughput,
    bench_deep_zoom_perturbation
);
criterion_main!(benches);
