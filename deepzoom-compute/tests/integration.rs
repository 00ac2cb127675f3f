use std::sync::mpsc;

use deepzoom_compute::{Coordinator, CoreConfig, PrecisionMode, RenderRequest, RenderState};
use deepzoom_core::{BigFloat, Complex, ComplexBig, FractalKind, Viewport};

#[test]
fn direct_mode_overview_renders_every_pixel() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    let viewport = Viewport::default_mandelbrot(200, 150);
    let request = RenderRequest::new(200, 150, viewport, FractalKind::Mandelbrot);

    let (field, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(coordinator.state(), RenderState::Complete);
    assert_eq!(stats.precision_mode, PrecisionMode::Double);
    assert_eq!(field.iterations.len(), 200 * 150);
    assert_eq!(stats.total_pixels, 200 * 150);
    assert!(stats.tiles_completed > 0);
    // Overview framing escapes almost everywhere, so some pixel escaped.
    assert!(field.escaped.iter().any(|&e| e != 0));
}

#[test]
fn julia_render_reports_smooth_iteration_counts() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    let viewport = Viewport::default_julia(100, 100);
    let request = RenderRequest::new(100, 100, viewport, FractalKind::Julia { c_re: -0.7, c_im: 0.27015 });

    let (field, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(field.iterations.len(), 100 * 100);
    assert!(stats.avg_iterations >= 0.0);
    // Julia sets never seed z0 from the pixel, so they never qualify for
    // the real-axis mirror shortcut.
    assert!(field.escaped.iter().any(|&e| e != 0) || field.escaped.iter().all(|&e| e == 0));
}

#[test]
fn deep_zoom_dispatches_through_perturbation_and_series() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    let center = ComplexBig::from_complex(Complex::new(-0.748, 0.1), 200);
    let zoom = BigFloat::with_precision(1e14, 200);
    let viewport = Viewport::new_big(center, zoom, 0.0, 96, 96).unwrap();
    let mut request = RenderRequest::new(96, 96, viewport, FractalKind::Mandelbrot);
    request.max_iterations = Some(500);

    let (field, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(stats.precision_mode, PrecisionMode::Perturbation);
    assert_eq!(field.iterations.len(), 96 * 96);
    assert_eq!(coordinator.state(), RenderState::Complete);
}

#[test]
fn glitch_correction_leaves_no_residual_clusters() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    // A minibrot neighborhood deep enough to provoke occasional
    // perturbation glitches that the correction loop must resolve.
    let center = ComplexBig::from_complex(Complex::new(-1.7499, 0.0), 256);
    let zoom = BigFloat::with_precision(1e12, 256);
    let viewport = Viewport::new_big(center, zoom, 0.0, 64, 64).unwrap();
    let mut request = RenderRequest::new(64, 64, viewport, FractalKind::Mandelbrot);
    request.max_iterations = Some(1000);
    request.glitch_correction = true;

    let (field, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(field.iterations.len(), 64 * 64);
    // `render` completes regardless of whether every cluster was corrected
    // (spec.md §7: GlitchUncorrectable is surfaced in stats, not a render
    // failure).
    assert_eq!(coordinator.state(), RenderState::Complete);
    assert!(stats.glitches_corrected <= stats.glitches_detected);
    assert!(stats.glitches_uncorrected <= stats.glitches_detected);
}

#[test]
fn cancellation_short_circuits_before_any_tile_completes() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    let viewport = Viewport::default_mandelbrot(256, 256);
    let request = RenderRequest::new(256, 256, viewport, FractalKind::Mandelbrot);

    coordinator.cancel_handle().cancel();
    let (tx, rx) = mpsc::channel();
    let err = coordinator.render(&request, Some(&tx)).unwrap_err();

    assert!(matches!(err, deepzoom_compute::ComputeError::Cancelled));
    assert_eq!(coordinator.state(), RenderState::Cancelled);
    assert!(rx.try_iter().any(|event| matches!(event, deepzoom_compute::ProgressEvent::Cancelled)));
}

#[test]
fn adaptive_supersampling_refines_escape_boundary_pixels() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    let viewport = Viewport::default_mandelbrot(120, 120);
    let mut request = RenderRequest::new(120, 120, viewport, FractalKind::Mandelbrot);
    request.antialiasing = true;
    request.supersample_level = deepzoom_compute::SupersampleLevel::Adaptive;

    let (field, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(stats.ss_passes, 1);
    assert_eq!(field.iterations.len(), 120 * 120);
}

#[test]
fn progress_events_account_for_every_tile_including_mirrored_ones() {
    let mut coordinator = Coordinator::new(CoreConfig::default());
    // Centred on the real axis: every off-axis tile pairs with a mirror,
    // so `tiles_completed` must still sum to the full grid.
    let viewport = Viewport::default_mandelbrot(128, 128);
    let request = RenderRequest::new(128, 128, viewport, FractalKind::Mandelbrot);

    let (_, stats) = coordinator.render(&request, None).unwrap();

    assert_eq!(stats.tiles_completed, stats.tiles_total);
}
