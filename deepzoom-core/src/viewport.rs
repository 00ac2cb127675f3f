use serde::{Deserialize, Serialize};

use crate::bigfloat::BigFloat;
use crate::complex::Complex;
use crate::complex_big::ComplexBig;
use crate::error::CoreError;

/// Precision, in bits, used for a viewport's `center`/`zoom` unless the
/// caller supplies a deeper one (set by the precision dispatcher once the
/// render's required precision is known).
pub const DEFAULT_VIEWPORT_PRECISION_BITS: usize = 64;

/// The visible region of the complex plane.
///
/// `center` and `zoom` are [`BigFloat`]s so the viewport can describe
/// regions far smaller than `f64` can address; `rotation` is always an
/// `f64` in radians (high-precision rotation is never meaningful). Pixel
/// work never touches `center`/`zoom` directly — it asks the viewport for
/// an `f64` **delta** from the center, which is representable in `f64`
/// regardless of how deep `zoom` goes, since the delta shrinks with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub center: ComplexBig,
    /// Pixels per complex-plane unit. May exceed `10^300`.
    pub zoom: BigFloat,
    /// Rotation of the viewport, radians, applied about `center`.
    pub rotation: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Default view: centred on the Mandelbrot set with the full set visible.
    ///
    /// Built as a struct literal rather than through [`Self::new`] so this
    /// stays infallible — `width`/`height` are the caller's own arguments,
    /// not a value that needs validating here.
    pub fn default_mandelbrot(width: u32, height: u32) -> Self {
        let target_re = 3.6;
        let target_im = 2.6;
        let scale = (target_re / width.max(1) as f64).max(target_im / height.max(1) as f64);
        Self {
            center: ComplexBig::from_complex(Complex::new(-0.75, 0.0), DEFAULT_VIEWPORT_PRECISION_BITS),
            zoom: BigFloat::with_precision(1.0 / scale, DEFAULT_VIEWPORT_PRECISION_BITS),
            rotation: 0.0,
            width,
            height,
        }
    }

    /// Default view for Julia sets, centred on the origin.
    pub fn default_julia(width: u32, height: u32) -> Self {
        let extent = 4.2;
        let scale = (extent / width.max(1) as f64).max(extent / height.max(1) as f64);
        Self {
            center: ComplexBig::zero(DEFAULT_VIEWPORT_PRECISION_BITS),
            zoom: BigFloat::with_precision(1.0 / scale, DEFAULT_VIEWPORT_PRECISION_BITS),
            rotation: 0.0,
            width,
            height,
        }
    }

    /// Create a viewport with an `f64` center and no rotation, at the
    /// default precision.
    pub fn new(center: Complex, zoom: f64, width: u32, height: u32) -> crate::Result<Self> {
        Self::new_big(
            ComplexBig::from_complex(center, DEFAULT_VIEWPORT_PRECISION_BITS),
            BigFloat::with_precision(zoom, DEFAULT_VIEWPORT_PRECISION_BITS),
            0.0,
            width,
            height,
        )
    }

    /// Create a viewport with an arbitrary-precision center and zoom.
    pub fn new_big(
        center: ComplexBig,
        zoom: BigFloat,
        rotation: f64,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("dimensions must be > 0, got {width}×{height}"),
            });
        }
        let zoom_f64 = zoom.to_f64();
        if zoom_f64 <= 0.0 || !zoom_f64.is_finite() {
            return Err(CoreError::InvalidViewport {
                reason: format!("zoom must be positive and finite, got {zoom_f64}"),
            });
        }
        if !rotation.is_finite() {
            return Err(CoreError::InvalidViewport {
                reason: format!("rotation must be finite, got {rotation}"),
            });
        }
        Ok(Self {
            center,
            zoom,
            rotation,
            width,
            height,
        })
    }

    /// Complex-plane units spanned by one pixel.
    #[inline]
    pub fn scale_per_pixel(&self) -> f64 {
        1.0 / self.zoom.to_f64()
    }

    /// Offset the center by a delta (in `f64`), preserving BigFloat precision.
    pub fn offset_center(&mut self, dre: f64, dim: f64) {
        let precision = self.center.precision_bits();
        let delta = ComplexBig::from_complex(Complex::new(dre, dim), precision);
        self.center = self.center.add(&delta);
    }

    /// Map a pixel coordinate to an absolute point on the complex plane,
    /// as an `f64` (only valid when the viewport's `center` fits in `f64`
    /// precision — i.e. in DOUBLE precision mode).
    #[inline]
    pub fn pixel_to_complex(&self, px: u32, py: u32) -> Complex {
        self.center.to_complex() + self.pixel_to_delta(px, py)
    }

    #[inline]
    pub fn subpixel_to_complex(&self, px: f64, py: f64) -> Complex {
        self.center.to_complex() + self.subpixel_to_delta(px, py)
    }

    /// Map a pixel coordinate to a **delta** from the viewport center,
    /// honoring rotation. Valid at any zoom depth.
    #[inline]
    pub fn pixel_to_delta(&self, px: u32, py: u32) -> Complex {
        self.subpixel_to_delta(px as f64, py as f64)
    }

    /// Like [`pixel_to_delta`](Self::pixel_to_delta) but accepts fractional
    /// pixel coordinates for sub-pixel sampling.
    #[inline]
    pub fn subpixel_to_delta(&self, px: f64, py: f64) -> Complex {
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        let scale = self.scale_per_pixel();
        let dx = (px - half_w) * scale;
        let dy = -(py - half_h) * scale;

        if self.rotation == 0.0 {
            return Complex::new(dx, dy);
        }
        let (sin, cos) = self.rotation.sin_cos();
        Complex::new(dx * cos - dy * sin, dx * sin + dy * cos)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Create a lower-resolution viewport covering the same complex-plane region.
    pub fn downscaled(&self, factor: u32) -> Self {
        let f = factor.max(1);
        let zoom = BigFloat::with_precision(
            self.zoom.to_f64() / f as f64,
            self.zoom.precision_bits(),
        );
        Self {
            center: self.center.clone(),
            zoom,
            rotation: self.rotation,
            width: self.width.div_ceil(f),
            height: self.height.div_ceil(f),
        }
    }

    pub fn complex_width(&self) -> f64 {
        self.width as f64 * self.scale_per_pixel()
    }

    pub fn complex_height(&self) -> f64 {
        self.height as f64 * self.scale_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn default_mandelbrot_viewport() {
        let vp = Viewport::default_mandelbrot(800, 600);
        assert_eq!(vp.width, 800);
        assert_eq!(vp.height, 600);
        let center = vp.center.to_complex();
        assert!((center.re - (-0.75)).abs() < EPSILON);
        assert!(vp.complex_width() >= 3.5);
        assert!(vp.complex_height() >= 2.5);
    }

    #[test]
    fn default_julia_viewport() {
        let vp = Viewport::default_julia(1280, 720);
        assert!(vp.complex_width() >= 4.0);
        assert!(vp.complex_height() >= 4.0);
    }

    #[test]
    fn pixel_to_complex_center() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 100.0, 100, 100).unwrap();
        let c = vp.pixel_to_complex(50, 50);
        assert!((c.re - 0.0).abs() < EPSILON);
        assert!((c.im - 0.0).abs() < EPSILON);
    }

    #[test]
    fn pixel_to_complex_corners() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 1.0, 100, 100).unwrap();
        let tl = vp.pixel_to_complex(0, 0);
        assert!((tl.re - (-50.0)).abs() < EPSILON);
        assert!((tl.im - 50.0).abs() < EPSILON);
        let br = vp.pixel_to_complex(99, 99);
        assert!((br.re - 49.0).abs() < EPSILON);
        assert!((br.im - (-49.0)).abs() < EPSILON);
    }

    #[test]
    fn rotation_by_quarter_turn_swaps_axes() {
        let mut vp = Viewport::new(Complex::ZERO, 1.0, 100, 100).unwrap();
        vp.rotation = std::f64::consts::FRAC_PI_2;
        let delta = vp.pixel_to_delta(60, 50); // 10 units right of center, unrotated
        // a 90° rotation should turn "10 right" into "10 up" (positive im)
        assert!(delta.re.abs() < 1e-9);
        assert!((delta.im - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_dimensions() {
        assert!(Viewport::new(Complex::ZERO, 1.0, 0, 100).is_err());
        assert!(Viewport::new(Complex::ZERO, 1.0, 100, 0).is_err());
    }

    #[test]
    fn invalid_zoom() {
        assert!(Viewport::new(Complex::ZERO, 0.0, 100, 100).is_err());
        assert!(Viewport::new(Complex::ZERO, -1.0, 100, 100).is_err());
    }

    #[test]
    fn downscaled_preserves_region() {
        let vp = Viewport::default_mandelbrot(1280, 720);
        let ds = vp.downscaled(4);
        assert_eq!(ds.width, 320);
        assert_eq!(ds.height, 180);
        let orig_w = vp.complex_width();
        let ds_w = ds.complex_width();
        assert!((orig_w - ds_w).abs() / orig_w < 0.01);
    }

    #[test]
    fn deep_zoom_delta_stays_representable_in_f64() {
        // zoom = 1e250 keeps the per-pixel delta in f64's normal range
        // even though the absolute coordinate needs BigFloat precision.
        let center = ComplexBig::from_complex(Complex::new(-1.75, 0.0), 900);
        let zoom = BigFloat::from_str_with_precision("1e250", 900).unwrap();
        let vp = Viewport::new_big(center, zoom, 0.0, 200, 200).unwrap();
        let delta = vp.pixel_to_delta(150, 100);
        assert!(delta.re.is_finite() && delta.re != 0.0);
    }
}
