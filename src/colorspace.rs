//! Color-space conversions shared by every analysis stage.
//!
//! All conversions are pure functions over an `RgbImage` producing per-plane
//! `Array2<f32>` grids. Two HSV scale conventions coexist on purpose:
//!
//! - unit scale (`hsv_unit`): h, s, v all in [0, 1], used by the species
//!   heuristics;
//! - OpenCV scale (`hsv_cv`): h in [0, 180], s and v in [0, 255], used by the
//!   quality and disease detectors so their tuned band constants apply
//!   unchanged.
//!
//! Hue is left at 0 wherever max == min. The downstream heuristics were tuned
//! against that behavior, so it is load-bearing and must not be "fixed".

use anyhow::{ensure, Result};
use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;

/// Rec.601 luma weights, matching the grayscale conversion the detectors were
/// tuned against.
const LUMA_R: f32 = 0.2989;
const LUMA_G: f32 = 0.5870;
const LUMA_B: f32 = 0.1140;

/// Hue/saturation/value planes. Scale depends on the constructor used.
pub struct HsvPlanes {
    pub h: Array2<f32>,
    pub s: Array2<f32>,
    pub v: Array2<f32>,
}

/// L*a*b* planes in the OpenCV 8-bit convention: L scaled to [0, 255],
/// a and b offset by +128.
pub struct LabPlanes {
    pub l: Array2<f32>,
    pub a: Array2<f32>,
    pub b: Array2<f32>,
}

/// Everything the quality and disease detectors need from one image,
/// computed once per analysis call.
pub struct PlaneSet {
    pub width: u32,
    pub height: u32,
    /// Grayscale in [0, 255].
    pub gray: Array2<f32>,
    /// Same plane quantized to u8 for the imageproc operators.
    pub gray_u8: GrayImage,
    /// OpenCV-scale HSV.
    pub hsv: HsvPlanes,
    /// OpenCV-scale L*a*b*.
    pub lab: LabPlanes,
}

impl PlaneSet {
    /// Derive all planes from an RGB image. Fails only on a zero-sized
    /// image; callers convert that into their degraded-result path.
    pub fn from_image(img: &RgbImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        ensure!(w > 0 && h > 0, "cannot analyze a zero-sized image");

        let gray = gray_plane(img);
        let gray_u8 = gray_to_u8(&gray);
        let hsv = hsv_cv(img);
        let lab = lab_cv(img);

        Ok(Self {
            width: w,
            height: h,
            gray,
            gray_u8,
            hsv,
            lab,
        })
    }
}

/// Grayscale plane in [0, 255].
pub fn gray_plane(img: &RgbImage) -> Array2<f32> {
    let (w, h) = img.dimensions();
    let mut out = Array2::<f32>::zeros((h as usize, w as usize));
    for (x, y, p) in img.enumerate_pixels() {
        out[[y as usize, x as usize]] =
            LUMA_R * p[0] as f32 + LUMA_G * p[1] as f32 + LUMA_B * p[2] as f32;
    }
    out
}

/// Quantize a [0, 255] plane to a `GrayImage`.
pub fn gray_to_u8(gray: &Array2<f32>) -> GrayImage {
    let (h, w) = gray.dim();
    let mut out = GrayImage::new(w as u32, h as u32);
    for ((y, x), v) in gray.indexed_iter() {
        out.put_pixel(x as u32, y as u32, Luma([v.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

fn hsv_pixel(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    // Hue stays 0 when the pixel is achromatic (diff == 0).
    let h = if diff == 0.0 {
        0.0
    } else if max == r {
        (((g - b) / diff).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / diff + 2.0) / 6.0
    } else {
        ((r - g) / diff + 4.0) / 6.0
    };

    let s = if max == 0.0 { 0.0 } else { diff / max };
    (h, s, max)
}

/// HSV with every plane in [0, 1].
pub fn hsv_unit(img: &RgbImage) -> HsvPlanes {
    hsv_scaled(img, 1.0, 1.0)
}

/// HSV in the OpenCV 8-bit convention: h in [0, 180], s and v in [0, 255].
pub fn hsv_cv(img: &RgbImage) -> HsvPlanes {
    hsv_scaled(img, 180.0, 255.0)
}

fn hsv_scaled(img: &RgbImage, h_scale: f32, sv_scale: f32) -> HsvPlanes {
    let (w, h) = img.dimensions();
    let dim = (h as usize, w as usize);
    let mut hp = Array2::<f32>::zeros(dim);
    let mut sp = Array2::<f32>::zeros(dim);
    let mut vp = Array2::<f32>::zeros(dim);
    for (x, y, p) in img.enumerate_pixels() {
        let (hv, sv, vv) = hsv_pixel(
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
        );
        let idx = [y as usize, x as usize];
        hp[idx] = hv * h_scale;
        sp[idx] = sv * sv_scale;
        vp[idx] = vv * sv_scale;
    }
    HsvPlanes {
        h: hp,
        s: sp,
        v: vp,
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// sRGB -> XYZ (D65) -> L*a*b*, scaled to the OpenCV 8-bit convention.
pub fn lab_cv(img: &RgbImage) -> LabPlanes {
    let (w, h) = img.dimensions();
    let dim = (h as usize, w as usize);
    let mut lp = Array2::<f32>::zeros(dim);
    let mut ap = Array2::<f32>::zeros(dim);
    let mut bp = Array2::<f32>::zeros(dim);

    // D65 reference white
    const XN: f32 = 0.950_47;
    const YN: f32 = 1.0;
    const ZN: f32 = 1.088_83;

    for (x, y, p) in img.enumerate_pixels() {
        let r = srgb_to_linear(p[0] as f32 / 255.0);
        let g = srgb_to_linear(p[1] as f32 / 255.0);
        let b = srgb_to_linear(p[2] as f32 / 255.0);

        let xx = 0.4124 * r + 0.3576 * g + 0.1805 * b;
        let yy = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let zz = 0.0193 * r + 0.1192 * g + 0.9505 * b;

        let fx = lab_f(xx / XN);
        let fy = lab_f(yy / YN);
        let fz = lab_f(zz / ZN);

        let l = 116.0 * fy - 16.0;
        let a = 500.0 * (fx - fy);
        let bq = 200.0 * (fy - fz);

        let idx = [y as usize, x as usize];
        lp[idx] = l * 255.0 / 100.0;
        ap[idx] = a + 128.0;
        bp[idx] = bq + 128.0;
    }
    LabPlanes {
        l: lp,
        a: ap,
        b: bp,
    }
}
