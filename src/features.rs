//! Shared detector toolbox: mask statistics, gradient fields, contour shape
//! metrics and the small morphology helpers the pattern detectors build on.
//!
//! Every public function here is pure and returns either a plane or a scalar
//! already normalized into [0, 1] where the contract requires it. The
//! quality and disease stages compose these into per-crop scores.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::{filter3x3, gaussian_blur_f32};
use imageproc::geometry::min_area_rect;
use imageproc::hough::{detect_lines, LineDetectionOptions};
use imageproc::point::Point;
use ndarray::Array2;
use std::f32::consts::PI;

const K_SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const K_SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];
const K_LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Canny thresholds shared by every edge-based detector.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

// ---------------------------------------------------------------------------
// Plane statistics
// ---------------------------------------------------------------------------

/// Fraction of pixels satisfying a predicate on one plane.
pub fn fraction<F: Fn(f32) -> bool>(a: &Array2<f32>, pred: F) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let hits = a.iter().filter(|&&v| pred(v)).count();
    hits as f32 / a.len() as f32
}

/// Fraction of pixels satisfying a joint predicate on three planes
/// (the usual ANDed h/s/v band mask).
pub fn fraction3<F: Fn(f32, f32, f32) -> bool>(
    a: &Array2<f32>,
    b: &Array2<f32>,
    c: &Array2<f32>,
    pred: F,
) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let hits = a
        .iter()
        .zip(b.iter())
        .zip(c.iter())
        .filter(|((&x, &y), &z)| pred(x, y, z))
        .count();
    hits as f32 / a.len() as f32
}

/// Mean of `value` over the pixels where the joint predicate holds;
/// 0.0 when the mask is empty.
pub fn masked_mean<F: Fn(f32, f32, f32) -> bool>(
    a: &Array2<f32>,
    b: &Array2<f32>,
    c: &Array2<f32>,
    pred: F,
    value: impl Fn(f32, f32, f32) -> f32,
) -> f32 {
    let mut sum = 0.0f64;
    let mut n = 0usize;
    for ((&x, &y), &z) in a.iter().zip(b.iter()).zip(c.iter()) {
        if pred(x, y, z) {
            sum += value(x, y, z) as f64;
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        (sum / n as f64) as f32
    }
}

pub fn mean(a: &Array2<f32>) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    (a.iter().map(|&v| v as f64).sum::<f64>() / a.len() as f64) as f32
}

pub fn std_dev(a: &Array2<f32>) -> f32 {
    variance(a).sqrt()
}

/// Population variance, matching numpy's default.
pub fn variance(a: &Array2<f32>) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let m = mean(a) as f64;
    let ss = a.iter().map(|&v| (v as f64 - m).powi(2)).sum::<f64>();
    (ss / a.len() as f64) as f32
}

/// Linear-interpolated percentile of a plane's values, numpy style.
/// `p` is in [0, 100].
pub fn percentile(a: &Array2<f32>, p: f32) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let mut vals: Vec<f32> = a.iter().copied().collect();
    vals.sort_by(|x, y| x.total_cmp(y));
    let rank = (p / 100.0) * (vals.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        vals[lo]
    } else {
        let t = rank - lo as f32;
        vals[lo] * (1.0 - t) + vals[hi] * t
    }
}

// ---------------------------------------------------------------------------
// Gradient fields
// ---------------------------------------------------------------------------

fn plane_to_gray_f32(plane: &Array2<f32>) -> GrayF32 {
    let (h, w) = plane.dim();
    let buf: Vec<f32> = plane.iter().copied().collect();
    ImageBuffer::from_raw(w as u32, h as u32, buf)
        .unwrap_or_else(|| ImageBuffer::new(w as u32, h as u32))
}

fn gray_f32_to_plane(img: &GrayF32) -> Array2<f32> {
    let (w, h) = img.dimensions();
    Array2::from_shape_vec((h as usize, w as usize), img.as_raw().clone())
        .unwrap_or_else(|_| Array2::zeros((h as usize, w as usize)))
}

/// Sobel gradient magnitude field over a [0, 255] gray plane.
pub fn sobel_magnitude(gray: &Array2<f32>) -> Array2<f32> {
    let img = plane_to_gray_f32(gray);
    let gx = filter3x3(&img, &K_SOBEL_X);
    let gy = filter3x3(&img, &K_SOBEL_Y);
    let gx = gray_f32_to_plane(&gx);
    let gy = gray_f32_to_plane(&gy);
    let mut mag = Array2::<f32>::zeros(gray.dim());
    for (out, (&x, &y)) in mag.iter_mut().zip(gx.iter().zip(gy.iter())) {
        *out = (x * x + y * y).sqrt();
    }
    mag
}

/// 3x3 Laplacian response over a [0, 255] gray plane.
pub fn laplacian(gray: &Array2<f32>) -> Array2<f32> {
    let img = plane_to_gray_f32(gray);
    gray_f32_to_plane(&filter3x3(&img, &K_LAPLACIAN))
}

/// Absolute finite-difference field: |d/dy| + |d/dx| with a zero row/column
/// prepended so the output keeps the input shape.
pub fn finite_difference_edges(gray: &Array2<f32>) -> Array2<f32> {
    let (h, w) = gray.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let dy = if y == 0 {
                gray[[y, x]]
            } else {
                gray[[y, x]] - gray[[y - 1, x]]
            };
            let dx = if x == 0 {
                gray[[y, x]]
            } else {
                gray[[y, x]] - gray[[y, x - 1]]
            };
            out[[y, x]] = dy.abs() + dx.abs();
        }
    }
    out
}

/// Mean absolute row-to-row difference (the "fibrous" linear-pattern proxy).
pub fn row_difference_mean(gray: &Array2<f32>) -> f32 {
    let (h, w) = gray.dim();
    if h < 2 || w == 0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in 1..h {
        for x in 0..w {
            sum += (gray[[y, x]] - gray[[y - 1, x]]).abs() as f64;
        }
    }
    (sum / ((h - 1) * w) as f64) as f32
}

// ---------------------------------------------------------------------------
// Edge maps
// ---------------------------------------------------------------------------

/// Canny edge map with the shared 50/150 thresholds.
pub fn canny_edges(gray: &GrayImage) -> GrayImage {
    canny(gray, CANNY_LOW, CANNY_HIGH)
}

/// Canny edge map as a 0/1 plane, ready for the plane morphology helpers.
pub fn canny_edge_mask(gray: &GrayImage) -> Array2<f32> {
    let edges = canny_edges(gray);
    let (w, h) = edges.dimensions();
    let mut out = Array2::<f32>::zeros((h as usize, w as usize));
    for (dst, src) in out.iter_mut().zip(edges.iter()) {
        if *src > 0 {
            *dst = 1.0;
        }
    }
    out
}

/// Gaussian blur over a plane, preserving shape.
pub fn gaussian_smooth(plane: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if plane.is_empty() {
        return plane.clone();
    }
    gray_f32_to_plane(&gaussian_blur_f32(&plane_to_gray_f32(plane), sigma))
}

/// Fraction of Canny edge pixels.
pub fn canny_edge_density(gray: &GrayImage) -> f32 {
    let edges = canny_edges(gray);
    let total = edges.len();
    if total == 0 {
        return 0.0;
    }
    let hits = edges.iter().filter(|&&v| v > 0).count();
    hits as f32 / total as f32
}

/// Number of straight lines found in the Canny edge map, the scratch/cut
/// proxy for surface damage.
pub fn straight_line_count(gray: &GrayImage) -> usize {
    if gray.width() < 2 || gray.height() < 2 {
        return 0;
    }
    let edges = canny_edges(gray);
    let options = LineDetectionOptions {
        vote_threshold: 50,
        suppression_radius: 8,
    };
    detect_lines(&edges, options).len()
}

// ---------------------------------------------------------------------------
// Morphology on planes
// ---------------------------------------------------------------------------

fn sliding_rows<F: Fn(f32, f32) -> f32 + Copy>(a: &Array2<f32>, k: usize, fold: F) -> Array2<f32> {
    let (h, w) = a.dim();
    let half = k / 2;
    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(half);
            let hi = (x + half).min(w - 1);
            let mut acc = a[[y, lo]];
            for xx in lo + 1..=hi {
                acc = fold(acc, a[[y, xx]]);
            }
            out[[y, x]] = acc;
        }
    }
    out
}

fn sliding_cols<F: Fn(f32, f32) -> f32 + Copy>(a: &Array2<f32>, k: usize, fold: F) -> Array2<f32> {
    let (h, w) = a.dim();
    let half = k / 2;
    let mut out = Array2::<f32>::zeros((h, w));
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(half);
            let hi = (y + half).min(h - 1);
            let mut acc = a[[lo, x]];
            for yy in lo + 1..=hi {
                acc = fold(acc, a[[yy, x]]);
            }
            out[[y, x]] = acc;
        }
    }
    out
}

/// Morphological open with a horizontal 1 x k structuring element.
pub fn open_horizontal(a: &Array2<f32>, k: usize) -> Array2<f32> {
    let eroded = sliding_rows(a, k, f32::min);
    sliding_rows(&eroded, k, f32::max)
}

/// Morphological open with a vertical k x 1 structuring element.
pub fn open_vertical(a: &Array2<f32>, k: usize) -> Array2<f32> {
    let eroded = sliding_cols(a, k, f32::min);
    sliding_cols(&eroded, k, f32::max)
}

/// Morphological close with a square (2r+1) element.
pub fn close_square(a: &Array2<f32>, radius: usize) -> Array2<f32> {
    let dilated = dilate_square(a, radius);
    let h = sliding_rows(&dilated, 2 * radius + 1, f32::min);
    sliding_cols(&h, 2 * radius + 1, f32::min)
}

/// Morphological dilate with a square (2r+1) element.
pub fn dilate_square(a: &Array2<f32>, radius: usize) -> Array2<f32> {
    let h = sliding_rows(a, 2 * radius + 1, f32::max);
    sliding_cols(&h, 2 * radius + 1, f32::max)
}

/// Per-pixel variance over a square (2r+1) neighborhood (box statistics).
pub fn local_variance(a: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (h, w) = a.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    let r = radius as isize;
    for y in 0..h as isize {
        for x in 0..w as isize {
            let mut sum = 0.0f64;
            let mut sq = 0.0f64;
            let mut n = 0usize;
            for dy in -r..=r {
                for dx in -r..=r {
                    let yy = y + dy;
                    let xx = x + dx;
                    if yy >= 0 && yy < h as isize && xx >= 0 && xx < w as isize {
                        let v = a[[yy as usize, xx as usize]] as f64;
                        sum += v;
                        sq += v * v;
                        n += 1;
                    }
                }
            }
            let m = sum / n as f64;
            out[[y as usize, x as usize]] = (sq / n as f64 - m * m).max(0.0) as f32;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Contour shape metrics
// ---------------------------------------------------------------------------

/// Shape statistics of one contour.
#[derive(Debug, Clone, Copy)]
pub struct ContourShape {
    pub area: f32,
    pub perimeter: f32,
    /// 4 * pi * area / perimeter^2, 1.0 for a perfect circle.
    pub circularity: f32,
    /// Width / height of the axis-aligned bounding box.
    pub aspect_ratio: f32,
    /// Longer side over shorter side of the minimum-area rectangle.
    pub rect_elongation: f32,
}

fn shoelace_area(points: &[Point<u32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut acc = 0.0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (acc.abs() / 2.0) as f32
}

fn chain_perimeter(points: &[Point<u32>]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len();
    let mut acc = 0.0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let dx = p.x as f64 - q.x as f64;
        let dy = p.y as f64 - q.y as f64;
        acc += (dx * dx + dy * dy).sqrt();
    }
    acc as f32
}

fn contour_shape(contour: &Contour<u32>) -> Option<ContourShape> {
    let points = &contour.points;
    if points.len() < 3 {
        return None;
    }
    let area = shoelace_area(points);
    let perimeter = chain_perimeter(points);
    if perimeter <= 0.0 {
        return None;
    }
    let circularity = 4.0 * PI * area / (perimeter * perimeter);

    let (mut min_x, mut max_x) = (u32::MAX, 0u32);
    let (mut min_y, mut max_y) = (u32::MAX, 0u32);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    let bb_w = (max_x - min_x + 1) as f32;
    let bb_h = (max_y - min_y + 1) as f32;
    let aspect_ratio = if bb_h > 0.0 { bb_w / bb_h } else { 1.0 };

    let rect = min_area_rect(points);
    let side = |a: Point<u32>, b: Point<u32>| {
        let dx = a.x as f32 - b.x as f32;
        let dy = a.y as f32 - b.y as f32;
        (dx * dx + dy * dy).sqrt()
    };
    let s1 = side(rect[0], rect[1]);
    let s2 = side(rect[1], rect[2]);
    let rect_elongation = if s1.min(s2) > 0.0 {
        s1.max(s2) / s1.min(s2)
    } else {
        1.0
    };

    Some(ContourShape {
        area,
        perimeter,
        circularity,
        aspect_ratio,
        rect_elongation,
    })
}

fn outer_shapes(binary: &GrayImage) -> Vec<ContourShape> {
    find_contours::<u32>(binary)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(contour_shape)
        .collect()
}

/// Otsu-threshold the gray image and return the shape of the largest
/// foreground contour, or `None` when no foreground exists.
pub fn largest_foreground_shape(gray: &GrayImage) -> Option<ContourShape> {
    if gray.width() == 0 || gray.height() == 0 {
        return None;
    }
    let level = otsu_level(gray);
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (src, dst) in gray.iter().zip(binary.iter_mut()) {
        *dst = if *src > level { 255 } else { 0 };
    }
    outer_shapes(&binary)
        .into_iter()
        .max_by(|a, b| a.area.total_cmp(&b.area))
}

/// Binarize dark regions against a local mean (the adaptive-threshold stand-in
/// for hole and tunnel detection) and return the shapes of those regions.
pub fn dark_region_shapes(gray: &GrayImage) -> Vec<ContourShape> {
    if gray.width() < 11 || gray.height() < 11 {
        return Vec::new();
    }
    let thresholded = imageproc::contrast::adaptive_threshold(gray, 5);
    let mut inverted = GrayImage::new(gray.width(), gray.height());
    for (src, dst) in thresholded.iter().zip(inverted.iter_mut()) {
        *dst = if *src > 0 { 0 } else { 255 };
    }
    outer_shapes(&inverted)
}

/// Count of reasonably circular dark regions, normalized by an expected
/// count of 10.
pub fn hole_score(gray: &GrayImage) -> f32 {
    let holes = dark_region_shapes(gray)
        .iter()
        .filter(|s| s.area > 50.0 && s.circularity > 0.5)
        .count();
    (holes as f32 / 10.0).min(1.0)
}

/// Irregularity factor over the same dark regions: fraction of clearly
/// non-circular ones, normalized by an expected count of 5.
pub fn irregular_region_factor(gray: &GrayImage) -> f32 {
    let irregular = dark_region_shapes(gray)
        .iter()
        .filter(|s| s.area > 50.0 && s.circularity < 0.3)
        .count();
    (irregular as f32 / 5.0).min(1.0)
}

/// Long, narrow dark regions (aspect > 3) read as pest tunnels.
pub fn tunnel_score(gray: &GrayImage) -> f32 {
    let tunnels = dark_region_shapes(gray)
        .iter()
        .filter(|s| s.area > 100.0 && s.rect_elongation > 3.0)
        .count();
    (tunnels as f32 / 5.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fraction_over_plane() {
        let a = array![[0.0, 1.0], [2.0, 3.0]];
        assert!((fraction(&a, |v| v > 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(fraction(&Array2::<f32>::zeros((0, 0)), |_| true), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let a = array![[0.0, 10.0], [20.0, 30.0]];
        assert!((percentile(&a, 0.0) - 0.0).abs() < 1e-6);
        assert!((percentile(&a, 100.0) - 30.0).abs() < 1e-6);
        assert!((percentile(&a, 50.0) - 15.0).abs() < 1e-6);
        assert!((percentile(&a, 80.0) - 24.0).abs() < 1e-5);
    }

    #[test]
    fn test_masked_mean_empty_mask_is_zero() {
        let a = array![[1.0, 1.0]];
        let b = a.clone();
        let c = a.clone();
        let m = masked_mean(&a, &b, &c, |_, _, _| false, |x, _, _| x);
        assert_eq!(m, 0.0);
    }

    #[test]
    fn test_variance_matches_population_definition() {
        let a = array![[1.0, 3.0], [1.0, 3.0]];
        assert!((variance(&a) - 1.0).abs() < 1e-6);
        assert!((std_dev(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_finite_difference_edges_shape_and_border() {
        let a = array![[5.0, 5.0], [5.0, 5.0]];
        let e = finite_difference_edges(&a);
        assert_eq!(e.dim(), (2, 2));
        // First row/column difference against the prepended zero.
        assert!((e[[0, 0]] - 10.0).abs() < 1e-6);
        assert!((e[[1, 1]] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_horizontal_removes_short_runs() {
        // A 3-wide run survives a k=3 open, a single pixel does not.
        let mut a = Array2::<f32>::zeros((1, 9));
        a[[0, 1]] = 1.0;
        a[[0, 4]] = 1.0;
        a[[0, 5]] = 1.0;
        a[[0, 6]] = 1.0;
        let opened = open_horizontal(&a, 3);
        assert_eq!(opened[[0, 1]], 0.0);
        assert_eq!(opened[[0, 5]], 1.0);
    }

    #[test]
    fn test_square_circularity() {
        // A filled bright square on black: circularity near pi/4.
        let mut img = GrayImage::new(120, 120);
        for y in 10..110 {
            for x in 10..110 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let shape = largest_foreground_shape(&img).expect("expected a contour");
        assert!((shape.circularity - PI / 4.0).abs() < 0.05);
        assert!((shape.aspect_ratio - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_elongated_rectangle_aspect() {
        let mut img = GrayImage::new(200, 200);
        for y in 50..100 {
            for x in 20..180 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let shape = largest_foreground_shape(&img).expect("expected a contour");
        assert!(shape.aspect_ratio > 3.0);
        assert!(shape.rect_elongation > 3.0);
    }

    #[test]
    fn test_no_contour_on_all_black() {
        let img = GrayImage::new(50, 50);
        assert!(largest_foreground_shape(&img).is_none());
    }

    #[test]
    fn test_canny_edge_density_zero_on_flat() {
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        assert_eq!(canny_edge_density(&img), 0.0);
    }

    #[test]
    fn test_local_variance_flat_plane_is_zero() {
        let a = Array2::<f32>::from_elem((10, 10), 7.0);
        let v = local_variance(&a, 2);
        assert!(v.iter().all(|&x| x.abs() < 1e-4));
    }
}
