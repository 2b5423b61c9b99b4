//! Homography estimation and canvas composition
//!
//! The 3x3 projective transform mapping clicked pixel coordinates to
//! ground-plane coordinates is estimated with a DLT solve (Hartley
//! normalization, then the null vector of the 8x9 correspondence system via
//! SVD). The estimate is then composed with a scale/translate matrix that
//! maps ground units onto a fixed-width pixel canvas whose height preserves
//! the ground-plane aspect ratio, anchored so the minimum ground coordinate
//! lands at (0, 0). The composition is what keeps the rectified view stable
//! regardless of the arbitrary units chosen for the ground plane.

use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::config::GroundConfig;
use crate::error::CalibrateError;
use crate::picker::PixelPoint;

/// Pixel dimensions of the rectified output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Apply a homography to a point (homogeneous divide).
///
/// If the homogeneous weight is ~0 the point lies on the transform's line at
/// infinity and has no finite image; the input point is returned unchanged
/// rather than dividing by zero. Matrices produced by [`estimate`] reject
/// the degenerate quads that would put a clicked point there.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let v = h * Vector3::new(x, y, 1.0);
    if v[2].abs() < 1e-12 {
        return (x, y);
    }
    (v[0] / v[2], v[1] / v[2])
}

/// Hartley normalization: translate to the centroid and scale so the mean
/// distance from it is sqrt(2). Returns the normalized points and the
/// normalizing transform.
fn normalize_points(pts: &[(f64, f64); 4]) -> (Vec<(f64, f64)>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        2.0_f64.sqrt() / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let out = pts
        .iter()
        .map(|p| (s * (p.0 - cx), s * (p.1 - cy)))
        .collect();
    (out, t)
}

/// True if any three of the four points are (nearly) collinear, which makes
/// the four-correspondence homography estimate degenerate.
fn has_collinear_triple(pts: &[(f64, f64); 4]) -> bool {
    let extent = pts
        .iter()
        .flat_map(|p| [p.0.abs(), p.1.abs()])
        .fold(1.0_f64, f64::max);
    let eps = 1e-9 * extent * extent;

    for i in 0..4 {
        for j in (i + 1)..4 {
            for k in (j + 1)..4 {
                let (ax, ay) = pts[i];
                let (bx, by) = pts[j];
                let (cx, cy) = pts[k];
                // Twice the signed triangle area
                let area2 = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
                if area2.abs() <= eps {
                    return true;
                }
            }
        }
    }
    false
}

/// Estimate the 3x3 homography mapping pixel coordinates to ground
/// coordinates from four positional correspondences.
pub fn estimate(
    pixel_points: &[PixelPoint; 4],
    ground: &GroundConfig,
) -> Result<Matrix3<f64>, CalibrateError> {
    let px: [(f64, f64); 4] = [
        (pixel_points[0].x as f64, pixel_points[0].y as f64),
        (pixel_points[1].x as f64, pixel_points[1].y as f64),
        (pixel_points[2].x as f64, pixel_points[2].y as f64),
        (pixel_points[3].x as f64, pixel_points[3].y as f64),
    ];
    let gr: [(f64, f64); 4] = [
        (ground.points[0].x, ground.points[0].y),
        (ground.points[1].x, ground.points[1].y),
        (ground.points[2].x, ground.points[2].y),
        (ground.points[3].x, ground.points[3].y),
    ];

    if has_collinear_triple(&px) {
        return Err(CalibrateError::CollinearPixelPoints);
    }
    if has_collinear_triple(&gr) {
        return Err(CalibrateError::DegenerateGroundPlane);
    }

    let (p, tp) = normalize_points(&px);
    let (g, tg) = normalize_points(&gr);

    // 8x9 DLT system: two rows per correspondence (x, y) -> (u, v)
    let mut a = DMatrix::<f64>::zeros(8, 9);
    for k in 0..4 {
        let (x, y) = p[k];
        let (u, v) = g[k];

        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Null vector: right singular vector with the smallest singular value.
    // The SVD runs on the 9x9 normal matrix so the full basis is available.
    let ata = a.transpose() * &a;
    let svd = ata.svd(true, true);
    let vt = svd.v_t.ok_or(CalibrateError::CollinearPixelPoints)?;
    let h = vt.row(8);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    // Denormalize: H = Tg^-1 * Hn * Tp
    let tg_inv = tg
        .try_inverse()
        .ok_or(CalibrateError::DegenerateGroundPlane)?;
    let h = tg_inv * hn * tp;

    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return Err(CalibrateError::CollinearPixelPoints);
    }
    Ok(h / scale)
}

/// Estimate the pixel-to-ground homography and compose it with the
/// ground-to-canvas scale matrix. Returns the composed transform and the
/// canvas dimensions: `target_width` wide, height proportional to the
/// ground-plane aspect ratio.
pub fn scaled_homography(
    pixel_points: &[PixelPoint; 4],
    ground: &GroundConfig,
) -> Result<(Matrix3<f64>, Canvas), CalibrateError> {
    // Ground extent is validated before looking at the pixel points, so a
    // degenerate configuration fails identically no matter what was clicked.
    let (min_x, min_y, width, height) = ground.bounding_box();
    if width <= 0.0 || height <= 0.0 {
        return Err(CalibrateError::DegenerateGroundPlane);
    }
    if ground.target_width == 0 {
        return Err(CalibrateError::InvalidTargetWidth);
    }

    let target_w = ground.target_width as f64;
    let target_h = (target_w * height / width).round();
    if target_h < 1.0 {
        return Err(CalibrateError::DegenerateGroundPlane);
    }

    let h = estimate(pixel_points, ground)?;

    let sx = target_w / width;
    let sy = target_h / height;
    let tx = -min_x * sx;
    let ty = -min_y * sy;
    let scale = Matrix3::new(sx, 0.0, tx, 0.0, sy, ty, 0.0, 0.0, 1.0);

    let canvas = Canvas {
        width: ground.target_width,
        height: target_h as u32,
    };
    Ok((scale * h, canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroundPoint;

    const TOL: f64 = 1e-6;

    fn pixel_quad(pts: [(i32, i32); 4]) -> [PixelPoint; 4] {
        pts.map(|(x, y)| PixelPoint { x, y })
    }

    fn ground(points: [(f64, f64); 4], target_width: u32) -> GroundConfig {
        GroundConfig {
            points: points.map(|(x, y)| GroundPoint::new(x, y)),
            target_width,
        }
    }

    #[test]
    fn test_project_at_infinity_returns_input() {
        // Bottom row (0, 1, 0): any point with y == 0 has zero homogeneous
        // weight and no finite image
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0);
        assert_eq!(project(&h, 5.0, 0.0), (5.0, 0.0));
        // Points off that line still project normally
        let (x, y) = project(&h, 4.0, 2.0);
        assert!((x - 2.0).abs() < TOL);
        assert!((y - 1.0).abs() < TOL);
    }

    #[test]
    fn test_estimate_identity() {
        let px = pixel_quad([(0, 0), (100, 0), (0, 100), (100, 100)]);
        let gr = ground([(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)], 600);
        let h = estimate(&px, &gr).unwrap();

        let (x, y) = project(&h, 50.0, 50.0);
        assert!((x - 50.0).abs() < TOL);
        assert!((y - 50.0).abs() < TOL);
    }

    #[test]
    fn test_estimate_maps_correspondences() {
        let px = pixel_quad([(120, 40), (520, 60), (100, 420), (220, 430)]);
        let gr = ground([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (0.8, 3.0)], 600);
        let h = estimate(&px, &gr).unwrap();

        for (p, g) in px.iter().zip(gr.points.iter()) {
            let (x, y) = project(&h, p.x as f64, p.y as f64);
            assert!((x - g.x).abs() < TOL, "x: {} vs {}", x, g.x);
            assert!((y - g.y).abs() < TOL, "y: {} vs {}", y, g.y);
        }
    }

    #[test]
    fn test_scaled_homography_canvas_and_mapping() {
        // Ground spans 3x3 units, so a 600-wide canvas is square
        let px = pixel_quad([(120, 40), (520, 60), (100, 420), (220, 430)]);
        let gr = ground([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (0.8, 3.0)], 600);
        let (h, canvas) = scaled_homography(&px, &gr).unwrap();

        assert_eq!(canvas, Canvas { width: 600, height: 600 });

        // Each click lands on its scaled ground point: 200 canvas px per unit
        let expected = [(0.0, 0.0), (600.0, 0.0), (0.0, 600.0), (160.0, 600.0)];
        for (p, (ex, ey)) in px.iter().zip(expected) {
            let (x, y) = project(&h, p.x as f64, p.y as f64);
            assert!((x - ex).abs() < TOL, "x: {} vs {}", x, ex);
            assert!((y - ey).abs() < TOL, "y: {} vs {}", y, ey);
        }
    }

    #[test]
    fn test_canvas_height_follows_aspect_ratio() {
        let px = pixel_quad([(10, 10), (630, 30), (20, 460), (600, 440)]);
        let gr = ground([(0.0, 0.0), (4.0, 0.0), (0.0, 2.0), (4.0, 2.0)], 600);
        let (_, canvas) = scaled_homography(&px, &gr).unwrap();
        assert_eq!(canvas, Canvas { width: 600, height: 300 });
    }

    #[test]
    fn test_minimum_ground_coordinate_anchors_at_origin() {
        // Same quad translated away from the origin still maps P1 to (0, 0)
        let px = pixel_quad([(120, 40), (520, 60), (100, 420), (220, 430)]);
        let gr = ground([(5.0, 7.0), (8.0, 7.0), (5.0, 10.0), (5.8, 10.0)], 600);
        let (h, canvas) = scaled_homography(&px, &gr).unwrap();

        assert_eq!(canvas, Canvas { width: 600, height: 600 });
        let (x, y) = project(&h, 120.0, 40.0);
        assert!(x.abs() < TOL);
        assert!(y.abs() < TOL);
    }

    #[test]
    fn test_degenerate_ground_fails_regardless_of_pixels() {
        let px = pixel_quad([(120, 40), (520, 60), (100, 420), (220, 430)]);
        let gr = ground([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)], 600);
        assert!(matches!(
            scaled_homography(&px, &gr),
            Err(CalibrateError::DegenerateGroundPlane)
        ));
    }

    #[test]
    fn test_collinear_pixel_points_rejected() {
        let px = pixel_quad([(0, 0), (10, 10), (20, 20), (30, 30)]);
        let gr = ground([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (0.8, 3.0)], 600);
        assert!(matches!(
            estimate(&px, &gr),
            Err(CalibrateError::CollinearPixelPoints)
        ));
    }

    #[test]
    fn test_collinear_triple_rejected() {
        // Only three of the four are collinear; still degenerate
        let px = pixel_quad([(0, 0), (10, 0), (20, 0), (30, 30)]);
        let gr = ground([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (0.8, 3.0)], 600);
        assert!(matches!(
            estimate(&px, &gr),
            Err(CalibrateError::CollinearPixelPoints)
        ));
    }
}
