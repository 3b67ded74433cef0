//! Arc planning: radius- and center-form validation and splitting
//! into straight segments within the chordal tolerance.
//!
//! The splitter works in the active plane's two circle axes; every
//! other axis (the plane normal for helixes, and the rotary axes)
//! is interpolated linearly across the sweep. Output segments are
//! full canonical target vectors ready to enqueue as feeds.

use tracing::warn;

use arbor_common::consts::{AXIS_COUNT, PLANNER_QUEUE_DEPTH};
use arbor_common::gcode::Plane;
use arbor_common::status::Status;

/// Everything the splitter needs to know about one arc.
#[derive(Debug, Clone)]
pub struct ArcSpec {
    /// Start point [mm, machine frame].
    pub start: [f64; AXIS_COUNT],
    /// End point [mm, machine frame].
    pub target: [f64; AXIS_COUNT],
    /// Active plane (selects the two circle axes).
    pub plane: Plane,
    /// I/J/K center offsets from the start point [mm]; only the two
    /// plane components are read.
    pub offsets: [f64; 3],
    /// R word [mm]; zero selects center form.
    pub radius: f64,
    /// G2 (clockwise) vs G3.
    pub clockwise: bool,
    /// Maximum chord-to-arc deviation [mm].
    pub chordal_tolerance: f64,
    /// Segments are not cut shorter than this [mm].
    pub min_segment_len: f64,
}

/// Center-form radius consistency allowance [mm].
const RADIUS_DEVIATION_MAX: f64 = 0.5;

/// Split an arc into straight-segment targets.
///
/// Errors with `ArcSpecificationError` when the geometry is not a
/// legal arc: zero chord in radius form, radius shorter than the
/// half-chord, a center that is not equidistant from both endpoints,
/// or a degenerate zero radius.
pub fn plan_arc(spec: &ArcSpec) -> Result<Vec<[f64; AXIS_COUNT]>, Status> {
    let (axis_0, axis_1, _) = spec.plane.axes();
    let i0 = axis_0 as usize;
    let i1 = axis_1 as usize;

    let s0 = spec.start[i0];
    let s1 = spec.start[i1];
    let t0 = spec.target[i0];
    let t1 = spec.target[i1];

    let (c0, c1, radius) = if spec.radius != 0.0 {
        center_from_radius(s0, s1, t0, t1, spec.radius, spec.clockwise)?
    } else {
        let c0 = s0 + spec.offsets[i0];
        let c1 = s1 + spec.offsets[i1];
        let radius = ((s0 - c0).powi(2) + (s1 - c1).powi(2)).sqrt();
        if radius <= 0.0 {
            return Err(Status::ArcSpecificationError);
        }
        let radius_at_target = ((t0 - c0).powi(2) + (t1 - c1).powi(2)).sqrt();
        if (radius - radius_at_target).abs() > RADIUS_DEVIATION_MAX {
            return Err(Status::ArcSpecificationError);
        }
        (c0, c1, radius)
    };

    let theta_start = (s1 - c1).atan2(s0 - c0);
    let theta_end = (t1 - c1).atan2(t0 - c0);
    let mut sweep = theta_end - theta_start;
    if spec.clockwise {
        if sweep >= 0.0 {
            sweep -= 2.0 * std::f64::consts::PI;
        }
    } else if sweep <= 0.0 {
        sweep += 2.0 * std::f64::consts::PI;
    }

    let count = segment_count(
        sweep.abs(),
        radius,
        spec.chordal_tolerance,
        spec.min_segment_len,
    );

    let mut segments = Vec::with_capacity(count);
    for step in 1..=count {
        let fraction = step as f64 / count as f64;
        let mut point = spec.start;
        // Non-circle axes (helix depth, rotaries) interpolate linearly.
        for i in 0..AXIS_COUNT {
            point[i] = spec.start[i] + (spec.target[i] - spec.start[i]) * fraction;
        }
        if step == count {
            // Land exactly on the programmed endpoint.
            point = spec.target;
        } else {
            let angle = theta_start + sweep * fraction;
            point[i0] = c0 + radius * angle.cos();
            point[i1] = c1 + radius * angle.sin();
        }
        segments.push(point);
    }
    Ok(segments)
}

/// Radius-form center: the arc of the given signed radius through the
/// two endpoints. A negative R selects the longer of the two arcs.
fn center_from_radius(
    s0: f64,
    s1: f64,
    t0: f64,
    t1: f64,
    radius: f64,
    clockwise: bool,
) -> Result<(f64, f64, f64), Status> {
    let x = t0 - s0;
    let y = t1 - s1;
    let chord_sq = x * x + y * y;
    if chord_sq <= f64::EPSILON {
        // Radius form cannot describe a full circle.
        return Err(Status::ArcSpecificationError);
    }
    let mut r = radius;
    let discriminant = 4.0 * r * r - chord_sq;
    if discriminant < 0.0 {
        // Endpoints further apart than the diameter.
        return Err(Status::ArcSpecificationError);
    }
    let mut h_x2_div_d = -discriminant.sqrt() / chord_sq.sqrt();
    if !clockwise {
        h_x2_div_d = -h_x2_div_d;
    }
    if r < 0.0 {
        h_x2_div_d = -h_x2_div_d;
        r = -r;
    }
    let c0 = s0 + (x - y * h_x2_div_d) / 2.0;
    let c1 = s1 + (y + x * h_x2_div_d) / 2.0;
    Ok((c0, c1, r))
}

/// Number of segments keeping every chord within the tolerance,
/// bounded below by the minimum segment length and above by the
/// planner depth.
fn segment_count(sweep: f64, radius: f64, tolerance: f64, min_segment_len: f64) -> usize {
    let max_angle = if tolerance < radius {
        2.0 * (1.0 - tolerance / radius).acos()
    } else {
        std::f64::consts::FRAC_PI_2
    };
    let mut count = (sweep / max_angle).ceil() as usize;
    count = count.max(1);

    let arc_len = sweep * radius;
    let len_cap = ((arc_len / min_segment_len).floor() as usize).max(1);
    count = count.min(len_cap);

    if count > PLANNER_QUEUE_DEPTH {
        warn!(
            requested = count,
            applied = PLANNER_QUEUE_DEPTH,
            "arc segment count capped to planner depth"
        );
        count = PLANNER_QUEUE_DEPTH;
    }
    count
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::axis::Axis;

    fn spec() -> ArcSpec {
        ArcSpec {
            start: [0.0; AXIS_COUNT],
            target: [0.0; AXIS_COUNT],
            plane: Plane::Xy,
            offsets: [0.0; 3],
            radius: 0.0,
            clockwise: false,
            chordal_tolerance: 0.01,
            min_segment_len: 0.05,
        }
    }

    fn on_circle(point: &[f64; AXIS_COUNT], c0: f64, c1: f64, r: f64) -> bool {
        let d = ((point[0] - c0).powi(2) + (point[1] - c1).powi(2)).sqrt();
        (d - r).abs() < 1e-9
    }

    #[test]
    fn quarter_circle_center_form() {
        let mut arc = spec();
        arc.target[0] = 10.0;
        arc.target[1] = 10.0;
        arc.offsets[0] = 0.0;
        arc.offsets[1] = 10.0; // center (0, 10)
        let segments = plan_arc(&arc).unwrap();
        assert!(segments.len() > 1);
        // Every intermediate point sits on the circle.
        for point in &segments[..segments.len() - 1] {
            assert!(on_circle(point, 0.0, 10.0, 10.0), "{point:?}");
        }
        // Exact landing.
        let last = segments.last().unwrap();
        assert_eq!(last[0], 10.0);
        assert_eq!(last[1], 10.0);
    }

    #[test]
    fn center_form_rejects_inconsistent_radius() {
        let mut arc = spec();
        arc.target[0] = 50.0; // nowhere near the circle through start
        arc.offsets[1] = 10.0;
        assert_eq!(plan_arc(&arc), Err(Status::ArcSpecificationError));
    }

    #[test]
    fn center_form_rejects_zero_radius() {
        let arc = spec(); // center == start
        assert_eq!(plan_arc(&arc), Err(Status::ArcSpecificationError));
    }

    #[test]
    fn full_circle_center_form() {
        let mut arc = spec();
        arc.offsets[0] = 10.0; // center (10, 0), start == target
        let segments = plan_arc(&arc).unwrap();
        let last = segments.last().unwrap();
        assert_eq!(last[0], 0.0);
        assert_eq!(last[1], 0.0);
        // Midway point is on the far side of the circle.
        let mid = &segments[segments.len() / 2 - 1];
        assert!(mid[0] > 10.0);
    }

    #[test]
    fn radius_form_half_circle_sides() {
        let mut arc = spec();
        arc.target[0] = 20.0;
        arc.radius = 10.0;
        let ccw = plan_arc(&arc).unwrap();
        arc.clockwise = true;
        let cw = plan_arc(&arc).unwrap();
        // CCW bulges down (negative Y), CW bulges up, or vice versa —
        // they must bulge to opposite sides.
        let ccw_mid_y = ccw[ccw.len() / 2][1];
        let cw_mid_y = cw[cw.len() / 2][1];
        assert!(ccw_mid_y * cw_mid_y < 0.0, "ccw {ccw_mid_y} cw {cw_mid_y}");
    }

    #[test]
    fn radius_form_rejects_unreachable_endpoints() {
        let mut arc = spec();
        arc.target[0] = 50.0;
        arc.radius = 10.0; // diameter 20 < chord 50
        assert_eq!(plan_arc(&arc), Err(Status::ArcSpecificationError));
    }

    #[test]
    fn radius_form_rejects_full_circle() {
        let mut arc = spec();
        arc.radius = 10.0; // start == target
        assert_eq!(plan_arc(&arc), Err(Status::ArcSpecificationError));
    }

    #[test]
    fn helix_interpolates_normal_axis() {
        let mut arc = spec();
        arc.target[0] = 10.0;
        arc.target[1] = 10.0;
        arc.target[2] = 6.0; // Z climbs across the arc
        arc.offsets[1] = 10.0;
        let segments = plan_arc(&arc).unwrap();
        let n = segments.len() as f64;
        for (index, point) in segments.iter().enumerate() {
            let expected = 6.0 * (index + 1) as f64 / n;
            assert!((point[Axis::Z as usize] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn segment_count_capped_at_planner_depth() {
        // A huge, fine arc would want hundreds of segments.
        let count = segment_count(std::f64::consts::PI * 1.5, 100.0, 0.001, 0.05);
        assert_eq!(count, PLANNER_QUEUE_DEPTH);
    }

    #[test]
    fn coarse_tolerance_needs_fewer_segments() {
        let fine = segment_count(1.0, 10.0, 0.001, 0.05);
        let coarse = segment_count(1.0, 10.0, 0.1, 0.05);
        assert!(coarse < fine);
    }

    #[test]
    fn xz_plane_uses_its_axes() {
        let mut arc = spec();
        arc.plane = Plane::Xz;
        // G18 circle axes are (Z, X); make a quarter arc in Z/X.
        arc.target[Axis::Z as usize] = 10.0;
        arc.target[Axis::X as usize] = 10.0;
        arc.offsets[Axis::Z as usize] = 10.0; // K offset: center Z = 10
        let segments = plan_arc(&arc).unwrap();
        for point in &segments[..segments.len() - 1] {
            let d = ((point[Axis::Z as usize] - 10.0).powi(2)
                + point[Axis::X as usize].powi(2))
            .sqrt();
            assert!((d - 10.0).abs() < 1e-9);
        }
        // Y never moves.
        for point in &segments {
            assert_eq!(point[Axis::Y as usize], 0.0);
        }
    }
}
