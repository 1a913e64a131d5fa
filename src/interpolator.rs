//! Kinetic Interpolator
//!
//! A small peripheral component a renderer invokes once per frame to
//! linearly interpolate visual state between two simulation ticks (spec
//! §4.6). Unlike the rest of this crate it does no code generation —
//! it is plain numeric state management, grounded the way
//! `modules/math.rs` in the retrieval pack implements trig primitives
//! as free functions over `f64` rather than a type-class hierarchy.

/// A renderer-visible drawable's axis-aligned bounding box in stage
/// coordinates, used to derive the position-interpolation tolerance
/// (spec §4.6, §8 invariant 8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub width: f64,
    pub height: f64,
}

impl Aabb {
    /// `min(50, 10 + AABB.dimension)` for the given axis (spec §4.6).
    fn tolerance(self, axis: Axis) -> f64 {
        let dimension = match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        };
        (10.0 + dimension).min(50.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// A snapshot of one target's visual state, taken at `setup` time (spec
/// §4.6 "Setup").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSnapshot {
    pub x: f64,
    pub y: f64,
    pub direction: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub costume: u32,
    pub ghost: f64,
}

/// The drawable-facing state the interpolator writes into each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableState {
    pub x: f64,
    pub y: f64,
    pub direction: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub ghost: f64,
}

/// Snapshot every visible non-stage target's `(x, y, direction, scale,
/// costume, ghost)`; clear the snapshot for any target that is the
/// stage or not visible (spec §4.6 "Setup").
pub fn setup(is_stage: bool, visible: bool, current: DrawableState, costume: u32) -> Option<TargetSnapshot> {
    if is_stage || !visible {
        return None;
    }
    Some(TargetSnapshot {
        x: current.x,
        y: current.y,
        direction: current.direction,
        scale_x: current.scale_x,
        scale_y: current.scale_y,
        costume,
        ghost: current.ghost,
    })
}

/// Snap a target back to its own recorded state before the next
/// simulation tick runs, so mid-frame interpolation does not leak into
/// game logic (spec §4.6 "Restore").
pub fn restore(snapshot: &TargetSnapshot) -> DrawableState {
    DrawableState {
        x: snapshot.x,
        y: snapshot.y,
        direction: snapshot.direction,
        scale_x: snapshot.scale_x,
        scale_y: snapshot.scale_y,
        ghost: snapshot.ghost,
    }
}

fn interpolate_axis(previous: f64, current: f64, aabb: Aabb, axis: Axis) -> f64 {
    let delta = (current - previous).abs();
    if delta > 0.1 && delta <= aabb.tolerance(axis) {
        (previous + current) / 2.0
    } else {
        current
    }
}

/// `round(x*1e10)/1e10`, canonicalizing near-zero trig artifacts the
/// same way the Expression Lowerer canonicalizes `sin`/`cos` (spec §4.2,
/// §4.6).
fn round_1e10(v: f64) -> f64 {
    (v * 1e10).round() / 1e10
}

/// Average two angles (degrees) by summing their unit vectors and
/// taking `atan2` of the sum, then converting back to degrees (spec
/// §4.6 "Direction").
fn average_direction_degrees(previous: f64, current: f64) -> f64 {
    let to_radians = std::f64::consts::PI / 180.0;
    let (py, px) = (previous * to_radians).sin_cos();
    let (cy, cx) = (current * to_radians).sin_cos();
    let sum_x = px + cx;
    let sum_y = py + cy;
    round_1e10(sum_y.atan2(sum_x) * (180.0 / std::f64::consts::PI))
}

/// Interpolate one target's drawable state at sub-tick rate, between
/// `previous` (the setup-time snapshot) and `current` (the just-computed
/// simulation result) (spec §4.6 "Interpolate").
///
/// `costume_changed` gates direction and scale interpolation: per spec
/// these are "only when costume is unchanged", since a changed costume
/// may have rotated/resized the drawable in a way unrelated to motion.
pub fn interpolate(previous: &TargetSnapshot, current: DrawableState, costume_changed: bool, aabb: Aabb) -> DrawableState {
    let x = interpolate_axis(previous.x, current.x, aabb, Axis::X);
    let y = interpolate_axis(previous.y, current.y, aabb, Axis::Y);

    let ghost_delta = (current.ghost - previous.ghost).abs();
    let ghost = if ghost_delta > 0.0 && ghost_delta < 25.0 { (previous.ghost + current.ghost) / 2.0 } else { current.ghost };

    let direction = if costume_changed {
        current.direction
    } else {
        // TODO: large direction changes should snap instead of
        // averaging through the short way around; left unimplemented.
        average_direction_degrees(previous.direction, current.direction)
    };

    let signs_match = previous.scale_x.signum() == current.scale_x.signum() && previous.scale_y.signum() == current.scale_y.signum();
    let (scale_x, scale_y) = if costume_changed || !signs_match {
        (current.scale_x, current.scale_y)
    } else if (current.scale_x - previous.scale_x).abs() < 100.0 {
        ((previous.scale_x + current.scale_x) / 2.0, (previous.scale_y + current.scale_y) / 2.0)
    } else {
        (current.scale_x, current.scale_y)
    };

    DrawableState { x, y, direction, scale_x, scale_y, ghost }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(x: f64, y: f64, direction: f64, scale_x: f64, scale_y: f64, ghost: f64) -> TargetSnapshot {
        TargetSnapshot { x, y, direction, scale_x, scale_y, costume: 1, ghost }
    }

    fn state(x: f64, y: f64, direction: f64, scale_x: f64, scale_y: f64, ghost: f64) -> DrawableState {
        DrawableState { x, y, direction, scale_x, scale_y, ghost }
    }

    #[test]
    fn stage_target_gets_no_snapshot() {
        assert!(setup(true, true, state(0.0, 0.0, 90.0, 100.0, 100.0, 0.0), 1).is_none());
    }

    #[test]
    fn invisible_target_gets_no_snapshot() {
        assert!(setup(false, false, state(0.0, 0.0, 90.0, 100.0, 100.0, 0.0), 1).is_none());
    }

    #[test]
    fn position_within_tolerance_is_midpoint() {
        let prev = snapshot(0.0, 0.0, 90.0, 100.0, 100.0, 0.0);
        let cur = state(10.0, 0.0, 90.0, 100.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.x, 5.0);
    }

    #[test]
    fn position_beyond_tolerance_snaps() {
        let prev = snapshot(0.0, 0.0, 90.0, 100.0, 100.0, 0.0);
        let cur = state(1000.0, 0.0, 90.0, 100.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.x, 1000.0);
    }

    #[test]
    fn ghost_transition_from_zero_to_full_snaps() {
        let prev = snapshot(0.0, 0.0, 90.0, 100.0, 100.0, 0.0);
        let cur = state(0.0, 0.0, 90.0, 100.0, 100.0, 100.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.ghost, 100.0);
    }

    #[test]
    fn direction_averages_across_the_zero_boundary() {
        let prev = snapshot(0.0, 0.0, 350.0, 100.0, 100.0, 0.0);
        let cur = state(0.0, 0.0, 10.0, 100.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.direction, 0.0);
    }

    #[test]
    fn direction_is_not_interpolated_when_costume_changed() {
        let prev = snapshot(0.0, 0.0, 350.0, 100.0, 100.0, 0.0);
        let cur = state(0.0, 0.0, 10.0, 100.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, true, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.direction, 10.0);
    }

    #[test]
    fn scale_sign_mismatch_disables_interpolation() {
        let prev = snapshot(0.0, 0.0, 0.0, 100.0, 100.0, 0.0);
        let cur = state(0.0, 0.0, 0.0, -100.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.scale_x, -100.0);
    }

    #[test]
    fn scale_within_threshold_is_midpoint() {
        let prev = snapshot(0.0, 0.0, 0.0, 100.0, 100.0, 0.0);
        let cur = state(0.0, 0.0, 0.0, 150.0, 100.0, 0.0);
        let out = interpolate(&prev, cur, false, Aabb { width: 20.0, height: 20.0 });
        assert_eq!(out.scale_x, 125.0);
    }

    #[test]
    fn restore_recovers_snapshot_as_drawable_state() {
        let snap = snapshot(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let out = restore(&snap);
        assert_eq!(out, state(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
    }
}
