//! Plane geometry helpers.

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
///
/// Returns the distance to `a` when the two line points coincide.
pub fn point_line_distance(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = dx.hypot(dy);
    if len < 1e-12 {
        return (p[0] - a[0]).hypot(p[1] - a[1]);
    }
    // |(b - a) x (p - a)| / |b - a|
    let cross = dx * (p[1] - a[1]) - dy * (p[0] - a[0]);
    cross.abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line_distance_is_vertical_offset() {
        let d = point_line_distance([-100.0, 20.0], [100.0, 20.0], [5.0, 70.0]);
        assert!((d - 50.0).abs() < 1e-12);
    }

    #[test]
    fn distance_ignores_point_order_and_side() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        let above = point_line_distance(a, b, [-4.0, 3.0]);
        let below = point_line_distance(b, a, [4.0, -3.0]);
        assert!((above - 5.0).abs() < 1e-12);
        assert!((below - 5.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_line_falls_back_to_point_distance() {
        let d = point_line_distance([1.0, 1.0], [1.0, 1.0], [4.0, 5.0]);
        assert!((d - 5.0).abs() < 1e-12);
    }
}
