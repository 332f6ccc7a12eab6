use crate::occupancy::types::Pt3;

/// Signed distance function for a sphere
pub fn sphere_sdf(point: &Pt3, center: &Pt3, radius: f32) -> f32 {
    (point - center).magnitude() - radius
}

/// Signed distance function for a capsule (line segment with radius)
pub fn capsule_sdf(point: &Pt3, a: &Pt3, b: &Pt3, radius: f32) -> f32 {
    let ba = b - a;
    let pa = point - a;
    let ba_dot = ba.magnitude_squared();

    if ba_dot < 1e-8 {
        // Degenerate capsule (a == b), treat as sphere
        return sphere_sdf(point, a, radius);
    }

    let h = (pa.dot(&ba) / ba_dot).clamp(0.0, 1.0);
    let closest = a + ba * h;
    (point - closest).magnitude() - radius
}

/// Smooth minimum (polynomial approximation)
/// Blends two SDF values with smooth transition of width `k`
pub fn smooth_min_poly(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (k - (a - b).abs()).max(0.0);
    a.min(b) - h * h * 0.25 / k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_sdf() {
        let center = Pt3::origin();

        assert!((sphere_sdf(&Pt3::new(0.5, 0.0, 0.0), &center, 0.5)).abs() < 1e-6);
        assert!(sphere_sdf(&Pt3::origin(), &center, 0.5) < 0.0);
        assert!(sphere_sdf(&Pt3::new(1.0, 0.0, 0.0), &center, 0.5) > 0.0);
    }

    #[test]
    fn test_capsule_sdf() {
        let a = Pt3::new(0.0, -0.5, 0.0);
        let b = Pt3::new(0.0, 0.5, 0.0);

        // Beside the segment the capsule behaves like a cylinder
        assert!((capsule_sdf(&Pt3::new(0.3, 0.2, 0.0), &a, &b, 0.1) - 0.2).abs() < 1e-6);
        // Past the end it behaves like the end cap sphere
        assert!((capsule_sdf(&Pt3::new(0.0, 1.0, 0.0), &a, &b, 0.1) - 0.4).abs() < 1e-6);
        // Degenerate segment
        assert!((capsule_sdf(&Pt3::new(0.0, 1.0, 0.0), &a, &a, 0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_min_poly() {
        // Far apart values are unaffected
        assert!((smooth_min_poly(0.0, 5.0, 0.2) - 0.0).abs() < 1e-6);
        // Equal values get pulled below both
        assert!(smooth_min_poly(0.1, 0.1, 0.2) < 0.1);
        // Zero width is a hard minimum
        assert_eq!(smooth_min_poly(0.3, 0.1, 0.0), 0.1);
    }
}
