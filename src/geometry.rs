//! Axis-aligned bounds and the line/box math the reslice cursor relies on.

use glam::DVec3;

/// Tolerance used when deciding whether a point sits on or inside a box.
pub const BOUNDS_TOLERANCE: f64 = 1e-6;

/// Axis-aligned bounding box in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Bounds from the flat `[xmin, xmax, ymin, ymax, zmin, zmax]` layout
    pub fn from_flat(b: [f64; 6]) -> Self {
        Self::new(DVec3::new(b[0], b[2], b[4]), DVec3::new(b[1], b[3], b[5]))
    }

    pub fn to_flat(&self) -> [f64; 6] {
        [
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z,
        ]
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f64 {
        self.extent().length()
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min - DVec3::splat(BOUNDS_TOLERANCE)).all()
            && point.cmple(self.max + DVec3::splat(BOUNDS_TOLERANCE)).all()
    }

    /// Nearest point of the box to `point`
    pub fn clamp(&self, point: DVec3) -> DVec3 {
        point.clamp(self.min, self.max)
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn union_all<'a>(bounds: impl IntoIterator<Item = &'a Bounds>) -> Option<Bounds> {
        bounds.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(acc) => Some(acc.union(b)),
        })
    }

    /// Intersects the infinite line through `p0` and `p1` with the box.
    ///
    /// Returns the entry and exit points ordered along `p0 -> p1`, or `None`
    /// when the line misses the box.
    pub fn intersect_line(&self, p0: DVec3, p1: DVec3) -> Option<(DVec3, DVec3)> {
        let direction = p1 - p0;
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let origin = p0[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < f64::EPSILON {
                if origin < lo - BOUNDS_TOLERANCE || origin > hi + BOUNDS_TOLERANCE {
                    return None;
                }
                continue;
            }
            let t0 = (lo - origin) / d;
            let t1 = (hi - origin) / d;
            t_min = t_min.max(t0.min(t1));
            t_max = t_max.min(t0.max(t1));
        }

        if t_min > t_max || !t_min.is_finite() || !t_max.is_finite() {
            return None;
        }
        Some((p0 + direction * t_min, p0 + direction * t_max))
    }
}

/// Re-orthonormalizes three vectors with Gram-Schmidt, keeping the first
/// vector's direction and the handedness of the input.
pub fn orthonormalize(vectors: [DVec3; 3]) -> [DVec3; 3] {
    let a = vectors[0].normalize_or_zero();
    let b = (vectors[1] - a * vectors[1].dot(a)).normalize_or_zero();
    let mut c = a.cross(b);
    if c.dot(vectors[2]) < 0.0 {
        c = -c;
    }
    [a, b, c]
}
