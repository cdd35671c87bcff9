use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Obstacle proxies
// ---------------------------------------------------------------------------

/// Axis-aligned box standing in for an obstacle mesh. Enough geometry for
/// the ranging sensors: ray intersection distance plus the hit-face normal.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub label: String,
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f64,
    pub normal: Vector3<f64>,
}

impl Obstacle {
    pub fn new(label: impl Into<String>, min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { label: label.into(), min, max }
    }

    /// Box centered at `center` with the given full extents.
    pub fn centered(label: impl Into<String>, center: Vector3<f64>, extents: Vector3<f64>) -> Self {
        Self::new(label, center - extents / 2.0, center + extents / 2.0)
    }

    /// Slab-method ray/box intersection. Returns the entry distance and the
    /// entry-face normal, or `None` past `max_range` or on a miss. An
    /// origin already inside the box reads distance zero, pushing straight
    /// back along the ray.
    pub fn intersect_ray(
        &self,
        origin: &Vector3<f64>,
        dir: &Vector3<f64>,
        max_range: f64,
    ) -> Option<RayHit> {
        let mut t_enter = f64::NEG_INFINITY;
        let mut t_exit = f64::INFINITY;
        let mut entry_axis = 0;
        let mut entry_sign = 0.0;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let mut t0 = (self.min[axis] - o) / d;
            let mut t1 = (self.max[axis] - o) / d;
            // Entering through the min face means the outward normal points
            // along -axis; through the max face, +axis.
            let mut sign = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                sign = 1.0;
            }
            if t0 > t_enter {
                t_enter = t0;
                entry_axis = axis;
                entry_sign = sign;
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_exit < 0.0 {
            return None;
        }
        if t_enter < 0.0 {
            // Inside the box.
            return Some(RayHit { distance: 0.0, normal: -dir.normalize() });
        }
        if t_enter > max_range {
            return None;
        }

        let mut normal = Vector3::zeros();
        normal[entry_axis] = entry_sign;
        Some(RayHit { distance: t_enter, normal })
    }
}

/// Nearest intersection along a ray across a set of obstacles.
pub fn nearest_hit(
    obstacles: &[Obstacle],
    origin: &Vector3<f64>,
    dir: &Vector3<f64>,
    max_range: f64,
) -> Option<(usize, RayHit)> {
    let mut best: Option<(usize, RayHit)> = None;
    for (idx, obstacle) in obstacles.iter().enumerate() {
        if let Some(hit) = obstacle.intersect_ray(origin, dir, max_range) {
            if best.map_or(true, |(_, b)| hit.distance < b.distance) {
                best = Some((idx, hit));
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Scene index
// ---------------------------------------------------------------------------

/// What the core needs from the rendering layer's scene graph: obstacle
/// proxies for the ranging sensors plus the fixed positioning
/// infrastructure. Populated by the host and injected at construction.
pub trait SceneIndex {
    fn obstacles(&self) -> &[Obstacle];
    /// Ceiling fiducial markers used by visual positioning.
    fn markers(&self) -> &[Vector3<f64>];
    /// UWB anchor mounts. Present as scene furniture; the multilateration
    /// itself is simulated from the true pose.
    fn anchors(&self) -> &[Vector3<f64>];
}

/// Fixed scene contents, the reference `SceneIndex` implementation.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    pub obstacles: Vec<Obstacle>,
    pub markers: Vec<Vector3<f64>>,
    pub anchors: Vec<Vector3<f64>>,
}

impl SceneIndex for StaticScene {
    fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }
    fn markers(&self) -> &[Vector3<f64>] {
        &self.markers
    }
    fn anchors(&self) -> &[Vector3<f64>] {
        &self.anchors
    }
}

impl StaticScene {
    /// An empty scene: no obstacles, no positioning infrastructure.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The 90 m x 90 m barn: enclosure shell, feed/water lines, a 5x5
    /// ceiling marker grid at 20 m spacing and six wall-mounted UWB
    /// anchors.
    pub fn barn() -> Self {
        let mut obstacles = vec![
            Obstacle::new(
                "floor",
                Vector3::new(-46.0, -0.5, -46.0),
                Vector3::new(46.0, 0.0, 46.0),
            ),
            Obstacle::new(
                "ceiling",
                Vector3::new(-46.0, 10.0, -46.0),
                Vector3::new(46.0, 10.5, 46.0),
            ),
        ];
        for (label, min, max) in [
            ("wall_north", Vector3::new(-46.0, 0.0, -46.0), Vector3::new(46.0, 10.0, -45.0)),
            ("wall_south", Vector3::new(-46.0, 0.0, 45.0), Vector3::new(46.0, 10.0, 46.0)),
            ("wall_west", Vector3::new(-46.0, 0.0, -46.0), Vector3::new(-45.0, 10.0, 46.0)),
            ("wall_east", Vector3::new(45.0, 0.0, -46.0), Vector3::new(46.0, 10.0, 46.0)),
        ] {
            obstacles.push(Obstacle::new(label, min, max));
        }
        // Feed lines run the length of the barn at chicken height.
        for (i, z) in [-30.0, -15.0, 0.0, 15.0, 30.0].into_iter().enumerate() {
            obstacles.push(Obstacle::centered(
                format!("feed_line_{}", i),
                Vector3::new(0.0, 0.4, z),
                Vector3::new(80.0, 0.8, 0.6),
            ));
        }

        let mut markers = Vec::with_capacity(25);
        for i in 0..5 {
            for j in 0..5 {
                markers.push(Vector3::new(
                    (i as f64 - 2.0) * 20.0,
                    9.9,
                    (j as f64 - 2.0) * 20.0,
                ));
            }
        }

        let anchors = vec![
            Vector3::new(-45.0, 9.0, -45.0),
            Vector3::new(45.0, 9.0, -45.0),
            Vector3::new(45.0, 9.0, 45.0),
            Vector3::new(-45.0, 9.0, 45.0),
            Vector3::new(0.0, 9.0, -45.0),
            Vector3::new(0.0, 9.0, 45.0),
        ];

        Self { obstacles, markers, anchors }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
