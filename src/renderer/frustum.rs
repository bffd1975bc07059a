//! View-frustum extraction and sphere tests
//!
//! Planes are stored as (normal, offset) with `dot(normal, p) - offset >= 0`
//! meaning inside; all six normals point into the frustum. The planes are
//! built geometrically from the eight frustum corners rather than from the
//! view-projection matrix rows, so the extraction is a pure function of the
//! camera parameters.

use crate::camera::Camera;
use cgmath::{Deg, EuclideanSpace, InnerSpace, Point3, Vector3};

/// One frustum plane, normal pointing inward
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub offset: f32,
}

impl Plane {
    /// Plane through three points, orientation unspecified
    fn from_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        let normal = (b - a).cross(c - a).normalize();
        Self {
            normal,
            offset: normal.dot(a.to_vec()),
        }
    }

    /// Signed distance of a point; non-negative means inside
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(point.to_vec()) - self.offset
    }

    fn oriented_toward(mut self, interior: Point3<f32>) -> Self {
        if self.signed_distance(interior) < 0.0 {
            self.normal = -self.normal;
            self.offset = -self.offset;
        }
        self
    }
}

/// Six view-frustum planes: near, far, right, left, top, bottom
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Build the frustum from raw camera parameters
    pub fn new(
        position: Point3<f32>,
        forward: Vector3<f32>,
        up_hint: Vector3<f32>,
        fovy: Deg<f32>,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        debug_assert!(znear > 0.0 && zfar > znear, "degenerate near/far planes");

        let f = forward.normalize();
        let r = f.cross(up_hint).normalize();
        let u = r.cross(f);

        let tan_half = (cgmath::Rad::from(fovy).0 * 0.5).tan();
        let hn = tan_half * znear;
        let wn = hn * aspect;
        let hf = tan_half * zfar;
        let wf = hf * aspect;

        let nc = position + f * znear;
        let fc = position + f * zfar;

        let ntl = nc + u * hn - r * wn;
        let ntr = nc + u * hn + r * wn;
        let nbl = nc - u * hn - r * wn;
        let nbr = nc - u * hn + r * wn;
        let ftl = fc + u * hf - r * wf;
        let ftr = fc + u * hf + r * wf;
        let fbl = fc - u * hf - r * wf;
        let fbr = fc - u * hf + r * wf;

        let corners = [ntl, ntr, nbl, nbr, ftl, ftr, fbl, fbr];
        let centroid = Point3::from_vec(
            corners
                .iter()
                .fold(Vector3::new(0.0, 0.0, 0.0), |acc, c| acc + c.to_vec())
                / corners.len() as f32,
        );

        let planes = [
            Plane::from_points(ntl, ntr, nbr), // near
            Plane::from_points(ftl, ftr, fbr), // far
            Plane::from_points(ntr, nbr, fbr), // right
            Plane::from_points(ntl, nbl, fbl), // left
            Plane::from_points(ntl, ntr, ftr), // top
            Plane::from_points(nbl, nbr, fbr), // bottom
        ]
        .map(|p| p.oriented_toward(centroid));

        Self { planes }
    }

    pub fn from_camera(camera: &Camera) -> Self {
        Self::new(
            camera.position,
            camera.forward(),
            Vector3::unit_y(),
            camera.fovy(),
            camera.aspect(),
            camera.znear(),
            camera.zfar(),
        )
    }

    /// Sphere-vs-frustum test: visible unless fully outside some plane
    pub fn sphere_visible(&self, center: Point3<f32>, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    /// Planes packed for the culling shader: xyz = normal, w = offset
    pub fn to_gpu(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| [p.normal.x, p.normal.y, p.normal.z, p.offset])
    }
}
