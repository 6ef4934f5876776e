//! Camera ray generation.

use ember_math::{sampling, Mat3, Mat4, Ray, Vec2, Vec3};

/// Projection model used to turn raster coordinates into rays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Pinhole,
    ThinLens,
}

/// Perspective camera.
///
/// The raster convention is top-origin: pixel row 0 maps to the top of the
/// image plane.
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mode: CameraMode,
    /// Thin lens parameters.
    pub focus_length: f32,
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, -1.0),
            at: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_3,
            aspect: 1.0,
            near: 0.01,
            far: 100.0,
            mode: CameraMode::Pinhole,
            focus_length: 4.0,
            aperture: 0.1,
        }
    }
}

impl Camera {
    pub fn new(eye: Vec3, at: Vec3, up: Vec3, fov: f32, aspect: f32) -> Self {
        Self {
            eye,
            at,
            up,
            fov,
            aspect,
            ..Default::default()
        }
    }

    pub fn with_fov_deg(mut self, deg: f32) -> Self {
        self.fov = deg.to_radians();
        self
    }

    pub fn with_thin_lens(mut self, focus_length: f32, aperture: f32) -> Self {
        self.mode = CameraMode::ThinLens;
        self.focus_length = focus_length;
        self.aperture = aperture;
        self
    }

    /// Right/up/forward basis of the view frame.
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.at - self.eye).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward);
        (right, up, forward)
    }

    /// Maps screen coordinates `(u, v, 1)` in `[-1, 1]^2` to a camera-space
    /// direction; the image plane sits at unit distance along forward.
    pub fn screen_to_raster(&self) -> Mat3 {
        let vh = (self.fov * 0.5).tan();
        let vw = vh * self.aspect;
        let (right, up, forward) = self.basis();
        Mat3::from_cols(right * vw, up * vh, forward)
    }

    /// Combined projection-view transform used for wireframe overlays.
    pub fn proj_view(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            * Mat4::look_at_rh(self.eye, self.at, self.up)
    }

    /// Generate the primary ray for pixel `(x, y)` according to the camera
    /// mode. `u0` jitters the raster position, `u1` samples the lens.
    pub fn ray(&self, x: u32, y: u32, w: u32, h: u32, u0: Vec2, u1: Vec2) -> Ray {
        match self.mode {
            CameraMode::Pinhole => self.ray_pinhole(x, y, w, h, u0),
            CameraMode::ThinLens => self.ray_thin_lens(x, y, w, h, u0, u1),
        }
    }

    /// Pinhole ray through the jittered pixel center. `u0` is in
    /// `[-0.5, 0.5]^2`.
    pub fn ray_pinhole(&self, x: u32, y: u32, w: u32, h: u32, u0: Vec2) -> Ray {
        let (u, v) = raster_to_screen(x, y, w, h, u0);
        let dir = self.screen_to_raster() * Vec3::new(u, v, 1.0);
        Ray::new(self.eye, dir)
    }

    /// Thin-lens ray: origin jittered over the aperture, direction through
    /// the in-focus point. With a closed aperture this is exactly the
    /// pinhole generator.
    pub fn ray_thin_lens(&self, x: u32, y: u32, w: u32, h: u32, u0: Vec2, u1: Vec2) -> Ray {
        if self.aperture <= 0.0 {
            return self.ray_pinhole(x, y, w, h, u0);
        }

        let (u, v) = raster_to_screen(x, y, w, h, u0);
        let vh = (self.fov * 0.5).tan();
        let vw = vh * self.aspect;
        let (right, up, forward) = self.basis();

        let forward = forward * self.focus_length;
        let right = right * self.focus_length * vw;
        let up = up * self.focus_length * vh;

        let lens = sampling::concentric_disk(u1);
        let focus_offset = (right * lens.x + up * lens.y) * self.aperture * 0.5;

        let dir = forward + right * u + up * v;
        Ray::new(self.eye + focus_offset, dir - focus_offset)
    }
}

/// Jittered raster position to `[-1, 1]^2` screen coordinates, top row
/// mapping to `v = +1`.
fn raster_to_screen(x: u32, y: u32, w: u32, h: u32, u0: Vec2) -> (f32, f32) {
    let u = (x as f32 + 0.5 + u0.x) / w as f32 * 2.0 - 1.0;
    let v = 1.0 - (y as f32 + 0.5 + u0.y) / h as f32 * 2.0;
    (u, v)
}
