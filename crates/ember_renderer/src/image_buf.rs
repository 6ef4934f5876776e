//! Framebuffers, tone mapping and line rasterization.
//!
//! `ImageF32` is the Monte-Carlo accumulator; `ImageU8` the resolved
//! 8-bit sRGB image (top-origin, 3 channels). Both are row-major.

use ember_math::{IVec2, Mat4, Vec3, Vec4};
use std::path::Path;

const GAMMA: f32 = 2.2;

/// Float RGB accumulation buffer.
#[derive(Debug, Clone)]
pub struct ImageF32 {
    width: u32,
    height: u32,
    data: Vec<Vec3>,
}

impl ImageF32 {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![Vec3::ZERO; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: Vec3) {
        self.data.fill(color);
    }

    /// Read with clamped coordinates.
    pub fn color_at(&self, x: u32, y: u32) -> Vec3 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.data[(y * self.width + x) as usize]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Vec3) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = color;
        }
    }

    /// Monte-Carlo accumulation.
    pub fn increment_pixel(&mut self, x: u32, y: u32, color: Vec3) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] += color;
        }
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [Vec3] {
        &mut self.data
    }
}

/// 8-bit sRGB image.
#[derive(Debug, Clone)]
pub struct ImageU8 {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageU8 {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height * 3) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, color: Vec3) {
        let c = to_bytes(color);
        for px in self.data.chunks_exact_mut(3) {
            px.copy_from_slice(&c);
        }
    }

    /// Read with clamped coordinates, as linear-range floats of the stored
    /// bytes.
    pub fn color_at(&self, x: u32, y: u32) -> Vec3 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let o = ((y * self.width + x) * 3) as usize;
        Vec3::new(
            self.data[o] as f32 / 255.0,
            self.data[o + 1] as f32 / 255.0,
            self.data[o + 2] as f32 / 255.0,
        )
    }

    /// Out-of-range coordinates are silently clipped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Vec3) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let o = ((y as u32 * self.width + x as u32) * 3) as usize;
        self.data[o..o + 3].copy_from_slice(&to_bytes(color));
    }

    /// Rasterize a line: Cohen-Sutherland clip against the image rectangle,
    /// then Bresenham.
    pub fn draw_line(&mut self, v0: IVec2, v1: IVec2, color: Vec3) {
        let Some((a, b)) = clip_line(
            v0,
            v1,
            IVec2::ZERO,
            IVec2::new(self.width as i32 - 1, self.height as i32 - 1),
        ) else {
            return;
        };

        let dx = (b.x - a.x).abs();
        let dy = -(b.y - a.y).abs();
        let sx = if a.x < b.x { 1 } else { -1 };
        let sy = if a.y < b.y { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (a.x, a.y);
        loop {
            self.set_pixel(x, y, color);
            if x == b.x && y == b.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn write_png(&self, path: &Path) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgb8,
        )
    }
}

fn to_bytes(color: Vec3) -> [u8; 3] {
    let c = saturate(color) * 255.0;
    [c.x as u8, c.y as u8, c.z as u8]
}

// Cohen-Sutherland outcodes.
const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

fn outcode(p: IVec2, min: IVec2, max: IVec2) -> u8 {
    let mut code = INSIDE;
    if p.x < min.x {
        code |= LEFT;
    } else if p.x > max.x {
        code |= RIGHT;
    }
    if p.y < min.y {
        code |= BOTTOM;
    } else if p.y > max.y {
        code |= TOP;
    }
    code
}

/// Clip a segment to a rectangle. `None` when fully outside.
fn clip_line(mut a: IVec2, mut b: IVec2, min: IVec2, max: IVec2) -> Option<(IVec2, IVec2)> {
    let mut code_a = outcode(a, min, max);
    let mut code_b = outcode(b, min, max);

    loop {
        if code_a | code_b == 0 {
            return Some((a, b));
        }
        if code_a & code_b != 0 {
            return None;
        }
        let code = if code_a != 0 { code_a } else { code_b };
        let (ax, ay) = (a.x as f32, a.y as f32);
        let (bx, by) = (b.x as f32, b.y as f32);
        let (x, y) = if code & TOP != 0 {
            (ax + (bx - ax) * (max.y as f32 - ay) / (by - ay), max.y as f32)
        } else if code & BOTTOM != 0 {
            (ax + (bx - ax) * (min.y as f32 - ay) / (by - ay), min.y as f32)
        } else if code & RIGHT != 0 {
            (max.x as f32, ay + (by - ay) * (max.x as f32 - ax) / (bx - ax))
        } else {
            (min.x as f32, ay + (by - ay) * (min.x as f32 - ax) / (bx - ax))
        };
        let p = IVec2::new(x.round() as i32, y.round() as i32);
        if code == code_a {
            a = p;
            code_a = outcode(a, min, max);
        } else {
            b = p;
            code_b = outcode(b, min, max);
        }
    }
}

/// Project a world point to integer screen coordinates (top-origin).
/// `None` when the point is behind the projection plane.
pub(crate) fn project_to_screen(p: Vec3, transform: &Mat4, width: u32, height: u32) -> Option<IVec2> {
    let clip = *transform * Vec4::new(p.x, p.y, p.z, 1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip / clip.w;
    Some(IVec2::new(
        ((ndc.x * 0.5 + 0.5) * width as f32).floor() as i32,
        ((0.5 - ndc.y * 0.5) * height as f32).floor() as i32,
    ))
}

/// Reinhard operator `c / (c + 1)`.
pub fn reinhard_tone_mapping(color: Vec3) -> Vec3 {
    color / (color + Vec3::ONE)
}

/// ACES filmic fit.
pub fn aces_tone_mapping(color: Vec3) -> Vec3 {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    saturate((color * (color * A + B)) / (color * (color * C + D) + E))
}

/// Encode linear radiance with `gamma = 2.2`.
pub fn gamma_correction(color: Vec3) -> Vec3 {
    color.powf(1.0 / GAMMA)
}

/// Decode a gamma-encoded color back to linear.
pub fn gamma_transform(color: Vec3) -> Vec3 {
    color.powf(GAMMA)
}

pub fn saturate(color: Vec3) -> Vec3 {
    color.clamp(Vec3::ZERO, Vec3::ONE)
}
