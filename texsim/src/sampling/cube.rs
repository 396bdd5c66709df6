//! Cube-map face selection and edge wrapping.

use crate::math::Vec3;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// Layer order of the faces in a cube view.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> CubeFace {
        CubeFace::ALL[index as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "+x",
            CubeFace::NegativeX => "-x",
            CubeFace::PositiveY => "+y",
            CubeFace::NegativeY => "-y",
            CubeFace::PositiveZ => "+z",
            CubeFace::NegativeZ => "-z",
        }
    }

    /// (sc, tc, ma) of `v` in this face's frame. Linear in `v`.
    fn frame(self, v: Vec3) -> (f64, f64, f64) {
        match self {
            CubeFace::PositiveX => (-v.z, -v.y, v.x),
            CubeFace::NegativeX => (v.z, -v.y, v.x),
            CubeFace::PositiveY => (v.x, v.z, v.y),
            CubeFace::NegativeY => (v.x, -v.z, v.y),
            CubeFace::PositiveZ => (v.x, -v.y, v.z),
            CubeFace::NegativeZ => (-v.x, -v.y, v.z),
        }
    }
}

impl fmt::Display for CubeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point on a face, `u` and `v` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCoord {
    pub face: CubeFace,
    pub u: f64,
    pub v: f64,
}

/// Face whose axis has the largest magnitude. Ties prefer x, then y.
pub fn major_axis_face(dir: Vec3) -> CubeFace {
    let a = dir.abs();
    if a.x >= a.y && a.x >= a.z {
        if dir.x >= 0.0 { CubeFace::PositiveX } else { CubeFace::NegativeX }
    } else if a.y >= a.z {
        if dir.y >= 0.0 { CubeFace::PositiveY } else { CubeFace::NegativeY }
    } else if dir.z >= 0.0 {
        CubeFace::PositiveZ
    } else {
        CubeFace::NegativeZ
    }
}

pub fn direction_to_face(dir: Vec3) -> FaceCoord {
    assert!(dir.length() > 0.0, "zero cube direction");
    let face = major_axis_face(dir);
    let (sc, tc, ma) = face.frame(dir);
    let ma = ma.abs();
    FaceCoord { face, u: (sc / ma + 1.0) * 0.5, v: (tc / ma + 1.0) * 0.5 }
}

pub fn face_to_direction(face: CubeFace, u: f64, v: f64) -> Vec3 {
    let s = 2.0 * u - 1.0;
    let t = 2.0 * v - 1.0;
    match face {
        CubeFace::PositiveX => Vec3::new(1.0, -t, -s),
        CubeFace::NegativeX => Vec3::new(-1.0, -t, s),
        CubeFace::PositiveY => Vec3::new(s, 1.0, t),
        CubeFace::NegativeY => Vec3::new(s, -1.0, -t),
        CubeFace::PositiveZ => Vec3::new(s, -t, 1.0),
        CubeFace::NegativeZ => Vec3::new(-s, -t, -1.0),
    }
}

/// Resolves a texel that may lie one step past a face edge onto the neighbouring face.
///
/// Returns `None` when the texel is off the face on both axes: a cube corner has three
/// neighbours and GPUs do not agree on how to blend them.
pub fn wrap_cube_texel(face: CubeFace, x: i64, y: i64, size: u32) -> Option<(CubeFace, u32, u32)> {
    let n = size as i64;
    let outside_x = x < 0 || x >= n;
    let outside_y = y < 0 || y >= n;
    match (outside_x, outside_y) {
        (false, false) => Some((face, x as u32, y as u32)),
        (true, true) => None,
        _ => {
            let u = (x as f64 + 0.5) / size as f64;
            let v = (y as f64 + 0.5) / size as f64;
            let wrapped = direction_to_face(face_to_direction(face, u, v));
            let texel = |c: f64| ((c * size as f64).floor() as i64).clamp(0, n - 1) as u32;
            Some((wrapped.face, texel(wrapped.u), texel(wrapped.v)))
        }
    }
}

/// Derivative of the face `(u, v)` of `dir` along the direction derivative `d`.
pub fn project_cube_gradient(dir: Vec3, d: Vec3) -> [f64; 2] {
    let face = major_axis_face(dir);
    let (sc, tc, ma) = face.frame(dir);
    let (dsc, dtc, dma) = face.frame(d);
    let abs_ma = ma.abs();
    let d_abs_ma = dma * ma.signum();
    let project = |c: f64, dc: f64| 0.5 * (dc * abs_ma - c * d_abs_ma) / (abs_ma * abs_ma);
    [project(sc, dsc), project(tc, dtc)]
}
