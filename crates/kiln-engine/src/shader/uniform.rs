use std::fmt;
use std::ops::Range;

use glam::{Mat4, Vec3};

/// Semantic uniform names.
///
/// Call sites use these instead of GPU-side field names; each shader variant
/// maps the keys it exposes to a location in its uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKey {
    CameraToClip,
    WorldToCamera,
    /// Added to every per-vertex transform index before the table lookup.
    TransformTableOffset,
    AmbientLightColor,
    AmbientLightStrength,
    DiffuseLightPosition,
}

impl UniformKey {
    pub const ALL: [UniformKey; 6] = [
        UniformKey::CameraToClip,
        UniformKey::WorldToCamera,
        UniformKey::TransformTableOffset,
        UniformKey::AmbientLightColor,
        UniformKey::AmbientLightStrength,
        UniformKey::DiffuseLightPosition,
    ];

    /// Value type every variant stores for this key.
    pub const fn kind(self) -> UniformKind {
        match self {
            UniformKey::CameraToClip | UniformKey::WorldToCamera => UniformKind::Mat4,
            UniformKey::TransformTableOffset => UniformKind::Int,
            UniformKey::AmbientLightColor | UniformKey::DiffuseLightPosition => UniformKind::Vec3,
            UniformKey::AmbientLightStrength => UniformKind::Float,
        }
    }

    /// Field name inside the WGSL `Globals` struct. Diagnostics only.
    pub const fn shader_name(self) -> &'static str {
        match self {
            UniformKey::CameraToClip => "camera_to_clip",
            UniformKey::WorldToCamera => "world_to_camera",
            UniformKey::TransformTableOffset => "transform_table_offset",
            UniformKey::AmbientLightColor => "ambient_light_color",
            UniformKey::AmbientLightStrength => "ambient_light_strength",
            UniformKey::DiffuseLightPosition => "diffuse_light_position",
        }
    }
}

impl fmt::Display for UniformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shader_name())
    }
}

/// Closed set of uniform value types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Mat4,
    Vec3,
    Float,
    Int,
}

impl UniformKind {
    /// Encoded size in bytes.
    pub const fn size(self) -> usize {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Vec3 => 12,
            UniformKind::Float | UniformKind::Int => 4,
        }
    }
}

/// A value uploaded through `ShaderCache::set_uniform`.
///
/// Encoding (native endian, as consumed by the GPU):
/// - `Mat4`: 16 × f32, column-major
/// - `Vec3`: 3 × f32
/// - `Float`: f32
/// - `Int`: i32
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Int(i32),
}

impl UniformValue {
    pub const fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
        }
    }

    /// Writes the encoded value into `out`, which must be exactly
    /// `self.kind().size()` bytes long.
    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.kind().size());
        match self {
            UniformValue::Mat4(m) => {
                out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
            }
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Float(x) => out.copy_from_slice(bytemuck::bytes_of(x)),
            UniformValue::Int(x) => out.copy_from_slice(bytemuck::bytes_of(x)),
        }
    }

    /// Decodes a value previously written by [`write_to`](Self::write_to).
    ///
    /// Returns `None` when `bytes` is not exactly `kind.size()` long.
    pub fn read_from(kind: UniformKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != kind.size() {
            return None;
        }
        let value = match kind {
            UniformKind::Mat4 => {
                let cols: [f32; 16] = bytemuck::pod_read_unaligned(bytes);
                UniformValue::Mat4(Mat4::from_cols_array(&cols))
            }
            UniformKind::Vec3 => {
                let v: [f32; 3] = bytemuck::pod_read_unaligned(bytes);
                UniformValue::Vec3(Vec3::from_array(v))
            }
            UniformKind::Float => UniformValue::Float(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Int => UniformValue::Int(bytemuck::pod_read_unaligned(bytes)),
        };
        Some(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<f32> for UniformValue {
    fn from(x: f32) -> Self {
        UniformValue::Float(x)
    }
}

impl From<i32> for UniformValue {
    fn from(x: i32) -> Self {
        UniformValue::Int(x)
    }
}

/// Resolved location of a uniform: its byte offset inside the program's
/// uniform block, plus the stored type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

impl UniformLocation {
    /// Byte range covered inside the uniform block.
    #[inline]
    pub fn byte_range(self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.kind.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: UniformValue) -> UniformValue {
        let mut buf = vec![0u8; value.kind().size()];
        value.write_to(&mut buf);
        UniformValue::read_from(value.kind(), &buf).unwrap()
    }

    #[test]
    fn mat4_is_encoded_column_major() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]);
        let mut buf = [0u8; 64];
        UniformValue::Mat4(m).write_to(&mut buf);
        let floats: &[f32] = bytemuck::cast_slice(&buf);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[4], 5.0);
        assert_eq!(floats[15], 16.0);
    }

    #[test]
    fn every_kind_survives_encoding() {
        let values = [
            UniformValue::Mat4(Mat4::from_translation(Vec3::new(1.0, -2.0, 3.5))),
            UniformValue::Vec3(Vec3::new(0.25, 0.5, 0.75)),
            UniformValue::Float(-1.5),
            UniformValue::Int(-7),
        ];
        for v in values {
            assert_eq!(roundtrip(v), v);
        }
    }

    #[test]
    fn read_from_rejects_wrong_length() {
        assert!(UniformValue::read_from(UniformKind::Vec3, &[0u8; 16]).is_none());
    }

    #[test]
    fn key_kinds_match_shader_types() {
        assert_eq!(UniformKey::CameraToClip.kind(), UniformKind::Mat4);
        assert_eq!(UniformKey::TransformTableOffset.kind(), UniformKind::Int);
        assert_eq!(UniformKey::AmbientLightStrength.kind(), UniformKind::Float);
        assert_eq!(UniformKey::DiffuseLightPosition.kind(), UniformKind::Vec3);
    }

    #[test]
    fn location_byte_range_spans_encoded_size() {
        let loc = UniformLocation { offset: 144, kind: UniformKind::Vec3 };
        assert_eq!(loc.byte_range(), 144..156);
    }
}
