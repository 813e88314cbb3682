use std::fmt;

use super::uniform::{UniformKey, UniformLocation};

const CAPACITY_TOKEN: &str = "__TRANSFORM_TABLE_CAPACITY__";

/// A uniform exposed by a variant and where it lives in the uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlot {
    pub key: UniformKey,
    pub offset: u32,
}

impl UniformSlot {
    #[inline]
    pub const fn location(self) -> UniformLocation {
        UniformLocation {
            offset: self.offset,
            kind: self.key.kind(),
        }
    }
}

/// Static description of one shader variant.
#[derive(Debug)]
pub struct VariantInfo {
    pub label: &'static str,
    pub wgsl: &'static str,
    /// Size of the WGSL `Globals` struct (uniform layout rules applied).
    pub uniform_block_size: u64,
    pub uniforms: &'static [UniformSlot],
}

/// Closed set of shader programs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ShaderVariant {
    /// Atlas-textured, transform-table positioned, unlit.
    AtlasTransformTable,
    /// As above plus an ambient term and one positional diffuse light.
    AtlasTransformTableAmbientDiffuse,
}

// Offsets follow WGSL uniform layout: mat4x4 aligns to 16, vec3 aligns to 16
// and is 12 bytes, so a trailing f32 packs into its last lane.
const ATLAS_TRANSFORM_TABLE_UNIFORMS: &[UniformSlot] = &[
    UniformSlot { key: UniformKey::CameraToClip, offset: 0 },
    UniformSlot { key: UniformKey::WorldToCamera, offset: 64 },
    UniformSlot { key: UniformKey::TransformTableOffset, offset: 128 },
];

const AMBIENT_DIFFUSE_UNIFORMS: &[UniformSlot] = &[
    UniformSlot { key: UniformKey::CameraToClip, offset: 0 },
    UniformSlot { key: UniformKey::WorldToCamera, offset: 64 },
    UniformSlot { key: UniformKey::TransformTableOffset, offset: 128 },
    UniformSlot { key: UniformKey::AmbientLightColor, offset: 144 },
    UniformSlot { key: UniformKey::AmbientLightStrength, offset: 156 },
    UniformSlot { key: UniformKey::DiffuseLightPosition, offset: 160 },
];

static ATLAS_TRANSFORM_TABLE: VariantInfo = VariantInfo {
    label: "atlas transform-table",
    wgsl: include_str!("shaders/atlas_transform_table.wgsl"),
    uniform_block_size: 144,
    uniforms: ATLAS_TRANSFORM_TABLE_UNIFORMS,
};

static ATLAS_TRANSFORM_TABLE_AMBIENT_DIFFUSE: VariantInfo = VariantInfo {
    label: "atlas transform-table ambient+diffuse",
    wgsl: include_str!("shaders/atlas_transform_table_ambient_diffuse.wgsl"),
    uniform_block_size: 176,
    uniforms: AMBIENT_DIFFUSE_UNIFORMS,
};

impl ShaderVariant {
    pub const COUNT: usize = 2;

    pub const ALL: [ShaderVariant; Self::COUNT] = [
        ShaderVariant::AtlasTransformTable,
        ShaderVariant::AtlasTransformTableAmbientDiffuse,
    ];

    /// Dense index in `0..COUNT`, used for per-variant lookup tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ShaderVariant::AtlasTransformTable => 0,
            ShaderVariant::AtlasTransformTableAmbientDiffuse => 1,
        }
    }

    pub fn info(self) -> &'static VariantInfo {
        match self {
            ShaderVariant::AtlasTransformTable => &ATLAS_TRANSFORM_TABLE,
            ShaderVariant::AtlasTransformTableAmbientDiffuse => {
                &ATLAS_TRANSFORM_TABLE_AMBIENT_DIFFUSE
            }
        }
    }

    #[inline]
    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Location of `key` in this variant's uniform block, if it has one.
    pub fn uniform_location(self, key: UniformKey) -> Option<UniformLocation> {
        self.info()
            .uniforms
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| slot.location())
    }

    /// Builds the compile inputs for this variant.
    pub fn program_source(self, transform_table_capacity: usize) -> ProgramSource {
        let info = self.info();
        ProgramSource {
            variant: self,
            label: info.label,
            wgsl: info
                .wgsl
                .replace(CAPACITY_TOKEN, &transform_table_capacity.to_string()),
            uniform_block_size: info.uniform_block_size,
        }
    }
}

impl fmt::Display for ShaderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a backend needs to compile and link one variant.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub variant: ShaderVariant,
    pub label: &'static str,
    pub wgsl: String,
    pub uniform_block_size: u64,
}
