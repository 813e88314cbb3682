use std::fmt;

use super::uniform::{UniformKey, UniformKind};
use super::variant::ShaderVariant;

/// Shader cache construction and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// A variant failed to compile or link. Fatal: no partial cache is built.
    Compile {
        variant: ShaderVariant,
        message: String,
    },
    /// The variant was not part of the set requested at construction.
    VariantNotRequested(ShaderVariant),
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile { variant, message } => {
                write!(f, "failed to build shader variant `{variant}`: {message}")
            }
            Self::VariantNotRequested(variant) => {
                write!(f, "shader variant `{variant}` was not requested when the cache was built")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Recoverable `set_uniform` failures. The upload is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformError {
    /// The variant's program has no such uniform.
    Missing {
        variant: ShaderVariant,
        key: UniformKey,
    },
    /// The value type does not match the uniform's declared type.
    TypeMismatch {
        variant: ShaderVariant,
        key: UniformKey,
        expected: UniformKind,
        found: UniformKind,
    },
    /// The variant was not part of the set requested at construction.
    VariantNotRequested(ShaderVariant),
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { variant, key } => {
                write!(f, "shader variant `{variant}` has no uniform `{key}`")
            }
            Self::TypeMismatch { variant, key, expected, found } => write!(
                f,
                "uniform `{key}` of `{variant}` expects {expected:?}, got {found:?}"
            ),
            Self::VariantNotRequested(variant) => {
                write!(f, "shader variant `{variant}` was not requested when the cache was built")
            }
        }
    }
}

impl std::error::Error for UniformError {}
