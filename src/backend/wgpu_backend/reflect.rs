//! WGSL reflection used to emulate named uniforms
//!
//! Programs follow one binding convention: `@group(0) @binding(0)` is a uniform
//! struct, `@binding(1)` the sampled texture and `@binding(2)` its sampler.

use crate::backend::traits::{BackendError, BackendResult};
use crate::backend::types::UniformKind;

/// Dimension of the texture a program samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampledDimension {
    D2,
    Cube,
}

/// Member of the uniform block
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformField {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ShaderReflection {
    pub uniform_block_size: u32,
    pub fields: Vec<UniformField>,
    pub sampled_dimension: Option<SampledDimension>,
}

impl ShaderReflection {
    /// Parse and validate one WGSL stage
    pub fn from_wgsl(label: &str, source: &str) -> BackendResult<Self> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            BackendError::ShaderCreationFailed(format!("{}: {}", label, e.emit_to_string(source)))
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| {
            BackendError::ShaderCreationFailed(format!("{}: {}", label, e.emit_to_string(source)))
        })?;

        let mut reflection = ShaderReflection::default();

        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            if binding.group != 0 {
                continue;
            }

            match (binding.binding, &module.types[global.ty].inner) {
                (0, naga::TypeInner::Struct { members, span })
                    if global.space == naga::AddressSpace::Uniform =>
                {
                    reflection.uniform_block_size = *span;
                    for member in members {
                        let Some(name) = &member.name else { continue };
                        let kind = match module.types[member.ty].inner {
                            naga::TypeInner::Scalar(scalar)
                                if scalar.kind == naga::ScalarKind::Sint && scalar.width == 4 =>
                            {
                                UniformKind::Int
                            }
                            naga::TypeInner::Matrix {
                                columns: naga::VectorSize::Quad,
                                rows: naga::VectorSize::Quad,
                                scalar,
                            } if scalar == naga::Scalar::F32 => UniformKind::Mat4,
                            _ => {
                                log::debug!(
                                    "{}: uniform member '{}' has no setter, skipped",
                                    label,
                                    name
                                );
                                continue;
                            }
                        };
                        reflection.fields.push(UniformField {
                            name: name.clone(),
                            offset: member.offset,
                            kind,
                        });
                    }
                }
                (1, naga::TypeInner::Image { dim, .. }) => {
                    reflection.sampled_dimension = Some(match dim {
                        naga::ImageDimension::Cube => SampledDimension::Cube,
                        naga::ImageDimension::D2 => SampledDimension::D2,
                        other => {
                            return Err(BackendError::ShaderCreationFailed(format!(
                                "{}: unsupported texture dimension {:?}",
                                label, other
                            )))
                        }
                    });
                }
                _ => {}
            }
        }

        Ok(reflection)
    }

    /// Combine the vertex and fragment stage views of the same program
    pub fn merge(mut self, other: ShaderReflection) -> BackendResult<Self> {
        self.uniform_block_size = self.uniform_block_size.max(other.uniform_block_size);

        for field in other.fields {
            match self.fields.iter().find(|f| f.name == field.name) {
                Some(existing) if *existing != field => {
                    return Err(BackendError::ShaderCreationFailed(format!(
                        "uniform '{}' is declared differently in the vertex and fragment stages",
                        field.name
                    )));
                }
                Some(_) => {}
                None => self.fields.push(field),
            }
        }

        self.sampled_dimension = match (self.sampled_dimension, other.sampled_dimension) {
            (Some(a), Some(b)) if a != b => {
                return Err(BackendError::ShaderCreationFailed(
                    "vertex and fragment stages sample different texture dimensions".into(),
                ))
            }
            (a, b) => a.or(b),
        };

        Ok(self)
    }

    /// Uniform buffer size rounded up to the 16-byte uniform alignment
    pub fn buffer_size(&self) -> u64 {
        (self.uniform_block_size as u64).div_ceil(16) * 16
    }
}
