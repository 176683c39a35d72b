//! Named-parameter effects on top of WGSL.
//!
//! An effect is WGSL source whose module-scope resources are looked up by name
//! and whose techniques are declared with a comment directive:
//!
//! ```text
//! // technique draw: vs_default ps_alpha_mask
//! ```
//!
//! A technique pairs a `@vertex` entry point with a `@fragment` one.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{MatteError, MatteResult};

/// Where a named parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamBinding {
    pub group: u32,
    pub binding: u32,
}

/// Entry points of one technique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    pub vertex: String,
    pub fragment: String,
}

#[derive(Debug, Clone)]
pub struct EffectSource {
    label: String,
    code: String,
    params: HashMap<String, ParamBinding>,
    techniques: HashMap<String, Technique>,
}

impl EffectSource {
    /// Reflect parameters and techniques from `code`.
    ///
    /// Declared techniques whose entry points are missing are left out, so
    /// looking them up fails like any other unknown technique.
    pub fn parse(label: &str, code: &str) -> MatteResult<Self> {
        let param_re = compile_pattern(
            r"@group\(\s*(\d+)\s*\)\s*@binding\(\s*(\d+)\s*\)\s*var(?:<[^>]*>)?\s+(\w+)\s*:",
        )?;
        let entry_re = compile_pattern(r"@(vertex|fragment)\s+fn\s+(\w+)")?;
        let technique_re = compile_pattern(r"(?m)^\s*//\s*technique\s+(\w+)\s*:\s*(\w+)\s+(\w+)")?;

        let mut params = HashMap::new();
        for cap in param_re.captures_iter(code) {
            let group = parse_index(&cap[1])?;
            let binding = parse_index(&cap[2])?;
            params.insert(cap[3].to_string(), ParamBinding { group, binding });
        }

        let mut vertex_entries = Vec::new();
        let mut fragment_entries = Vec::new();
        for cap in entry_re.captures_iter(code) {
            match &cap[1] {
                "vertex" => vertex_entries.push(cap[2].to_string()),
                _ => fragment_entries.push(cap[2].to_string()),
            }
        }

        let mut techniques = HashMap::new();
        for cap in technique_re.captures_iter(code) {
            let (name, vertex, fragment) = (&cap[1], &cap[2], &cap[3]);
            if !vertex_entries.iter().any(|e| e == vertex)
                || !fragment_entries.iter().any(|e| e == fragment)
            {
                log::warn!(
                    "[EFFECT] {}: technique '{}' names missing entry points {} / {}",
                    label,
                    name,
                    vertex,
                    fragment
                );
                continue;
            }
            techniques.insert(
                name.to_string(),
                Technique {
                    vertex: vertex.to_string(),
                    fragment: fragment.to_string(),
                },
            );
        }

        log::debug!(
            "[EFFECT] {}: {} parameters, {} techniques",
            label,
            params.len(),
            techniques.len()
        );

        Ok(Self {
            label: label.to_string(),
            code: code.to_string(),
            params,
            techniques,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn param(&self, name: &str) -> MatteResult<ParamBinding> {
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| MatteError::MissingParameter {
                name: name.to_string(),
            })
    }

    pub fn technique(&self, name: &str) -> MatteResult<&Technique> {
        self.techniques
            .get(name)
            .ok_or_else(|| MatteError::MissingTechnique {
                name: name.to_string(),
            })
    }

    /// Compile the source, reporting every compiler error message.
    pub fn compile(&self, device: &wgpu::Device) -> MatteResult<wgpu::ShaderModule> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(self.code.as_str().into()),
        });
        let scope_error = pollster::block_on(device.pop_error_scope());

        let info = pollster::block_on(module.get_compilation_info());
        let messages: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| match &m.location {
                Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
                None => m.message.clone(),
            })
            .collect();

        if !messages.is_empty() {
            return Err(MatteError::ShaderCompilation(format!(
                "{}: {}",
                self.label,
                messages.join("; ")
            )));
        }
        if let Some(err) = scope_error {
            return Err(MatteError::ShaderCompilation(format!("{}: {}", self.label, err)));
        }

        log::debug!("[EFFECT] Compiled {}", self.label);
        Ok(module)
    }
}

fn compile_pattern(pattern: &str) -> MatteResult<Regex> {
    Regex::new(pattern).map_err(|e| MatteError::Other(format!("Invalid reflection pattern: {}", e)))
}

fn parse_index(digits: &str) -> MatteResult<u32> {
    digits
        .parse()
        .map_err(|_| MatteError::ShaderCompilation(format!("Binding index out of range: {}", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
// technique draw: vs_main fs_main
// technique broken: vs_main fs_missing

@group(0) @binding(0) var<uniform> globals: vec4<f32>;
@group(0) @binding(1) var color_image: texture_2d<f32>;
@group(1) @binding(3) var linear_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return globals;
}
"#;

    #[test]
    fn test_params_resolve_to_group_and_binding() {
        let effect = EffectSource::parse("sample", SAMPLE).unwrap();
        assert_eq!(
            effect.param("globals").unwrap(),
            ParamBinding { group: 0, binding: 0 }
        );
        assert_eq!(
            effect.param("color_image").unwrap(),
            ParamBinding { group: 0, binding: 1 }
        );
        assert_eq!(
            effect.param("linear_sampler").unwrap(),
            ParamBinding { group: 1, binding: 3 }
        );
    }

    #[test]
    fn test_missing_param_is_error() {
        let effect = EffectSource::parse("sample", SAMPLE).unwrap();
        let err = effect.param("mask_image").unwrap_err();
        assert!(matches!(err, MatteError::MissingParameter { ref name } if name == "mask_image"));
    }

    #[test]
    fn test_technique_entry_points() {
        let effect = EffectSource::parse("sample", SAMPLE).unwrap();
        let draw = effect.technique("draw").unwrap();
        assert_eq!(draw.vertex, "vs_main");
        assert_eq!(draw.fragment, "fs_main");
    }

    #[test]
    fn test_technique_with_missing_entry_point_is_unknown() {
        let effect = EffectSource::parse("sample", SAMPLE).unwrap();
        assert!(matches!(
            effect.technique("broken"),
            Err(MatteError::MissingTechnique { .. })
        ));
        assert!(matches!(
            effect.technique("Draw"),
            Err(MatteError::MissingTechnique { .. })
        ));
    }

    #[test]
    fn test_label_and_code_are_kept() {
        let effect = EffectSource::parse("sample", SAMPLE).unwrap();
        assert_eq!(effect.label(), "sample");
        assert_eq!(effect.code(), SAMPLE);
    }
}
