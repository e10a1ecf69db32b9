use crate::error::{ParallaxError, Result};

/// Parses and validates WGSL, checking that the named entry points exist.
///
/// Errors carry the compiler diagnostic rendered against `source`.
pub fn validate_wgsl(source: &str, entry_points: &[&str]) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ParallaxError::ShaderCompile {
        diagnostic: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| ParallaxError::ShaderCompile {
            diagnostic: e.emit_to_string(source),
        })?;

    for name in entry_points {
        if !module.entry_points.iter().any(|ep| ep.name == *name) {
            return Err(ParallaxError::ShaderCompile {
                diagnostic: format!("missing entry point '{name}'"),
            });
        }
    }

    Ok(module)
}
