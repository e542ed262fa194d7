/// WGSL to SPIR-V compilation
///
/// Parsing, validation and SPIR-V emission all go through naga. Debug
/// names are kept in the output: reflection resolves constants, textures
/// and samplers by the names they carry in the source.

use crate::error::{Error, Result};
use crate::graphics_device::ShaderStage;

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Pixel => naga::ShaderStage::Fragment,
    }
}

/// Compile one stage source; `label` names the source in diagnostics
///
/// The stage entry point must be the stage's conventional name
/// (`vs_main` / `ps_main`). The error text is the full compiler
/// diagnostic, suitable for an error log file.
pub fn compile_wgsl(source: &str, stage: ShaderStage, label: &str) -> Result<Vec<u32>> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        Error::ShaderCompilation(format!("{}: WGSL parse error\n{}", label, e.emit_to_string(source)))
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator.validate(&module).map_err(|e| {
        Error::ShaderCompilation(format!("{}: validation error\n{}", label, e.emit_to_string(source)))
    })?;

    let entry_point = stage.entry_point();
    let shader_stage = naga_stage(stage);
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == shader_stage)
    {
        return Err(Error::ShaderCompilation(format!(
            "{}: entry point '{}' not found for stage {:?}",
            label, entry_point, stage
        )));
    }

    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        flags: naga::back::spv::WriterFlags::DEBUG,
        capabilities: None,
        bounds_check_policies: naga::proc::BoundsCheckPolicies::default(),
        binding_map: Default::default(),
        debug_info: None,
        zero_initialize_workgroup_memory:
            naga::back::spv::ZeroInitializeWorkgroupMemoryMode::None,
    };

    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage,
        entry_point: entry_point.to_string(),
    };

    naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options)).map_err(|e| {
        Error::ShaderCompilation(format!("{}: SPIR-V generation error: {e}", label))
    })
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
