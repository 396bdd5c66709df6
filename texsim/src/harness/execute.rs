use super::device::{GpuDevice, ProgramBindings, ShaderStage, TextureBinding};
use super::program::{CallShape, ProgramCache, ProgramKey};
use crate::error::DeviceError;
use crate::sampling::{SamplerState, TextureCall};
use crate::texture::PerTexelComponents;

/// Calls sharing one shape, with their positions in the caller's list.
struct CallBin<'a> {
    shape: CallShape,
    calls: Vec<(usize, &'a TextureCall)>,
}

/// Groups calls by shape, keeping the order shapes first appear in.
fn bin_calls(calls: &[TextureCall]) -> Vec<CallBin<'_>> {
    let mut bins: Vec<CallBin> = Vec::new();
    for (index, call) in calls.iter().enumerate() {
        let shape = CallShape::of(call);
        match bins.iter_mut().find(|bin| bin.shape == shape) {
            Some(bin) => bin.calls.push((index, call)),
            None => bins.push(CallBin { shape, calls: vec![(index, call)] }),
        }
    }
    bins
}

/// Runs every call on the device in `stage` and returns the results in call order.
pub async fn run_texture_calls<D: GpuDevice>(
    device: &D,
    programs: &ProgramCache<D>,
    texture: &D::Texture,
    binding: TextureBinding,
    sampler: Option<&SamplerState>,
    calls: &[TextureCall],
    stage: ShaderStage,
) -> Result<Vec<PerTexelComponents>, DeviceError> {
    let mut results = vec![PerTexelComponents::new(); calls.len()];
    for bin in bin_calls(calls) {
        let key = ProgramKey::new(bin.shape.clone(), stage, &binding);
        let result_kind = key.result_kind();
        let program = programs.get_or_create(device, key).await?;

        let mut data = Vec::with_capacity(bin.calls.len() * bin.shape.words_per_call());
        for (_, call) in &bin.calls {
            bin.shape.pack(call, &mut data);
        }
        log::trace!("running {} {} calls in {}", bin.calls.len(), bin.shape.builtin, stage);
        let bindings = ProgramBindings { texture, binding, sampler, data: &data, call_count: bin.calls.len() };
        let raw = device.run_program(&program, bindings).await?;
        if raw.len() != bin.calls.len() {
            return Err(DeviceError::ReadbackFailed(format!(
                "expected {} results, got {}",
                bin.calls.len(),
                raw.len()
            )));
        }
        let words: &[u32] = bytemuck::cast_slice(&raw);
        for ((index, _), bits) in bin.calls.iter().zip(words.chunks_exact(4)) {
            results[*index] = result_kind.decode([bits[0], bits[1], bits[2], bits[3]]);
        }
    }
    Ok(results)
}
