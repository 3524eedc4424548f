use bytemuck::{Pod, Zeroable};
use flowfield_common::{FrameTime, GridSize};
use flowfield_sim::FlowFieldParams;

/// Per-tick uniform block, mirrored by `SimUniforms` in WGSL.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SimUniforms {
    pub time: f32,
    pub delta_time: f32,
    pub influence: f32,
    pub speed: f32,
    pub scale: f32,
    pub strength: f32,
    pub frequency: f32,
    pub delta_speed: f32,
    pub life_rate: f32,
    pub width: f32,
    pub height: f32,
    _pad: f32,
}

impl SimUniforms {
    pub fn new(time: FrameTime, params: &FlowFieldParams, grid: GridSize) -> Self {
        Self {
            time: time.elapsed,
            delta_time: time.delta,
            influence: params.influence,
            speed: params.speed,
            scale: params.scale,
            strength: params.strength,
            frequency: params.frequency,
            delta_speed: params.delta_speed,
            life_rate: params.life_rate,
            width: grid.width as f32,
            height: grid.height as f32,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_three_vec4s() {
        assert_eq!(std::mem::size_of::<SimUniforms>(), 48);
        assert_eq!(std::mem::size_of::<SimUniforms>() % 16, 0);
    }

    #[test]
    fn fields_follow_wgsl_order() {
        let grid = GridSize::new(8, 4).unwrap();
        let time = FrameTime {
            elapsed: 2.0,
            delta: 0.5,
        };
        let u = SimUniforms::new(time, &FlowFieldParams::default(), grid);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&u));
        assert_eq!(floats[0], 2.0);
        assert_eq!(floats[1], 0.5);
        assert_eq!(floats[2], 1.0); // influence
        assert_eq!(floats[5], 0.2); // strength
        assert_eq!(floats[9], 8.0);
        assert_eq!(floats[10], 4.0);
    }
}
