//! Flow-field position integrator.
//!
//! Per texel: sample an animated noise field at the particle position, blend
//! the raw vector with its unit direction by `influence`, and advance
//! `p' = p + v * strength * dt * delta_speed`. The fourth channel is the
//! particle's seed and survives every tick unless `life_rate` ages it.

use crate::rule::{PassContext, PassInputs, UpdateRule};
use flowfield_common::{FrameTime, TexelCoord};
use glam::{Vec3, Vec4};
use noise::{NoiseFn, OpenSimplex};
use serde::{Deserialize, Serialize};

/// Tunable flow-field uniforms, mutable between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowFieldParams {
    /// 0 = raw field vector, 1 = unit direction only.
    pub influence: f32,
    /// Time scale of the field animation.
    pub speed: f32,
    /// Spatial scale applied to positions before sampling.
    pub scale: f32,
    /// Advection magnitude.
    pub strength: f32,
    /// Base octave frequency of the field.
    pub frequency: f32,
    /// Extra multiplier on the integration step.
    pub delta_speed: f32,
    /// Seed-channel ageing per second; 0 keeps the seed fixed.
    pub life_rate: f32,
}

impl Default for FlowFieldParams {
    fn default() -> Self {
        Self {
            influence: 1.0,
            speed: 0.1,
            scale: 1.0,
            strength: 0.2,
            frequency: 0.5,
            delta_speed: 0.5,
            life_rate: 0.0,
        }
    }
}

impl FlowFieldParams {
    /// Clamp every parameter into its control-panel range.
    pub fn clamp_to_ranges(&mut self) {
        self.influence = self.influence.clamp(0.0, 2.0);
        self.speed = self.speed.clamp(0.0, 2.0);
        self.scale = self.scale.clamp(0.0, 10.0);
        self.strength = self.strength.clamp(0.0, 1.0);
        self.frequency = self.frequency.clamp(0.0, 2.0);
        self.delta_speed = self.delta_speed.clamp(0.0, 2.0);
        self.life_rate = self.life_rate.clamp(0.0, 10.0);
    }

    pub fn is_finite(&self) -> bool {
        [
            self.influence,
            self.speed,
            self.scale,
            self.strength,
            self.frequency,
            self.delta_speed,
            self.life_rate,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Channel offsets so x, y and z sample decorrelated regions of the field.
const CHANNEL_OFFSETS: [f64; 3] = [0.0, 31.416, 72.718];

/// Weight of the second, double-frequency octave.
const DETAIL_WEIGHT: f64 = 0.5;

/// The position update rule: two-octave 4-D simplex flow field.
#[derive(Clone)]
pub struct FlowFieldRule {
    noise: OpenSimplex,
}

impl std::fmt::Debug for FlowFieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowFieldRule").finish_non_exhaustive()
    }
}

impl Default for FlowFieldRule {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FlowFieldRule {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: OpenSimplex::new(seed),
        }
    }

    /// Raw field vector at `p`, animated by `time * speed`.
    pub fn sample(&self, p: Vec3, time: f32, params: &FlowFieldParams) -> Vec3 {
        let t = f64::from(time * params.speed);
        let q = p.as_dvec3() * f64::from(params.scale) * f64::from(params.frequency);
        let mut out = [0.0f32; 3];
        for (channel, offset) in out.iter_mut().zip(CHANNEL_OFFSETS) {
            let coarse = self.noise.get([q.x + offset, q.y + offset, q.z + offset, t]);
            let fine = self.noise.get([
                2.0 * q.x + offset,
                2.0 * q.y + offset,
                2.0 * q.z + offset,
                2.0 * t,
            ]);
            *channel = (coarse + DETAIL_WEIGHT * fine) as f32;
        }
        Vec3::from_array(out)
    }

    /// Field vector blended toward its unit direction by `influence`.
    ///
    /// A zero-length field sample yields zero rather than NaN.
    pub fn velocity(&self, p: Vec3, time: f32, params: &FlowFieldParams) -> Vec3 {
        let raw = self.sample(p, time, params);
        let direction = raw.normalize_or_zero();
        raw.lerp(direction, params.influence)
    }

    /// Advance one texel. `base` is the particle's seed-time state.
    pub fn integrate(&self, previous: Vec4, base: Vec4, time: FrameTime, params: &FlowFieldParams) -> Vec4 {
        let dt = time.delta;
        let mut seed = previous.w;
        if params.life_rate > 0.0 {
            seed += dt * params.life_rate;
            if seed >= 1.0 {
                return base.truncate().extend(seed.fract());
            }
        }
        let position = previous.truncate();
        let step = params.strength * dt * params.delta_speed;
        if step == 0.0 {
            return position.extend(seed);
        }
        let v = self.velocity(position, time.elapsed, params);
        (position + v * step).extend(seed)
    }
}

impl UpdateRule for FlowFieldRule {
    fn texel(&self, ctx: &PassContext<'_>, coord: TexelCoord, inputs: &PassInputs<'_>) -> Vec4 {
        let base = inputs.base().load(coord);
        let previous = inputs.previous().map_or(base, |tex| tex.load(coord));
        self.integrate(previous, base, ctx.time, ctx.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(elapsed: f32, delta: f32) -> FrameTime {
        FrameTime { elapsed, delta }
    }

    #[test]
    fn defaults_match_control_panel() {
        let p = FlowFieldParams::default();
        assert_eq!(p.influence, 1.0);
        assert_eq!(p.speed, 0.1);
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.strength, 0.2);
        assert_eq!(p.frequency, 0.5);
        assert_eq!(p.delta_speed, 0.5);
        assert_eq!(p.life_rate, 0.0);
    }

    #[test]
    fn clamp_to_ranges_bounds_values() {
        let mut p = FlowFieldParams {
            influence: 5.0,
            strength: -1.0,
            scale: 50.0,
            ..FlowFieldParams::default()
        };
        p.clamp_to_ranges();
        assert_eq!(p.influence, 2.0);
        assert_eq!(p.strength, 0.0);
        assert_eq!(p.scale, 10.0);
    }

    #[test]
    fn zero_delta_is_identity() {
        let rule = FlowFieldRule::new(3);
        let params = FlowFieldParams::default();
        let prev = Vec4::new(0.3, -1.2, 2.5, 0.42);
        assert_eq!(rule.integrate(prev, prev, frame(4.0, 0.0), &params), prev);
    }

    #[test]
    fn zero_strength_is_identity() {
        let rule = FlowFieldRule::new(3);
        let params = FlowFieldParams {
            strength: 0.0,
            ..FlowFieldParams::default()
        };
        let prev = Vec4::new(0.3, -1.2, 2.5, 0.42);
        assert_eq!(rule.integrate(prev, prev, frame(4.0, 1.0 / 60.0), &params), prev);
    }

    #[test]
    fn full_influence_moves_at_constant_speed() {
        let rule = FlowFieldRule::new(11);
        let params = FlowFieldParams {
            influence: 1.0,
            strength: 1.0,
            delta_speed: 1.0,
            ..FlowFieldParams::default()
        };
        let dt = 0.01;
        for p in [Vec3::new(0.1, 0.2, 0.3), Vec3::new(-2.0, 1.5, 0.7)] {
            let raw = rule.sample(p, 1.0, &params);
            if raw.length() < 1e-4 {
                continue;
            }
            let next = rule.integrate(p.extend(0.5), p.extend(0.5), frame(1.0, dt), &params);
            let moved = (next.truncate() - p).length();
            assert!((moved - dt).abs() < 1e-5, "moved {moved}");
        }
    }

    #[test]
    fn zero_influence_uses_raw_vector() {
        let rule = FlowFieldRule::new(5);
        let params = FlowFieldParams {
            influence: 0.0,
            ..FlowFieldParams::default()
        };
        let p = Vec3::new(0.4, 0.1, -0.6);
        assert_eq!(rule.velocity(p, 2.0, &params), rule.sample(p, 2.0, &params));
    }

    #[test]
    fn seed_channel_persists_without_life_rate() {
        let rule = FlowFieldRule::new(1);
        let params = FlowFieldParams::default();
        let mut state = Vec4::new(1.0, 0.0, 0.0, 0.77);
        for i in 0..50 {
            state = rule.integrate(state, state, frame(i as f32 / 60.0, 1.0 / 60.0), &params);
        }
        assert_eq!(state.w, 0.77);
    }

    #[test]
    fn life_rate_respawns_at_base() {
        let rule = FlowFieldRule::new(1);
        let params = FlowFieldParams {
            life_rate: 1.0,
            ..FlowFieldParams::default()
        };
        let base = Vec4::new(1.0, 2.0, 3.0, 0.0);
        let prev = Vec4::new(9.0, 9.0, 9.0, 0.95);
        let next = rule.integrate(prev, base, frame(1.0, 0.1), &params);
        assert_eq!(next.truncate(), base.truncate());
        assert!((next.w - 0.05).abs() < 1e-5);
    }

    #[test]
    fn field_is_smooth() {
        let rule = FlowFieldRule::new(9);
        let params = FlowFieldParams::default();
        let p = Vec3::new(0.5, 0.5, 0.5);
        let a = rule.sample(p, 1.0, &params);
        let b = rule.sample(p + Vec3::splat(1e-3), 1.0, &params);
        assert!((a - b).length() < 1e-2);
    }
}
