/// Uniform block shared by every pass.
const UNIFORMS: &str = r#"
struct SimUniforms {
    time: f32,
    delta_time: f32,
    influence: f32,
    speed: f32,
    scale: f32,
    strength: f32,
    frequency: f32,
    delta_speed: f32,
    life_rate: f32,
    width: f32,
    height: f32,
    _pad: f32,
};

@group(0) @binding(0)
var<uniform> u: SimUniforms;

@group(0) @binding(1)
var base_texture: texture_2d<f32>;
"#;

/// Full-screen triangle; fragment `position.xy` lands on texel centres.
const FULLSCREEN: &str = r#"
@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    return update(vec2<i32>(frag.xy));
}
"#;

/// 3-D simplex noise (Ashima / McEwan formulation).
pub const NOISE: &str = r#"
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

fn noise3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0 / 6.0, 1.0 / 3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);

    var i = floor(v + dot(v, vec3<f32>(C.y)));
    let x0 = v - i + dot(i, vec3<f32>(C.x));

    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);

    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;

    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;
    let j = p - 49.0 * floor(p * ns.z * ns.z);
    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);
    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);

    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);
    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));
    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;

    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);
    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0, p0), dot(p1, p1), dot(p2, p2), dot(p3, p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    var m = max(0.6 - vec4<f32>(dot(x0, x0), dot(x1, x1), dot(x2, x2), dot(x3, x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m * m, vec4<f32>(dot(p0, x0), dot(p1, x1), dot(p2, x2), dot(p3, x3)));
}
"#;

/// Flow-field position update. Expects the variable to depend on itself
/// first, so `dep_0` is the previous tick's state.
pub const FLOW_FIELD: &str = r#"
fn channel(q: vec3<f32>, offset: f32, t: f32) -> f32 {
    let coarse = noise3(q + vec3<f32>(offset + t));
    let fine = noise3(2.0 * q + vec3<f32>(offset + 2.0 * t));
    return coarse + 0.5 * fine;
}

fn update(coord: vec2<i32>) -> vec4<f32> {
    let base = textureLoad(base_texture, coord, 0);
    let previous = textureLoad(dep_0, coord, 0);
    let dt = u.delta_time;

    var seed = previous.w;
    if (u.life_rate > 0.0) {
        seed = seed + dt * u.life_rate;
        if (seed >= 1.0) {
            return vec4<f32>(base.xyz, fract(seed));
        }
    }

    let step_len = u.strength * dt * u.delta_speed;
    if (step_len == 0.0) {
        return vec4<f32>(previous.xyz, seed);
    }

    let q = previous.xyz * u.scale * u.frequency;
    let t = u.time * u.speed;
    let raw = vec3<f32>(channel(q, 0.0, t), channel(q, 31.416, t), channel(q, 72.718, t));
    let len = length(raw);
    var direction = vec3<f32>(0.0);
    if (len > 0.0) {
        direction = raw / len;
    }
    let velocity = mix(raw, direction, u.influence);
    return vec4<f32>(previous.xyz + velocity * step_len, seed);
}
"#;

/// Name of the WGSL binding for the `index`-th declared dependency.
pub fn dependency_binding_name(index: usize) -> String {
    format!("dep_{index}")
}

/// Build a complete pass shader around `body`.
///
/// `body` must define `fn update(coord: vec2<i32>) -> vec4<f32>`. Binding 0
/// is the uniform block, 1 the base texture, `2 + k` dependency `k` in
/// declaration order, readable as `dep_k` through `textureLoad`.
pub fn assemble_pass_shader(dependency_count: usize, body: &str) -> String {
    let mut src = String::with_capacity(UNIFORMS.len() + NOISE.len() + body.len() + 512);
    src.push_str(UNIFORMS);
    for k in 0..dependency_count {
        src.push_str(&format!(
            "\n@group(0) @binding({})\nvar {}: texture_2d<f32>;\n",
            k + 2,
            dependency_binding_name(k)
        ));
    }
    src.push_str(NOISE);
    src.push_str(body);
    src.push_str(FULLSCREEN);
    src
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_one_texture_per_dependency() {
        let src = assemble_pass_shader(3, FLOW_FIELD);
        assert!(src.contains("@binding(2)\nvar dep_0: texture_2d<f32>;"));
        assert!(src.contains("@binding(4)\nvar dep_2: texture_2d<f32>;"));
        assert!(!src.contains("dep_3:"));
    }

    #[test]
    fn includes_entry_points_and_body() {
        let src = assemble_pass_shader(1, FLOW_FIELD);
        assert!(src.contains("fn vs_fullscreen"));
        assert!(src.contains("fn fs_main"));
        assert!(src.contains("fn update(coord: vec2<i32>)"));
        assert!(src.contains("fn noise3"));
    }

    #[test]
    fn uniform_block_matches_host_struct() {
        let fields = UNIFORMS
            .lines()
            .filter(|l| l.trim_end().ends_with(": f32,"))
            .count();
        assert_eq!(fields * 4, std::mem::size_of::<crate::SimUniforms>());
    }
}
