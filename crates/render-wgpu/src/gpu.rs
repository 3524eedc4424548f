use crate::shaders;
use crate::uniforms::SimUniforms;
use flowfield_common::{FrameTime, GridError, GridSize};
use flowfield_sim::{
    FlowFieldParams, GraphError, Schedule, SimConfig, StatePool, StateTexture, VariableGraph,
    VariableId, DEFAULT_MAX_DELTA, PARTICLES,
};
use glam::Vec4;
use std::cmp::Ordering;
use wgpu::util::DeviceExt;

const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = 16;

/// Errors from the wgpu backend.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("buffer map failed: {0}")]
    BufferMap(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("initial texture for '{name}' does not match the computation grid")]
    SizeMismatch { name: String },
    #[error("computation has no variables")]
    NoVariables,
}

/// Bytes per row of a readback buffer: whole texels padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Device and queue for off-screen compute.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request a headless adapter and device, blocking on the futures.
    pub fn new_headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("flowfield_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;
        tracing::info!(adapter = %adapter.get_info().name, "gpu device ready");
        Ok(Self { device, queue })
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// One half of a ping-pong pair on the device.
struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, grid: GridSize, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(grid),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self { texture, view }
    }

    fn upload(&self, queue: &wgpu::Queue, source: &StateTexture) {
        let grid = source.grid();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(source.texels()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(grid.width * TEXEL_BYTES),
                rows_per_image: Some(grid.height),
            },
            extent(grid),
        );
    }
}

fn extent(grid: GridSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: grid.width,
        height: grid.height,
        depth_or_array_layers: 1,
    }
}

struct GpuVariable {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    base: RenderTarget,
    pool: StatePool<RenderTarget>,
}

struct PendingVariable {
    initial: StateTexture,
    body: String,
}

/// Declares GPU variables, then compiles them into a [`WgpuComputation`].
pub struct WgpuComputationBuilder {
    grid: GridSize,
    graph: VariableGraph,
    pending: Vec<PendingVariable>,
    params: FlowFieldParams,
    max_delta: f32,
}

impl WgpuComputationBuilder {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            graph: VariableGraph::new(),
            pending: Vec::new(),
            params: FlowFieldParams::default(),
            max_delta: DEFAULT_MAX_DELTA,
        }
    }

    pub fn with_params(mut self, params: FlowFieldParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Declare a variable whose pass runs the WGSL `body`
    /// (see [`shaders::assemble_pass_shader`]).
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        initial: StateTexture,
        body: impl Into<String>,
    ) -> Result<VariableId, GpuError> {
        let name = name.into();
        if initial.grid() != self.grid {
            return Err(GpuError::SizeMismatch { name });
        }
        let id = self.graph.add_variable(name)?;
        self.pending.push(PendingVariable {
            initial,
            body: body.into(),
        });
        Ok(id)
    }

    pub fn set_dependencies(
        &mut self,
        id: VariableId,
        dependencies: &[VariableId],
    ) -> Result<(), GpuError> {
        self.graph.set_dependencies(id, dependencies)?;
        Ok(())
    }

    /// Resolve the schedule, allocate the textures and compile one pipeline per variable.
    pub fn build(self, ctx: &GpuContext) -> Result<WgpuComputation, GpuError> {
        if self.pending.is_empty() {
            return Err(GpuError::NoVariables);
        }
        let max = ctx.max_texture_dimension();
        let side = self.grid.width.max(self.grid.height);
        if side > max {
            return Err(GridError::TooLarge {
                side: u64::from(side),
                max,
            }
            .into());
        }
        let schedule = self.graph.resolve()?;
        let device = &ctx.device;

        let uniforms = SimUniforms::new(FrameTime::default(), &self.params, self.grid);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sim_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let mut variables = Vec::with_capacity(self.pending.len());
        for (id, pending) in self.graph.ids().zip(&self.pending) {
            let name = self.graph.name(id);
            let deps = self.graph.dependencies(id).len();
            let layout = bind_group_layout(device, name, deps);
            let pipeline = pass_pipeline(device, name, &layout, deps, &pending.body);

            let base = RenderTarget::new(device, self.grid, &format!("{name}_base"));
            let ping = RenderTarget::new(device, self.grid, &format!("{name}_ping"));
            let pong = RenderTarget::new(device, self.grid, &format!("{name}_pong"));
            base.upload(&ctx.queue, &pending.initial);
            ping.upload(&ctx.queue, &pending.initial);
            variables.push(GpuVariable {
                pipeline,
                layout,
                base,
                pool: StatePool::new(ping, pong),
            });
        }

        tracing::info!(
            width = self.grid.width,
            height = self.grid.height,
            variables = variables.len(),
            "gpu computation initialised"
        );
        Ok(WgpuComputation {
            grid: self.grid,
            graph: self.graph,
            schedule,
            variables,
            uniform_buffer,
            params: self.params,
            max_delta: self.max_delta,
            ticks: 0,
        })
    }
}

fn bind_group_layout(device: &wgpu::Device, name: &str, dependencies: usize) -> wgpu::BindGroupLayout {
    let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    entries.extend((0..=dependencies as u32).map(|k| texture_entry(k + 1)));
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{name}_layout")),
        entries: &entries,
    })
}

fn pass_pipeline(
    device: &wgpu::Device,
    name: &str,
    layout: &wgpu::BindGroupLayout,
    dependencies: usize,
    body: &str,
) -> wgpu::RenderPipeline {
    let source = shaders::assemble_pass_shader(dependencies, body);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name}_shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: STATE_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

/// GPU-resident variables advanced by one full-screen pass each per tick.
///
/// Same scheduling contract as the CPU `Computation`: dependencies' live
/// textures are bound, the pass renders into the pool's other texture, then
/// the pool flips. All passes of a tick are recorded into one encoder.
pub struct WgpuComputation {
    grid: GridSize,
    graph: VariableGraph,
    schedule: Schedule,
    variables: Vec<GpuVariable>,
    uniform_buffer: wgpu::Buffer,
    params: FlowFieldParams,
    max_delta: f32,
    ticks: u64,
}

impl WgpuComputation {
    pub fn builder(grid: GridSize) -> WgpuComputationBuilder {
        WgpuComputationBuilder::new(grid)
    }

    /// Single self-dependent `particles` variable driven by the flow-field shader.
    pub fn flow_field(
        ctx: &GpuContext,
        initial: StateTexture,
        config: &SimConfig,
    ) -> Result<Self, GpuError> {
        let mut builder = Self::builder(initial.grid())
            .with_params(config.flow)
            .with_max_delta(config.max_delta);
        let particles = builder.add_variable(PARTICLES, initial, shaders::FLOW_FIELD)?;
        builder.set_dependencies(particles, &[particles])?;
        builder.build(ctx)
    }

    pub fn tick(&mut self, ctx: &GpuContext, dt: f32, elapsed: f32) {
        self.compute(ctx, FrameTime::new(elapsed, dt, self.max_delta));
    }

    pub fn compute(&mut self, ctx: &GpuContext, time: FrameTime) {
        let _span = tracing::trace_span!("gpu_compute", tick = self.ticks).entered();
        let uniforms = SimUniforms::new(time, &self.params, self.grid);
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_encoder"),
            });

        for &id in self.schedule.order() {
            let idx = id.index();
            let deps = self.graph.dependencies(id);
            let name = self.graph.name(id);
            let (head, rest) = self.variables.split_at_mut(idx);
            let Some((own, tail)) = rest.split_first_mut() else {
                continue;
            };
            let uniform_buffer = &self.uniform_buffer;
            let base = &own.base;
            let layout = &own.layout;
            let pipeline = &own.pipeline;
            own.pool.write_then_flip(|live, back| {
                let mut entries = vec![
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&base.view),
                    },
                ];
                for (k, dep) in deps.iter().enumerate() {
                    let target = match dep.index().cmp(&idx) {
                        Ordering::Less => head[dep.index()].pool.current(),
                        Ordering::Equal => live,
                        Ordering::Greater => tail[dep.index() - idx - 1].pool.current(),
                    };
                    entries.push(wgpu::BindGroupEntry {
                        binding: k as u32 + 2,
                        resource: wgpu::BindingResource::TextureView(&target.view),
                    });
                }
                let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(name),
                    layout,
                    entries: &entries,
                });

                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(name),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &back.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    ..Default::default()
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            });
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        self.ticks += 1;
    }

    /// View of the live texture of `id`, for binding in a draw pass.
    /// Re-query after every tick; the physical texture alternates.
    pub fn current_view(&self, id: VariableId) -> &wgpu::TextureView {
        &self.variables[id.index()].pool.current().view
    }

    pub fn current_texture(&self, id: VariableId) -> &wgpu::Texture {
        &self.variables[id.index()].pool.current().texture
    }

    /// Copy the live texture of `id` back to host memory. Blocks on the device.
    pub fn read_back(&self, ctx: &GpuContext, id: VariableId) -> Result<StateTexture, GpuError> {
        let grid = self.grid;
        let bytes_per_row = padded_bytes_per_row(grid.width);
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: u64::from(bytes_per_row) * u64::from(grid.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: self.current_texture(id),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(grid.height),
                },
            },
            extent(grid),
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMap(e.to_string()))?
            .map_err(|e| GpuError::BufferMap(e.to_string()))?;

        let texels = {
            let data = slice.get_mapped_range();
            let row_bytes = (grid.width * TEXEL_BYTES) as usize;
            let mut texels = Vec::with_capacity(grid.texel_count());
            for row in data.chunks_exact(bytes_per_row as usize) {
                texels.extend(
                    row[..row_bytes]
                        .chunks_exact(TEXEL_BYTES as usize)
                        .map(|c| Vec4::from_array(bytemuck::pod_read_unaligned(c))),
                );
            }
            texels
        };
        staging.unmap();

        StateTexture::from_texels(grid, texels).map_err(|e| GpuError::BufferMap(e.to_string()))
    }

    pub fn variable(&self, name: &str) -> Option<VariableId> {
        self.graph.find(name)
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn live_index(&self, id: VariableId) -> usize {
        self.variables[id.index()].pool.live_index()
    }

    pub fn params(&self) -> &FlowFieldParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut FlowFieldParams {
        &mut self.params
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
