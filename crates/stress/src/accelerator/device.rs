// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! wgpu device path: adapter probe, a naive f32 matmul shader and a
//! particle integration shader.

use super::{AcceleratorCapability, AcceleratorConfig, BackendKind};
use crate::StressError;
use std::borrow::Cow;
use wgpu::util::DeviceExt;

const MATMUL_WGSL: &str = r#"
struct Dims { m: u32, k: u32, n: u32, pad: u32 };

@group(0) @binding(0) var<storage, read> lhs: array<f32>;
@group(0) @binding(1) var<storage, read> rhs: array<f32>;
@group(0) @binding(2) var<storage, read_write> out: array<f32>;
@group(0) @binding(3) var<uniform> dims: Dims;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let row = id.y;
    let col = id.x;
    if (row >= dims.m || col >= dims.n) {
        return;
    }
    var acc = 0.0;
    for (var i = 0u; i < dims.k; i = i + 1u) {
        acc = acc + lhs[row * dims.k + i] * rhs[i * dims.n + col];
    }
    out[row * dims.n + col] = acc;
}
"#;

const PARTICLES_WGSL: &str = r#"
struct Params { count: u32, steps: u32, dt: f32, jitter: f32 };

@group(0) @binding(0) var<storage, read_write> pos: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> vel: array<vec4<f32>>;
@group(0) @binding(2) var<uniform> params: Params;

fn hash(x: u32) -> f32 {
    var h = x * 747796405u + 2891336453u;
    h = ((h >> ((h >> 28u) + 4u)) ^ h) * 277803737u;
    h = (h >> 22u) ^ h;
    return f32(h) / 4294967295.0;
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= params.count) {
        return;
    }
    var p = pos[i];
    var v = vel[i];
    for (var s = 0u; s < params.steps; s = s + 1u) {
        let r = hash(i * 4u + s) - 0.5;
        v = v + vec4<f32>(r, -r, 0.5 * r, 0.0) * params.jitter;
        p = p + v * params.dt;
    }
    pos[i] = p;
    vel[i] = v;
}
"#;

/// Probes Metal first, then the primary backends, skipping software adapters.
pub(super) fn probe() -> Option<AcceleratorCapability> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let order = [
        (wgpu::Backends::METAL, BackendKind::UnifiedMemory),
        (wgpu::Backends::PRIMARY, BackendKind::Gpu),
    ];
    for (backends, kind) in order {
        for adapter in instance.enumerate_adapters(backends) {
            let info = adapter.get_info();
            if info.device_type == wgpu::DeviceType::Cpu {
                continue;
            }
            return Some(AcceleratorCapability {
                kind,
                backend: format!("{:?}", info.backend).to_lowercase(),
                adapter: info.name,
            });
        }
    }
    None
}

fn backends_for(kind: BackendKind) -> wgpu::Backends {
    match kind {
        BackendKind::UnifiedMemory => wgpu::Backends::METAL,
        BackendKind::Gpu => wgpu::Backends::PRIMARY,
    }
}

fn f32_bytes(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
    values.into_iter().flat_map(f32::to_le_bytes).collect()
}

fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deterministic pseudo-random fill; the device work does not depend on
/// the values.
fn noise(len: usize, seed: u32) -> impl Iterator<Item = f32> {
    (0..len as u32).map(move |i| {
        let h = i.wrapping_mul(2_654_435_761).wrapping_add(seed);
        (h >> 8) as f32 / (1u32 << 24) as f32 - 0.5
    })
}

struct Kernel {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    workgroups: (u32, u32),
}

/// A device, its queue, and both kernels with resident buffers.
pub(super) struct DeviceContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    matmul: Kernel,
    particles: Kernel,
}

impl DeviceContext {
    pub(super) fn new(
        cap: &AcceleratorCapability,
        config: &AcceleratorConfig,
    ) -> Result<Self, StressError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: backends_for(cap.kind),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| StressError::Accelerator(format!("adapter '{}' disappeared", cap.adapter)))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("chronosbench"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| StressError::Accelerator(e.to_string()))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let matmul = build_matmul(&device, config);
        let particles = build_particles(&device, config);
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(StressError::Accelerator(e.to_string()));
        }

        tracing::debug!(adapter = %cap.adapter, "Accelerator device ready");
        Ok(Self {
            device,
            queue,
            matmul,
            particles,
        })
    }

    pub(super) fn matmul_pass(&self) -> Result<(), StressError> {
        self.dispatch(&self.matmul, "matmul")
    }

    pub(super) fn particle_pass(&self) -> Result<(), StressError> {
        self.dispatch(&self.particles, "particles")
    }

    /// Submits one dispatch and blocks until the device is idle.
    fn dispatch(&self, kernel: &Kernel, label: &str) -> Result<(), StressError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &kernel.bind_group, &[]);
            pass.dispatch_workgroups(kernel.workgroups.0, kernel.workgroups.1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(StressError::Accelerator(format!("{label}: {e}"))),
            None => Ok(()),
        }
    }
}

fn pipeline(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None,
        module: &module,
        entry_point: "main",
    })
}

fn storage(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::STORAGE,
    })
}

fn uniform(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

fn bind(
    device: &wgpu::Device,
    pipeline: &wgpu::ComputePipeline,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .enumerate()
        .map(|(i, b)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: b.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &pipeline.get_bind_group_layout(0),
        entries: &entries,
    })
}

fn build_matmul(device: &wgpu::Device, config: &AcceleratorConfig) -> Kernel {
    let (m, k, n) = (config.matmul_m, config.matmul_k, config.matmul_n);
    let pipeline = pipeline(device, "matmul", MATMUL_WGSL);
    let lhs = storage(device, "lhs", &f32_bytes(noise((m * k) as usize, 1)));
    let rhs = storage(device, "rhs", &f32_bytes(noise((k * n) as usize, 2)));
    let out = storage(device, "out", &vec![0u8; (m * n) as usize * 4]);
    let dims = uniform(device, "dims", &u32_bytes(&[m, k, n, 0]));
    let bind_group = bind(device, &pipeline, &[&lhs, &rhs, &out, &dims]);
    Kernel {
        pipeline,
        bind_group,
        workgroups: (n.div_ceil(8), m.div_ceil(8)),
    }
}

fn build_particles(device: &wgpu::Device, config: &AcceleratorConfig) -> Kernel {
    let count = config.particle_count;
    let pipeline = pipeline(device, "particles", PARTICLES_WGSL);
    let pos = storage(device, "positions", &f32_bytes(noise(count as usize * 4, 3)));
    let vel = storage(device, "velocities", &f32_bytes(noise(count as usize * 4, 4)));
    let mut params = u32_bytes(&[count, config.particle_steps]);
    params.extend(f32_bytes([0.001, 0.01]));
    let params = uniform(device, "params", &params);
    let bind_group = bind(device, &pipeline, &[&pos, &vel, &params]);
    Kernel {
        pipeline,
        bind_group,
        workgroups: (count.div_ceil(256), 1),
    }
}
