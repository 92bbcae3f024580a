//! Accelerator-resident matrix-vector product.
//!
//! The CSR operator is uploaded once; every Lanczos step then ships only the
//! current Krylov vector to the device, runs a one-thread-per-row SpMV in
//! double precision, and reads the product back through a staging buffer.
//! Requires an adapter exposing `SHADER_F64`; probing for one is cheap and
//! callers are expected to do it before choosing this path.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::lanczos;
use crate::error::{DiffusionMapsError, Result};
use crate::markov::CsrOperator;

const WORKGROUP_SIZE: u32 = 64;

const SPMV_SHADER: &str = r#"
enable f64;

struct Params {
    n: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> row_ptr: array<u32>;
@group(0) @binding(2) var<storage, read> col_idx: array<u32>;
@group(0) @binding(3) var<storage, read> vals: array<f64>;
@group(0) @binding(4) var<storage, read> x: array<f64>;
@group(0) @binding(5) var<storage, read_write> y: array<f64>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let row = gid.x;
    if (row >= params.n) {
        return;
    }
    var sum = f64(0.0);
    let begin = row_ptr[row];
    let end = row_ptr[row + 1u];
    for (var i = begin; i < end; i = i + 1u) {
        sum = sum + vals[i] * x[col_idx[i]];
    }
    y[row] = sum;
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    n: u32,
    _pad: [u32; 3],
}

/// Whether any adapter on this machine supports double-precision shaders.
pub fn accelerator_available() -> bool {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .any(|adapter| adapter.features().contains(wgpu::Features::SHADER_F64))
}

/// A device-resident CSR operator with its compiled SpMV pipeline.
struct GpuSpmv {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    x_buffer: wgpu::Buffer,
    y_buffer: wgpu::Buffer,
    staging: wgpu::Buffer,
    n: usize,
}

/// The shader indexes rows and entries as `u32`; larger operators cannot
/// be uploaded without silent truncation.
fn check_index_width(n: usize, nnz: usize) -> Result<()> {
    if n >= u32::MAX as usize || nnz > u32::MAX as usize {
        return Err(DiffusionMapsError::EigenSolver(format!(
            "operator too large for the accelerated path ({} rows, {} entries)",
            n, nnz
        )));
    }
    Ok(())
}

impl GpuSpmv {
    fn new(csr: &CsrOperator) -> Result<Self> {
        check_index_width(csr.n, csr.nnz())?;
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|adapter| adapter.features().contains(wgpu::Features::SHADER_F64))
            .ok_or(DiffusionMapsError::NoAccelerator)?;
        log::debug!(
            "accelerated solve on adapter {}",
            adapter.get_info().name
        );

        let rt = tokio::runtime::Runtime::new().map_err(|e| {
            DiffusionMapsError::EigenSolver(format!("accelerator runtime: {}", e))
        })?;
        let (device, queue) = rt
            .block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("diffusion-spmv"),
                    required_features: wgpu::Features::SHADER_F64,
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            ))
            .map_err(|e| {
                DiffusionMapsError::EigenSolver(format!("accelerator device: {}", e))
            })?;

        let n = csr.n;
        let row_ptr: Vec<u32> = csr.row_ptr.iter().map(|&p| p as u32).collect();
        let col_idx: Vec<u32> = csr.col_idx.iter().map(|&c| c as u32).collect();

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spmv-params"),
            contents: bytemuck::bytes_of(&Params {
                n: n as u32,
                _pad: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let row_ptr_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spmv-row-ptr"),
            contents: bytemuck::cast_slice(&row_ptr),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let col_idx_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spmv-col-idx"),
            contents: bytemuck::cast_slice(&col_idx),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let vals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spmv-vals"),
            contents: bytemuck::cast_slice(&csr.values),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let vec_bytes = (n * std::mem::size_of::<f64>()) as u64;
        let x_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spmv-x"),
            size: vec_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let y_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spmv-y"),
            size: vec_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spmv-staging"),
            size: vec_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spmv-csr-f64"),
            source: wgpu::ShaderSource::Wgsl(SPMV_SHADER.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("spmv-csr-f64"),
            layout: None,
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spmv-csr-f64"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: row_ptr_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: col_idx_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: vals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: x_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: y_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(GpuSpmv {
            device,
            queue,
            pipeline,
            bind_group,
            x_buffer,
            y_buffer,
            staging,
            n,
        })
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<()> {
        self.queue
            .write_buffer(&self.x_buffer, 0, bytemuck::cast_slice(x));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("spmv"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("spmv"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let groups = (self.n as u32 + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
            pass.dispatch_workgroups(groups, 1, 1);
        }
        let bytes = (self.n * std::mem::size_of::<f64>()) as u64;
        encoder.copy_buffer_to_buffer(&self.y_buffer, 0, &self.staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| {
                DiffusionMapsError::EigenSolver("accelerator readback channel closed".into())
            })?
            .map_err(|e| {
                DiffusionMapsError::EigenSolver(format!("accelerator readback: {:?}", e))
            })?;

        y.copy_from_slice(bytemuck::cast_slice(&slice.get_mapped_range()));
        self.staging.unmap();
        Ok(())
    }
}

/// The `k` dominant eigenpairs of a symmetric CSR operator, with the
/// matrix-vector product running on the accelerator.
pub fn largest_eigenpairs(
    csr: &CsrOperator,
    k: usize,
) -> Result<(Vec<f64>, ndarray::Array2<f64>)> {
    let spmv = GpuSpmv::new(csr)?;
    log::debug!(
        "accelerated Lanczos: n = {}, nnz = {}, k = {}",
        csr.n,
        csr.nnz(),
        k
    );
    lanczos::largest_eigenpairs(csr.n, k, |x, y| spmv.apply(x, y))
}
