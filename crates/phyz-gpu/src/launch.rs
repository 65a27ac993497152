//! Per-device pipelines and the upload/dispatch/readback cycle.

use crate::buffers::{GpuParticle, StepParams, Writeback};
use crate::context::{GpuContext, GpuDevice};
use crate::partition::GpuPartition;
use log::trace;
use phyz_manifold::GpuManifoldParams;
use phyz_md::{MdError, Result};
use std::ops::Range;

const WORKGROUP_SIZE: u32 = 64;
/// Per-dimension workgroup count limit.
const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

/// Workgroup grid covering `n` records, folded into rows along y once a
/// single row would exceed [`MAX_WORKGROUPS_PER_DIM`].
fn dispatch_size(n: u32) -> (u32, u32) {
    let groups = n.div_ceil(WORKGROUP_SIZE);
    (groups.min(MAX_WORKGROUPS_PER_DIM), groups.div_ceil(MAX_WORKGROUPS_PER_DIM))
}

/// Compute kernels in the shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    NveStepOne,
    NveStepTwo,
    LangevinStepTwo,
    BrownianStepOne,
    IncludeConstraintForce,
    AngularStepOne,
    AngularStepTwo,
}

impl Kernel {
    pub const ALL: [Kernel; 7] = [
        Kernel::NveStepOne,
        Kernel::NveStepTwo,
        Kernel::LangevinStepTwo,
        Kernel::BrownianStepOne,
        Kernel::IncludeConstraintForce,
        Kernel::AngularStepOne,
        Kernel::AngularStepTwo,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            Kernel::NveStepOne => "nve_step_one",
            Kernel::NveStepTwo => "nve_step_two",
            Kernel::LangevinStepTwo => "langevin_step_two",
            Kernel::BrownianStepOne => "brownian_step_one",
            Kernel::IncludeConstraintForce => "include_constraint_force",
            Kernel::AngularStepOne => "angular_step_one",
            Kernel::AngularStepTwo => "angular_step_two",
        }
    }

    /// Fields the kernel modifies.
    pub fn writes(self, aniso: bool) -> Writeback {
        let w = match self {
            Kernel::NveStepOne => Writeback::POSITION | Writeback::VELOCITY | Writeback::ACCEL,
            Kernel::NveStepTwo => Writeback::VELOCITY | Writeback::ACCEL,
            Kernel::LangevinStepTwo => Writeback::VELOCITY | Writeback::ACCEL | Writeback::TORQUE,
            Kernel::BrownianStepOne => {
                Writeback::POSITION | Writeback::VELOCITY | Writeback::ORIENTATION | Writeback::ANGMOM
            }
            Kernel::IncludeConstraintForce => Writeback::FORCE | Writeback::ACCEL,
            Kernel::AngularStepOne => Writeback::ORIENTATION | Writeback::ANGMOM,
            Kernel::AngularStepTwo => Writeback::ANGMOM,
        };
        if aniso {
            w
        } else {
            w.without(Writeback::TORQUE | Writeback::ORIENTATION | Writeback::ANGMOM)
        }
    }
}

/// Buffers and pipelines of one device's share of the particles.
struct DeviceLane {
    gpu: GpuDevice,
    range: Range<usize>,
    pipelines: Vec<wgpu::ComputePipeline>,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    manifold_buffer: wgpu::Buffer,
    particle_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
}

impl DeviceLane {
    fn new(
        gpu: GpuDevice,
        range: Range<usize>,
        shader_src: &str,
        manifold: &GpuManifoldParams,
    ) -> Result<Self> {
        let device = &gpu.device;
        let bytes = (range.len() * std::mem::size_of::<GpuParticle>()) as u64;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("step_params"),
            size: std::mem::size_of::<StepParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let manifold_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("manifold_params"),
            size: std::mem::size_of::<GpuManifoldParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&manifold_buffer, 0, bytemuck::bytes_of(manifold));

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particles"),
            size: bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particles_staging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("integrator_shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("integrator_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("integrator_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = Kernel::ALL
            .iter()
            .map(|k| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(k.entry_point()),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(k.entry_point()),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("integrator_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: manifold_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: particle_buffer.as_entire_binding(),
                },
            ],
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(MdError::Gpu(format!("pipeline creation on {} failed: {err}", gpu.name)));
        }

        Ok(Self {
            gpu,
            range,
            pipelines,
            bind_group,
            params_buffer,
            manifold_buffer,
            particle_buffer,
            staging_buffer,
        })
    }

    /// Upload this lane's records, run `kernel` and queue the copy to staging.
    fn submit(&self, kernel: Kernel, params: &StepParams, records: &[GpuParticle]) {
        let local = &records[self.range.clone()];
        let params = StepParams {
            n: local.len() as u32,
            ..*params
        };
        self.gpu
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        self.gpu
            .queue
            .write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(local));

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines[kernel as usize]);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let (x, y) = dispatch_size(local.len() as u32);
            pass.dispatch_workgroups(x, y, 1);
        }
        encoder.copy_buffer_to_buffer(
            &self.particle_buffer,
            0,
            &self.staging_buffer,
            0,
            self.particle_buffer.size(),
        );
        self.gpu.queue.submit(Some(encoder.finish()));
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Runs kernels over a fixed number of records split across devices.
///
/// Every launch uploads each device's contiguous slice, dispatches on all
/// devices before waiting on any, then reads every slice back in place.
pub struct GpuLauncher {
    lanes: Vec<DeviceLane>,
    n: usize,
}

impl GpuLauncher {
    pub fn new(
        ctx: &GpuContext,
        n: usize,
        shader_src: &str,
        manifold: GpuManifoldParams,
    ) -> Result<Self> {
        let partition = GpuPartition::new(n, ctx.len());
        let mut lanes = Vec::new();
        for (gpu, range) in ctx.devices().iter().zip(partition.ranges()) {
            if range.is_empty() {
                continue;
            }
            lanes.push(DeviceLane::new(gpu.clone(), range.clone(), shader_src, &manifold)?);
        }
        Ok(Self { lanes, n })
    }

    /// Number of devices holding at least one record.
    pub fn active_devices(&self) -> usize {
        self.lanes.len()
    }

    pub fn set_manifold(&self, manifold: GpuManifoldParams) {
        for lane in &self.lanes {
            lane.gpu
                .queue
                .write_buffer(&lane.manifold_buffer, 0, bytemuck::bytes_of(&manifold));
        }
    }

    /// Run `kernel` over `records` and overwrite them with the results.
    pub fn run(&self, kernel: Kernel, params: StepParams, records: &mut [GpuParticle]) -> Result<()> {
        if records.len() != self.n {
            return Err(MdError::Gpu(format!(
                "launcher holds {} records, got {}",
                self.n,
                records.len()
            )));
        }
        for lane in &self.lanes {
            lane.submit(kernel, &params, records);
        }
        trace!("{} dispatched on {} device(s)", kernel.entry_point(), self.lanes.len());
        pollster::block_on(self.read_back(records))
    }

    async fn read_back(&self, records: &mut [GpuParticle]) -> Result<()> {
        let mut receivers = Vec::with_capacity(self.lanes.len());
        for lane in &self.lanes {
            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            lane.staging_buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    tx.send(result).ok();
                });
            receivers.push(rx);
        }

        for lane in &self.lanes {
            lane.gpu.device.poll(wgpu::Maintain::Wait);
        }

        for (lane, rx) in self.lanes.iter().zip(receivers) {
            rx.receive()
                .await
                .ok_or_else(|| MdError::Gpu(format!("staging map on {} dropped", lane.gpu.name)))?
                .map_err(|e| MdError::Gpu(format!("GPU buffer mapping failed: {e:?}")))?;

            let slice = lane.staging_buffer.slice(..);
            let data = slice.get_mapped_range();
            records[lane.range.clone()].copy_from_slice(bytemuck::cast_slice(&data));
            drop(data);
            lane.staging_buffer.unmap();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_are_distinct() {
        let mut names: Vec<_> = Kernel::ALL.iter().map(|k| k.entry_point()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Kernel::ALL.len());
        for (i, k) in Kernel::ALL.iter().enumerate() {
            assert_eq!(*k as usize, i);
        }
    }

    #[test]
    fn test_large_launches_fold_into_rows() {
        assert_eq!(dispatch_size(1), (1, 1));
        assert_eq!(dispatch_size(64 * 65535), (65535, 1));
        assert_eq!(dispatch_size(64 * 65535 + 1), (65535, 2));
        let (x, y) = dispatch_size(5_000_000);
        assert!(x <= MAX_WORKGROUPS_PER_DIM);
        assert!(u64::from(x) * u64::from(y) * 64 >= 5_000_000);
    }

    #[test]
    fn test_isotropic_launches_leave_rotation_alone() {
        let w = Kernel::BrownianStepOne.writes(false);
        assert!(w.contains(Writeback::POSITION));
        assert!(!w.contains(Writeback::ORIENTATION));
        assert!(Kernel::BrownianStepOne.writes(true).contains(Writeback::ANGMOM));
        assert!(!Kernel::LangevinStepTwo.writes(false).contains(Writeback::TORQUE));
    }
}
