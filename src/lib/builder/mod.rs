use std::{mem, time};

use wgpu::util::DeviceExt as _;

use crate::{
    bvh::{self, Aabb, AabbInstance, Extraction, LbvhNode, PrimitiveRecord, Primitive},
    error::BuildError,
    geom::{self, M4, V3, V3Ops as _},
    gpu::Gpu,
    logs::{BuildLog, FacadeLog, WarnBudget},
    shaders, stages, Config, WORKGROUP_SIZE,
};

// Instance scales never drop below this, so flat boxes still rasterize
// as visible slivers
const SCALE_FLOOR: f32 = 1e-3;

// Per-dispatch uniform for the sort, hierarchy and bounds kernels;
// padded out to a uniform-friendly 16 bytes
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
struct StageParams {
    count: u32,
    _p0: [u32; 3],
}

// Uniform for the Morton kernel; layout mirrors morton.wgsl
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
struct MortonParams {
    scene_min: [f32; 3],
    count: u32,
    scene_extent: [f32; 3],
    _p0: u32,
}

// Snapshot of the most recent successful build. A failed build leaves
// the previous snapshot (and hierarchy) in place.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuildResult {
    pub node_count: u32,
    pub instance_count: u32,
    pub degenerate_count: u32,
    pub duration_ms: f32,
}

// One compiled compute pipeline per stage, built once per device
struct Kernels {
    morton: wgpu::ComputePipeline,
    sort: wgpu::ComputePipeline,
    hierarchy: wgpu::ComputePipeline,
    bounds: wgpu::ComputePipeline,
}

impl Kernels {
    fn new(device: &wgpu::Device) -> Self {
        let build = |stage: shaders::Stage| {
            let module = device.create_shader_module(
                wgpu::ShaderModuleDescriptor {
                    label: Some(stage.label()),
                    source: shaders::source(stage),
                },
            );

            device.create_compute_pipeline(
                &wgpu::ComputePipelineDescriptor {
                    label: Some(stage.label()),
                    layout: None,
                    module: &module,
                    entry_point: "main_cs",
                },
            )
        };

        Self {
            morton: build(shaders::Stage::Morton),
            sort: build(shaders::Stage::Sort),
            hierarchy: build(shaders::Stage::Hierarchy),
            bounds: build(shaders::Stage::Bounds),
        }
    }
}

// Orchestrates the four-stage pipeline over a triangle mesh and retains
// the results: the node array, the wireframe instances, and (on the
// device path) the instance vertex buffer.
pub struct LbvhBuilder {
    gpu: Option<Gpu>,
    kernels: Option<Kernels>,
    config: Config,
    log: Box<dyn BuildLog>,

    nodes: Vec<LbvhNode>,
    primitives: Vec<Primitive>,
    instances: Vec<AabbInstance>,
    instance_buffer: Option<wgpu::Buffer>,

    result: BuildResult,
    last_transform: Option<M4>,
}

impl LbvhBuilder {
    pub fn new(gpu: Gpu, config: Config) -> Self {
        let kernels = Kernels::new(&gpu.device);

        Self {
            gpu: Some(gpu),
            kernels: Some(kernels),
            ..Self::host_only(config)
        }
    }

    // Reference path on the CPU; same stages, same results, no device.
    // This is also what the pipeline tests run against.
    pub fn host_only(config: Config) -> Self {
        Self {
            gpu: None,
            kernels: None,
            config,
            log: Box::new(FacadeLog),
            nodes: Vec::new(),
            primitives: Vec::new(),
            instances: Vec::new(),
            instance_buffer: None,
            result: BuildResult::default(),
            last_transform: None,
        }
    }

    pub fn with_log(mut self, log: Box<dyn BuildLog>) -> Self {
        self.log = log;

        self
    }

    // Full rebuild from scratch. Never fails outward: on error the
    // failure is logged and the previous hierarchy stays untouched, so
    // the caller reads unchanged counts as the signal.
    pub fn build(&mut self, positions: &[V3<f32>], indices: &[u32]) -> BuildResult {
        let start = time::Instant::now();

        match self.try_build(positions, indices) {
            Ok(mut result) => {
                result.duration_ms = start.elapsed().as_secs_f32() * 1e3;

                self.log.message(log::Level::Info, &format!(
                    "built {} nodes in {:.2}ms ({} instances, {} degenerate)",
                    result.node_count,
                    result.duration_ms,
                    result.instance_count,
                    result.degenerate_count,
                ));

                self.result = result;
            },
            Err(e) => {
                self.log.message(log::Level::Error, &format!(
                    "build failed, previous hierarchy retained: {}", e,
                ));
            },
        }

        self.result
    }

    // Rebuild with every position pushed through `model` first
    pub fn build_transformed(
        &mut self,
        positions: &[V3<f32>],
        indices: &[u32],
        model: &M4,
    ) -> BuildResult {
        let transformed = positions
            .iter()
            .map(|&p| geom::transform_point(model, p))
            .collect::<Vec<_>>();

        self.last_transform = Some(*model);

        self.build(&transformed, indices)
    }

    // Per-frame entry point: rebuilds only when the model transform
    // moved since the last call (or when forced)
    pub fn rebuild_if_changed(
        &mut self,
        positions: &[V3<f32>],
        indices: &[u32],
        model: &M4,
        force: bool,
    ) -> Option<BuildResult> {
        if !force && self.last_transform.as_ref() == Some(model) {
            return None;
        }

        Some(self.build_transformed(positions, indices, model))
    }

    pub fn nodes(&self) -> &[LbvhNode] {
        &self.nodes
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn instances(&self) -> &[AabbInstance] {
        &self.instances
    }

    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.instance_buffer.as_ref()
    }

    pub fn result(&self) -> BuildResult {
        self.result
    }

    fn try_build(
        &mut self,
        positions: &[V3<f32>],
        indices: &[u32],
    ) -> Result<BuildResult, BuildError> {
        let extraction = bvh::extract(
            positions, indices,
            self.config.degenerate_eps,
        )?;

        let nodes = match (&self.gpu, &self.kernels) {
            (Some(gpu), Some(kernels)) => {
                run_device(gpu, kernels, &extraction, self.config.degenerate_eps)?
            },
            _ => run_host(&extraction, self.config.degenerate_eps),
        };

        self.nodes = nodes;
        self.primitives = extraction.primitives;

        let degenerate_count = self.collect_instances();
        self.upload_instances();

        Ok(BuildResult {
            node_count: self.nodes.len() as u32,
            instance_count: self.instances.len() as u32,
            degenerate_count,
            duration_ms: 0.,
        })
    }

    // One wireframe-box instance per renderable node; degenerate nodes
    // are skipped with a rate-limited warning
    fn collect_instances(&mut self) -> u32 {
        let mut budget = WarnBudget::new(self.config.warn_limit);

        self.instances.clear();
        self.instances.reserve(self.nodes.len());

        for (slot, node) in self.nodes.iter().enumerate() {
            let aabb: Aabb = node.bounds.into();

            if !aabb.is_renderable(self.config.degenerate_eps) {
                budget.warn(self.log.as_ref(), || format!(
                    "node {} has a degenerate box; instance skipped", slot,
                ));

                continue;
            }

            self.instances.push(AabbInstance::new(
                aabb.centroid().add(self.config.instance_offset),
                aabb.extent().vmax([SCALE_FLOOR; 3]),
            ));
        }

        if budget.suppressed() > 0 {
            self.log.message(log::Level::Warn, &format!(
                "...and {} more degenerate nodes", budget.suppressed(),
            ));
        }

        budget.seen()
    }

    // The buffer is replaced wholesale on every build; instance counts
    // change between frames, so resizing in place buys nothing
    fn upload_instances(&mut self) {
        let Some(gpu) = &self.gpu else { return; };

        if let Some(old) = self.instance_buffer.take() {
            old.destroy();
        }

        if self.instances.is_empty() {
            self.log.message(
                log::Level::Warn,
                "no renderable instances; instance buffer left empty",
            );

            return;
        }

        let buffer = gpu.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("lbvh-instances"),
                contents: bytemuck::cast_slice(&self.instances),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            },
        );

        let expected = (self.instances.len() * mem::size_of::<AabbInstance>()) as u64;
        if buffer.size() != expected {
            self.log.message(log::Level::Error, &format!(
                "instance buffer holds {} bytes, expected {}",
                buffer.size(), expected,
            ));
        }

        self.instance_buffer = Some(buffer);
    }
}

// CPU rendition of the pipeline. Stage for stage the same contract as
// the kernels, which makes it both the fallback and the test oracle.
fn run_host(extraction: &Extraction, eps: f32) -> Vec<LbvhNode> {
    let mut entries = stages::morton::assign_codes(
        &extraction.primitives,
        &extraction.scene_bounds,
        eps,
    );

    stages::sort::sort_entries(&mut entries);

    let (mut nodes, parents) = stages::hierarchy::build_topology(
        &entries,
        &extraction.primitives,
    );

    stages::propagate::propagate_bounds(&mut nodes, &parents);

    nodes
}

// Device path: four dispatches with a full device poll between each, so
// every stage sees the previous one's writes completed
fn run_device(
    gpu: &Gpu,
    kernels: &Kernels,
    extraction: &Extraction,
    eps: f32,
) -> Result<Vec<LbvhNode>, BuildError> {
    let n = extraction.len();
    let total = bvh::node_count(n);

    let records = extraction.primitives
        .iter()
        .map(PrimitiveRecord::from)
        .collect::<Vec<_>>();

    let primitives = gpu.device.create_buffer_init(
        &wgpu::util::BufferInitDescriptor {
            label: Some("lbvh-primitives"),
            contents: bytemuck::cast_slice(&records),
            usage: wgpu::BufferUsages::STORAGE,
        },
    );

    let entry_desc = |label| wgpu::BufferDescriptor {
        label: Some(label),
        size: (n * mem::size_of::<bvh::MortonEntry>()) as u64,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    };

    // Keys land in ping, and after the sort's even pass count they are
    // back in ping again
    let ping = gpu.device.create_buffer(&entry_desc("lbvh-entries-ping"));
    let pong = gpu.device.create_buffer(&entry_desc("lbvh-entries-pong"));

    let nodes = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lbvh-nodes"),
        size: (total * mem::size_of::<LbvhNode>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    // Zero-initialized on creation, which the bounds kernel relies on
    // for its visitation counters
    let construction = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lbvh-construction"),
        size: (total * mem::size_of::<bvh::ConstructionInfo>()) as u64,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    });

    let morton_params = gpu.device.create_buffer_init(
        &wgpu::util::BufferInitDescriptor {
            label: Some("lbvh-morton-params"),
            contents: bytemuck::bytes_of(&MortonParams {
                scene_min: extraction.scene_bounds.min,
                count: n as u32,
                scene_extent: extraction.scene_bounds.clamped_extent(eps),
                _p0: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        },
    );

    let stage_params = gpu.device.create_buffer_init(
        &wgpu::util::BufferInitDescriptor {
            label: Some("lbvh-stage-params"),
            contents: bytemuck::bytes_of(&StageParams {
                count: n as u32,
                _p0: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        },
    );

    let groups = (n as u32 + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

    let bind = |pipeline: &wgpu::ComputePipeline, buffers: &[&wgpu::Buffer]| {
        let entries = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect::<Vec<_>>();

        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        })
    };

    let dispatches = [
        (&kernels.morton, bind(&kernels.morton, &[&morton_params, &primitives, &ping]), groups),
        (&kernels.sort, bind(&kernels.sort, &[&stage_params, &ping, &pong]), 1),
        (&kernels.hierarchy, bind(&kernels.hierarchy, &[&stage_params, &ping, &primitives, &nodes, &construction]), groups),
        (&kernels.bounds, bind(&kernels.bounds, &[&stage_params, &nodes, &construction]), groups),
    ];

    for (pipeline, bind_group, count) in &dispatches {
        let mut encoder = gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: None },
        );

        {
            let mut pass = encoder.begin_compute_pass(
                &wgpu::ComputePassDescriptor {
                    label: None,
                    timestamp_writes: None,
                },
            );

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(*count, 1, 1);
        }

        gpu.queue.submit(Some(encoder.finish()));

        // Host-side barrier between stages
        gpu.device.poll(wgpu::Maintain::Wait);
    }

    let raw = gpu.read_back(&nodes, (total * mem::size_of::<LbvhNode>()) as u64)?;

    Ok(bytemuck::cast_slice(&raw).to_vec())
}

#[cfg(test)]
mod tests {
    use std::sync;

    use super::*;

    struct CollectLog(sync::Arc<sync::Mutex<Vec<String>>>);

    impl BuildLog for CollectLog {
        fn message(&self, _level: log::Level, text: &str) {
            self.0.lock().unwrap().push(text.to_owned());
        }
    }

    fn quad() -> (Vec<[f32; 3]>, Vec<u32>) {
        let positions = vec![
            [0., 0., 0.],
            [2., 0., 0.],
            [2., 2., 1.],
            [0., 2., 1.],
        ];

        (positions, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn host_build_produces_the_expected_node_count() {
        let (positions, indices) = quad();

        let mut builder = LbvhBuilder::host_only(Config::new());
        let result = builder.build(&positions, &indices);

        assert_eq!(result.node_count, 3);
        assert_eq!(builder.nodes().len(), 3);
        assert_eq!(result.instance_count, 3);
        assert!(result.duration_ms >= 0.);
    }

    #[test]
    fn failed_build_retains_the_previous_hierarchy() {
        let (positions, indices) = quad();
        let sink = sync::Arc::new(sync::Mutex::new(Vec::new()));

        let mut builder = LbvhBuilder::host_only(Config::new())
            .with_log(Box::new(CollectLog(sink.clone())));

        let good = builder.build(&positions, &indices);
        let after_failure = builder.build(&positions, &[0, 1, 99]);

        assert_eq!(good, after_failure);
        assert_eq!(builder.nodes().len(), 3);
        assert!(sink.lock().unwrap().iter().any(|m| m.contains("build failed")));
    }

    #[test]
    fn rebuild_skips_an_unchanged_transform() {
        let (positions, indices) = quad();

        let mut builder = LbvhBuilder::host_only(Config::new());

        let first = builder.rebuild_if_changed(
            &positions, &indices,
            &geom::M4_IDENTITY, false,
        );
        let second = builder.rebuild_if_changed(
            &positions, &indices,
            &geom::M4_IDENTITY, false,
        );
        let forced = builder.rebuild_if_changed(
            &positions, &indices,
            &geom::M4_IDENTITY, true,
        );

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(forced.is_some());
    }

    #[test]
    fn transform_moves_the_root_box() {
        let (positions, indices) = quad();

        let mut model = geom::M4_IDENTITY;
        model[3] = [10., 0., 0., 1.];

        let mut builder = LbvhBuilder::host_only(Config::new());
        builder.build_transformed(&positions, &indices, &model);

        let root: Aabb = builder.nodes()[0].bounds.into();

        assert_eq!(root.min, [10., 0., 0.]);
        assert_eq!(root.max, [12., 2., 1.]);
    }

    #[test]
    fn instance_offset_shifts_every_center() {
        let (positions, indices) = quad();

        let mut config = Config::new();
        config.instance_offset = [8.3, 0., 8.];

        let mut shifted = LbvhBuilder::host_only(config);
        let mut plain = LbvhBuilder::host_only(Config::new());

        shifted.build(&positions, &indices);
        plain.build(&positions, &indices);

        for (a, b) in shifted.instances().iter().zip(plain.instances()) {
            assert_eq!(a.center, b.center.add([8.3, 0., 8.]));
            assert_eq!(a.scale, b.scale);
        }
    }
}
