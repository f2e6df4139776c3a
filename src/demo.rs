use lbvh::geom::V3;

// Wavy height-field mesh, dense enough to give the sorter real work
fn grid(side: u32) -> (Vec<V3<f32>>, Vec<u32>) {
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for z in 0..=side {
        for x in 0..=side {
            let (fx, fz) = (x as f32, z as f32);

            positions.push([fx, (fx * 0.7).sin() + (fz * 0.4).cos(), fz]);
        }
    }

    for z in 0..side {
        for x in 0..side {
            let a = z * (side + 1) + x;
            let b = a + 1;
            let c = a + side + 1;
            let d = c + 1;

            indices.extend([a, b, c, b, d, c]);
        }
    }

    (positions, indices)
}

fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;

    let (positions, indices) = grid(64);

    let mut builder = match pollster::block_on(lbvh::gpu::Gpu::new()) {
        Ok(gpu) => lbvh::LbvhBuilder::new(gpu, lbvh::Config::new()),
        Err(e) => {
            log::warn!("{}; falling back to the host pipeline", e);

            lbvh::LbvhBuilder::host_only(lbvh::Config::new())
        },
    };

    let result = builder.build(&positions, &indices);

    log::info!(
        "{} triangles -> {} nodes, {} instances, {:.2}ms",
        indices.len() / 3,
        result.node_count,
        result.instance_count,
        result.duration_ms,
    );

    Ok(())
}
