// The four compute kernels, one per pipeline stage, dispatched in order
// with a full device barrier between each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Morton,
    Sort,
    Hierarchy,
    Bounds,
}

impl Stage {
    pub const ALL: [Self; 4] = [
        Self::Morton,
        Self::Sort,
        Self::Hierarchy,
        Self::Bounds,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Morton => "lbvh-morton",
            Self::Sort => "lbvh-sort",
            Self::Hierarchy => "lbvh-hierarchy",
            Self::Bounds => "lbvh-bounds",
        }
    }
}

// NOTE: the sort kernel's pass structure assumes the 256-lane workgroup
// baked into each source, so no size substitution happens here
pub fn source(stage: Stage) -> wgpu::ShaderSource<'static> {
    let source = match stage {
        Stage::Morton => include_str!("morton.wgsl"),
        Stage::Sort => include_str!("sort.wgsl"),
        Stage::Hierarchy => include_str!("hierarchy.wgsl"),
        Stage::Bounds => include_str!("bounds.wgsl"),
    };

    wgpu::ShaderSource::Wgsl(source.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kernel_declares_the_shared_entry_point() {
        for stage in Stage::ALL {
            let wgpu::ShaderSource::Wgsl(text) = source(stage) else {
                panic!("{} is not WGSL", stage.label());
            };

            assert!(text.contains("fn main_cs("), "{}", stage.label());
            assert!(
                text.contains("@workgroup_size(256, 1, 1)"),
                "{}", stage.label(),
            );
        }
    }
}
