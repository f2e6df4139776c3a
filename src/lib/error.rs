// Build-terminal and degradable failure taxonomy for the LBVH pipeline.
// Input and DegenerateScene abort a build before any device work;
// Device and Readback abort after allocation. None of them escape the
// orchestrator's `build` entry point -- see `builder::LbvhBuilder::build`.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("input error: {0}")]
    Input(String),

    #[error("degenerate scene: global AABB extent {0:?} is below epsilon on every axis")]
    DegenerateScene([f32; 3]),

    #[error("device error: {0}")]
    Device(String),

    #[error("readback error: {0}")]
    Readback(String),
}

impl BuildError {
    pub fn input<T: ToString>(msg: T) -> Self {
        BuildError::Input(msg.to_string())
    }

    pub fn device<T: ToString>(msg: T) -> Self {
        BuildError::Device(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        BuildError::Readback(msg.to_string())
    }
}
