// Host reference executor for the four device stages. Same numeric
// contracts as the WGSL kernels (key formula, tie-break, union law,
// exactly-once propagation), executed data-parallel over rayon. The
// builder falls back to it when no adapter exists, and the tests lean
// on it as the deterministic substrate.
pub mod morton;
pub mod sort;
pub mod hierarchy;
pub mod propagate;
