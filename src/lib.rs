// Library exports for narrative-guard
// The binary and integration tests drive the pipeline through these modules

pub mod common;
pub mod forms;
