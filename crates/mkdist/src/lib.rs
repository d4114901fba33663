//! Library side of `mkdist`, shared by the binary and the integration tests.

pub mod dist;
