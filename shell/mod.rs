// The user-facing surface around the pipeline: rendering results, the
// interactive form, and batch files. Nothing here touches artifact internals.

pub mod batch;
pub mod form;
pub mod render;
