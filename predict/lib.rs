#![deny(dead_code)]
#![deny(unused_imports)]

pub mod artifacts;
pub mod classifier;
pub mod encoder;
pub mod features;
pub mod pipeline;
pub mod presentation;
pub mod reference;
pub mod scaler;

#[path = "../shell/mod.rs"]
pub mod shell;
