#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use volm_controller_core as core;
pub use volm_controller_http as http;
pub use volm_controller_index as index;
pub use volm_controller_k8s_api as k8s;

mod args;

pub use self::args::Args;
