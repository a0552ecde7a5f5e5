#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authority;
mod record;

pub use self::{authority::KubeAuthority, record::IntoRecord};
pub use k8s_openapi::api::{
    self,
    core::v1::{PersistentVolumeClaim, Pod},
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Client, Resource,
};
