pub mod config;
pub mod controller;
pub mod crd;
pub mod deployer;
pub mod external_crd;
pub mod garden;
pub mod validation;
pub mod values;

pub const OPERATOR_NAME: &str = "cert-service.extensions.gardener.cloud";

/// The `Extension.spec.type` this controller is responsible for.
pub const EXTENSION_TYPE: &str = "shoot-cert-service";

pub const FIELD_MANAGER: &str = "cert-service-operator";
