//! The versioned provider configuration embedded in `Extension.spec.providerConfig`.

use serde_json::Value;
use snafu::{ResultExt, Snafu};

mod v1alpha1_impl;

pub mod v1alpha1 {
    pub use crate::crd::v1alpha1_impl::*;
}

#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display(
        "unsupported provider config {api_version:?}/{kind:?}, expected {expected_api_version}/{expected_kind}"
    ))]
    UnsupportedType {
        api_version: String,
        kind: String,
        expected_api_version: &'static str,
        expected_kind: &'static str,
    },

    #[snafu(display("provider config is malformed"))]
    Malformed { source: serde_json::Error },
}

/// Decodes the raw provider config into the typed [`v1alpha1::CertConfig`].
///
/// The embedded object carries its own type meta; anything other than the
/// registered version/kind is rejected rather than best-effort parsed.
pub fn decode_cert_config(raw: &Value) -> Result<v1alpha1::CertConfig, DecodeError> {
    let api_version = raw
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let kind = raw.get("kind").and_then(Value::as_str).unwrap_or_default();
    if api_version != v1alpha1::API_VERSION || kind != v1alpha1::KIND {
        return UnsupportedTypeSnafu {
            api_version,
            kind,
            expected_api_version: v1alpha1::API_VERSION,
            expected_kind: v1alpha1::KIND,
        }
        .fail();
    }
    serde_json::from_value(raw.clone()).context(MalformedSnafu)
}
