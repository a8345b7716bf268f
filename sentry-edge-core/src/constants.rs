use std::sync::LazyLock;

use crate::protocol::{ClientSdkInfo, ClientSdkPackage};

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The SDK name reported in events and the user agent.
pub const SDK_NAME: &str = "sentry.rust.edge";

pub(crate) static USER_AGENT: LazyLock<String> =
    LazyLock::new(|| format!("{}/{}", SDK_NAME, VERSION));

pub(crate) static SDK_INFO: LazyLock<ClientSdkInfo> = LazyLock::new(|| ClientSdkInfo {
    name: SDK_NAME.into(),
    version: VERSION.into(),
    packages: vec![ClientSdkPackage {
        name: "cargo:sentry-edge".into(),
        version: VERSION.into(),
    }],
    integrations: vec![],
});
