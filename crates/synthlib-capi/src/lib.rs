//! C ABI compatible with the Holzworth `HolzworthHS1001` library.
//!
//! The exported symbols keep the names, argument order and C types of the
//! vendor header so existing LabVIEW, VB and C programs can link against
//! this library unchanged. Each call blocks on a shared tokio runtime and
//! dispatches to a [`HolzworthSynth`](synthlib_holzworth::HolzworthSynth)
//! looked up by serial number.
//!
//! Set `SYNTHLIB_LOG` (e.g. `SYNTHLIB_LOG=debug`) to enable logging to
//! stderr.

#![allow(non_snake_case)]

pub mod device;
mod ffi;
pub mod legacy;
mod registry;
pub mod runtime;
pub mod status;

pub use status::status_code;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use synthlib_holzworth::HolzworthBuilder;
    use synthlib_holzworth::models::hs1001a;
    use synthlib_test_harness::MockTransport;

    use crate::{device, runtime};

    /// Open an HS1001A over `mock` and register it under `key`.
    pub(crate) fn register_mock(key: &str, mock: MockTransport) {
        let synth = runtime::block_on(
            HolzworthBuilder::new(hs1001a())
                .query_identity(false)
                .auto_retry(false)
                .command_timeout(Duration::from_millis(200))
                .build_with_transport(Box::new(mock)),
        )
        .unwrap()
        .unwrap();
        device::register(key, Arc::new(synth));
    }
}
