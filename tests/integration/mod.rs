//! Integration tests driving a prepared server

pub mod artifacts_test;
pub mod bundling_test;
pub mod pipeline_test;
pub mod plugin_test;
pub mod realtime_test;
