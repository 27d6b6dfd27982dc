//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a `ZclNode` end to end
//! through the scripted mock transport. All tests run on the host.

mod basic_cluster_tests;
mod local_tests;
mod mock_net;
