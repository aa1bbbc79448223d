//! Integration tests for the VitaTwin client
//! These run the real reqwest transport and file-backed token store against a local mock server

pub mod test_harness;

pub mod fetch_test;
pub mod session_test;
