/// Main test module that includes all sub-modules
/// Run specific tests with `cargo test <module>::<submodule>`
/// For example: `cargo test integration::partition_test`
// Utility modules
pub mod utils;

// Integration tests
pub mod integration {
    pub mod partition_test;
    pub mod query_test;
    pub mod round_trip_test;
}
