pub mod jwt;
pub mod telemetry;
pub mod test_utils;
