pub mod arrival;
pub mod rider_request;
