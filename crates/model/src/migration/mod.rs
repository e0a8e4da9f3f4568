pub mod errors;
pub mod group;
pub mod profile;
pub mod request;
pub mod status;
