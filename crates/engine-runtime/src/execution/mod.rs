pub mod assets;
pub mod batch;
pub mod session;
pub mod worker;
