pub mod coordinator;
pub mod error;
pub mod execution;

#[cfg(test)]
mod tests;
