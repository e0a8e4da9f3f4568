#![allow(dead_code)]

pub mod integration;
pub mod scripted;
pub mod utils;
