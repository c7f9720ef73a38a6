// src/lib.rs

//! pdslist: AT Protocol PDS registry crawler library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
