#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod capture;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod options;
pub mod restore;
pub mod session;
pub mod storage;

pub use error::{Error, Result};
