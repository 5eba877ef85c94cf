// Copyright @yucwang 2026

#![allow(dead_code)]

pub extern crate nalgebra as na;

pub mod accel;
pub mod core;
pub mod io;
pub mod kernels;
pub mod math;
pub mod volumes;

pub use crate::core::context::Context;
pub use crate::core::error::{Result, VklError};
pub use crate::core::volume::Volume;
