// Copyright @yucwang 2026

pub mod context;
pub mod data;
pub mod error;
pub mod hit_iterator;
pub mod iterator;
pub mod kernel;
pub mod native;
pub mod observer;
pub mod parallel;
pub mod sampler;
pub mod value_selector;
pub mod volume;
