/* Copyright 2020 @Yuchen Wong */

pub type Float = f32;
pub type Int = i32;
pub type UInt = u32;

pub type Vector3f = nalgebra::Vector3<Float>;
pub type Vector3i = nalgebra::Vector3<Int>;

pub const FLOAT_MIN: Float = std::f32::MIN;
pub const FLOAT_MAX: Float = std::f32::MAX;

pub const EPSILON: Float = 1e-4;
pub const RAY_EPSILON: Float = 1e-6;
