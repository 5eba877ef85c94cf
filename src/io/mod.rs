// Copyright @yucwang 2026

pub mod volume_loader;
