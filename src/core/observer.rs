// Copyright @yucwang 2026

//! Read-only views of what the kernels did with a committed volume.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::data::DataType;
use crate::core::error::{Result, VklError};
use crate::core::native::NativeVolume;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    /// One `u32` per sparse leaf: kernel evaluations that read the leaf.
    LeafNodeAccess,
}

impl ObserverKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "LeafNodeAccess" => Ok(ObserverKind::LeafNodeAccess),
            other => Err(VklError::UnsupportedOperation(format!("unknown observer type '{}'", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObserverKind::LeafNodeAccess => "LeafNodeAccess",
        }
    }
}

/// Borrows the counters of one commit; a recommit starts from zero.
pub struct Observer<'a> {
    kind: ObserverKind,
    counters: &'a [AtomicU32],
}

impl<'a> Observer<'a> {
    pub(crate) fn new(native: &'a NativeVolume, kind: ObserverKind) -> Result<Self> {
        match (kind, native) {
            (ObserverKind::LeafNodeAccess, NativeVolume::Vdb(vdb)) => {
                Ok(Self { kind, counters: vdb.access_counts() })
            }
            (kind, other) => Err(VklError::UnsupportedOperation(format!(
                "{} volumes have no {} observer",
                other.kind_name(),
                kind.name()
            ))),
        }
    }

    pub fn kind(&self) -> ObserverKind {
        self.kind
    }

    pub fn element_type(&self) -> DataType {
        DataType::UInt
    }

    pub fn num_elements(&self) -> usize {
        self.counters.len()
    }

    /// Copy of the counters. Samplers on other threads may keep counting
    /// while this runs; each element is read atomically.
    pub fn read(&self) -> Vec<u32> {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kinds_are_rejected() {
        assert_eq!(ObserverKind::parse("LeafNodeAccess").unwrap(), ObserverKind::LeafNodeAccess);
        assert!(matches!(ObserverKind::parse("leafCount"), Err(VklError::UnsupportedOperation(_))));
    }
}
