use crate::foundation::hash::StableHasher;
use serde::{Deserialize, Serialize};

/// Identifier of a sequence node within a compiled hierarchy.
///
/// Derived by hashing the sub-section id with the parent chain, so the same sub-sequence
/// instance yields the same id across recompiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SequenceId(pub u32);

impl SequenceId {
    /// The root sequence.
    pub const ROOT: Self = Self(0);

    /// Id of the sub-sequence spawned by `sub_section` inside `self`.
    pub fn accumulate(self, sub_section: SubSectionId) -> Self {
        let mut h = StableHasher::new();
        h.write_u32(self.0);
        h.write_u32(sub_section.0);
        let v = (h.finish64() & 0xffff_ffff) as u32;
        // 0 is reserved for the root.
        Self(v.max(1))
    }

    /// Return `true` for [`SequenceId::ROOT`].
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// Track identifier, unique within its sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u32);

/// Section identifier, unique within its track.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SectionId(pub u32);

/// Sub-section identifier, unique within its sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SubSectionId(pub u32);

/// Opaque key of a host object animated by the runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjectKey(pub u64);

/// Handle of a live sequence instance inside a linker's instance registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct InstanceHandle(pub u32);
