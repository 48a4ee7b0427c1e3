//! Index newtypes for the arenas owned by a [`Function`](crate::Function).
//!
//! All arena IDs are dense `u32` indices into per-function arenas. They are
//! only meaningful relative to the function that allocated them. Functions
//! themselves are told apart by [`FunctionId`].

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Build an ID from an arena length.
            ///
            /// # Panics
            ///
            /// Panics if `index` does not fit in a `u32`.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                Self(
                    u32::try_from(index)
                        .unwrap_or_else(|_| panic!(concat!(stringify!($name), " overflow"))),
                )
            }
        }
    };
}

arena_id! {
    /// Basic block ID within a function.
    BlockId
}

arena_id! {
    /// SSA value ID within a function (instruction result or block argument).
    ValueId
}

arena_id! {
    /// Instruction ID within a function. Terminators are not instructions in
    /// this arena; they live directly on their block.
    InstId
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl std::fmt::Display for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Process-unique identity of one [`Function`](crate::Function) body.
///
/// Every function gets a fresh ID when it is created, cloned or
/// deserialized, so two bodies with the same name never share one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(u64);

impl FunctionId {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// The [`FunctionId`] slot of a function.
///
/// Cloning or defaulting draws a fresh ID. Identity takes no part in
/// structural equality or hashing.
#[derive(Debug)]
pub(crate) struct Identity(FunctionId);

impl Identity {
    pub(crate) fn id(&self) -> FunctionId {
        self.0
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self(FunctionId::fresh())
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for Identity {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for Identity {}

impl std::hash::Hash for Identity {
    fn hash<H: std::hash::Hasher>(&self, _: &mut H) {}
}

/// Opaque handle to a type.
///
/// The type system lives outside this crate; the CFG core only needs to copy
/// a type from one value to another (e.g. when synthesizing a phi argument
/// for an implicit edge payload).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Ty(u32);

impl Ty {
    pub const UNIT: Ty = Ty(0);
    pub const BOOL: Ty = Ty(1);
    pub const INT: Ty = Ty(2);
    pub const STR: Ty = Ty(3);
    /// Address of a memory location (stack slot, accessed storage).
    pub const ADDRESS: Ty = Ty(4);
    /// Scope token produced by coroutine and existential openers.
    pub const TOKEN: Ty = Ty(5);
    /// Thrown error payload.
    pub const ERROR: Ty = Ty(6);

    /// First raw index available for types defined outside the core.
    pub const FIRST_USER: u32 = 16;

    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
