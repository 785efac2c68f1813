use std::fmt;

/// Class tag carried alongside an instance binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceClass {
    #[default]
    None,
    Npc,
    Item,
}

/// Handle to an NPC record minted by the VM object store. Valid only within
/// that store; the host never dereferences it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NpcHandle(u32);

/// Handle to an item record minted by the VM object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(u32);

/// Class-erased handle as stored in a symbol's instance binding. The class
/// tag lives next to the binding, not in the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(u32);

macro_rules! handle_impl {
    ($ty:ident) => {
        impl $ty {
            pub const INVALID: $ty = $ty(u32::MAX);

            pub(crate) fn from_index(index: usize) -> Self {
                $ty(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}", self.0)
                } else {
                    write!(f, "invalid")
                }
            }
        }
    };
}

handle_impl!(NpcHandle);
handle_impl!(ItemHandle);
handle_impl!(InstanceHandle);

impl From<NpcHandle> for InstanceHandle {
    fn from(h: NpcHandle) -> Self {
        InstanceHandle(h.0)
    }
}

impl From<ItemHandle> for InstanceHandle {
    fn from(h: ItemHandle) -> Self {
        InstanceHandle(h.0)
    }
}

impl InstanceHandle {
    /// Narrow back to an NPC handle. The caller is responsible for having
    /// checked the binding's class tag first.
    pub fn as_npc(self) -> NpcHandle {
        NpcHandle(self.0)
    }

    pub fn as_item(self) -> ItemHandle {
        ItemHandle(self.0)
    }
}
