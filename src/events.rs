use std::fmt;

use crate::handles::{ItemHandle, NpcHandle};

/// Lifecycle events raised by the VM side during script execution. The set
/// is closed: the bridge dispatches these synchronously and nothing else
/// crosses the VM boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmEvent {
    /// A script NPC was constructed and wants a world entity.
    NpcInserted { npc: NpcHandle, spawnpoint: String },
    /// The NPC's instance constructor has finished; routine dispatch may run.
    NpcInitialized { npc: NpcHandle },
    /// An item was placed into an NPC's inventory.
    InventoryItemInserted { item: ItemHandle, npc: NpcHandle },
}

impl fmt::Display for VmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmEvent::NpcInserted { npc, spawnpoint } => {
                write!(f, "NpcInserted npc={npc} spawnpoint={spawnpoint}")
            }
            VmEvent::NpcInitialized { npc } => write!(f, "NpcInitialized npc={npc}"),
            VmEvent::InventoryItemInserted { item, npc } => {
                write!(f, "InventoryItemInserted item={item} npc={npc}")
            }
        }
    }
}
