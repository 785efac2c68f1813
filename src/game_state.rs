use bitflags::bitflags;
use smallvec::SmallVec;

use crate::handles::{ItemHandle, NpcHandle};

bitflags! {
    /// Item category flags, as declared by the item's script instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ItemFlags: u32 {
        const MELEE_WEAPON = 1 << 0;
        const RANGED_WEAPON = 1 << 1;
        const AMMO = 1 << 2;
        const ARMOR = 1 << 3;
        const FOOD = 1 << 4;
        const DOCUMENT = 1 << 5;
        const RUNE = 1 << 6;
    }
}

impl ItemFlags {
    /// Categories that equip a weapon when the item lands in an inventory.
    pub const WEAPON: ItemFlags = ItemFlags::MELEE_WEAPON.union(ItemFlags::RANGED_WEAPON);
}

/// Script-side NPC record, filled in by the instance constructor.
#[derive(Debug, Clone, Default)]
pub struct NpcData {
    pub instance_symbol: usize,
    /// Display name shown to the player; defaults to the instance symbol
    /// name until the constructor overwrites it.
    pub name: String,
    /// Function symbol index of the daily routine; 0 means none.
    pub daily_routine: u32,
}

/// Script-side item record.
#[derive(Debug, Clone, Default)]
pub struct ItemData {
    pub instance_symbol: usize,
    pub name: String,
    pub main_flags: ItemFlags,
    /// Visual asset swapped onto the wearer when the item is armor.
    pub visual_change: String,
    /// Function symbol indices of the state-use behaviours; slot 0 decides
    /// whether the item is usable. 0 means no behaviour.
    pub on_state: SmallVec<[u32; 4]>,
    /// Function symbol index of the equip behaviour; 0 means none.
    pub on_equip: u32,
}

impl ItemData {
    pub fn on_state_primary(&self) -> u32 {
        self.on_state.first().copied().unwrap_or(0)
    }
}

/// Object store for everything the VM mints during script execution. Handles
/// index into it and stay stable for the life of the loaded script image.
#[derive(Debug, Default)]
pub struct GameObjects {
    npcs: Vec<NpcData>,
    items: Vec<ItemData>,
}

impl GameObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_npc(&mut self, data: NpcData) -> NpcHandle {
        let handle = NpcHandle::from_index(self.npcs.len());
        self.npcs.push(data);
        handle
    }

    pub fn insert_item(&mut self, data: ItemData) -> ItemHandle {
        let handle = ItemHandle::from_index(self.items.len());
        self.items.push(data);
        handle
    }

    pub fn npc(&self, handle: NpcHandle) -> Option<&NpcData> {
        self.npcs.get(handle.index())
    }

    pub fn npc_mut(&mut self, handle: NpcHandle) -> Option<&mut NpcData> {
        self.npcs.get_mut(handle.index())
    }

    pub fn item(&self, handle: ItemHandle) -> Option<&ItemData> {
        self.items.get(handle.index())
    }

    pub fn item_mut(&mut self, handle: ItemHandle) -> Option<&mut ItemData> {
        self.items.get_mut(handle.index())
    }

    pub fn npc_count(&self) -> usize {
        self.npcs.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
