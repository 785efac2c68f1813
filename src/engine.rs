use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bevy_ecs::prelude::Entity;
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::config::ScriptConfig;
use crate::error::{Result, ScriptError};
use crate::events::VmEvent;
use crate::game_state::ItemFlags;
use crate::handles::{InstanceClass, InstanceHandle, ItemHandle, NpcHandle};
use crate::profiling::CallProfiler;
use crate::vm::Vm;
use crate::world::{CameraMode, ManipulateKind, ManipulateMessage, WorldInstance};

/// Extension swapped onto an armor item's visual-change asset to get the
/// matching body mesh.
const BODY_MESH_EXTENSION: &str = ".MDM";

/// Bridges the compiled-bytecode script VM to the live world: runs script
/// functions with explicit run-state save/restore, binds script instances
/// to native handles, and turns VM-raised lifecycle events into entity
/// operations.
///
/// The invocation protocol is always the same pair: `prepare_run_function`
/// (snapshot the run-state, seed the default return value), push any
/// arguments, then one of the `run_function*` calls (place the call, drain
/// the interpreter, pop the result, restore the snapshot). Nested calls are
/// safe because each prepare pushes an independent snapshot.
pub struct ScriptEngine {
    vm: Vm,
    config: ScriptConfig,
    npc_registry: HashSet<Entity>,
    item_registry: HashSet<Entity>,
    mob_registry: HashSet<Entity>,
    entity_by_npc: HashMap<NpcHandle, Entity>,
    npc_by_entity: HashMap<Entity, NpcHandle>,
    player_entity: Option<Entity>,
    stack_underflows: u64,
    skipped_item_events: u64,
    profiler: CallProfiler,
    profiling_enabled: bool,
}

impl ScriptEngine {
    pub fn new(vm: Vm) -> Self {
        Self::with_config(vm, ScriptConfig::default())
    }

    pub fn with_config(vm: Vm, config: ScriptConfig) -> Self {
        Self {
            vm,
            config,
            npc_registry: HashSet::new(),
            item_registry: HashSet::new(),
            mob_registry: HashSet::new(),
            entity_by_npc: HashMap::new(),
            npc_by_entity: HashMap::new(),
            player_entity: None,
            stack_underflows: 0,
            skipped_item_events: 0,
            profiler: CallProfiler::new(),
            profiling_enabled: false,
        }
    }

    /// Replace the loaded script image wholesale. There is no merging of
    /// script files: everything minted by the previous image (handles,
    /// bindings, registries) is discarded with it.
    pub fn load(&mut self, vm: Vm) {
        self.vm = vm;
        self.npc_registry.clear();
        self.item_registry.clear();
        self.mob_registry.clear();
        self.entity_by_npc.clear();
        self.npc_by_entity.clear();
        self.player_entity = None;
        self.profiler.reset();
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ScriptConfig {
        &mut self.config
    }

    // ---------- stack discipline ----------

    /// Open a fresh call context: snapshot the run-state, then seed the
    /// operand stack with 0 so functions that do not return still leave a
    /// well-defined result.
    pub fn prepare_run_function(&mut self) {
        let state = self.vm.state_mut();
        state.push_state();
        state.push_int(0);
    }

    pub fn run_function(&mut self, world: &mut WorldInstance, name: &str) -> Result<i32> {
        let address = {
            let state = self.vm.state();
            let index = state
                .symbols()
                .index_of(name)
                .ok_or_else(|| ScriptError::UnknownSymbol(name.to_string()))?;
            state.symbols().get(index).map(|s| s.address).unwrap_or(0)
        };
        Ok(self.run_function_at(world, address))
    }

    pub fn run_function_by_index(&mut self, world: &mut WorldInstance, index: usize) -> Result<i32> {
        let address = self
            .vm
            .state()
            .symbols()
            .get(index)
            .ok_or(ScriptError::UnknownSymbolIndex(index))?
            .address;

        if self.profiling_enabled {
            self.profiler.begin_call();
            let result = self.run_function_at(world, address);
            self.profiler.end_call(index);
            Ok(result)
        } else {
            Ok(self.run_function_at(world, address))
        }
    }

    /// Run the function at `address` to completion and return its result.
    /// Must be paired with a preceding `prepare_run_function`; the snapshot
    /// taken there is restored on every exit path, including the null
    /// address no-op.
    pub fn run_function_at(&mut self, world: &mut WorldInstance, address: u32) -> i32 {
        if address == 0 {
            self.vm.state_mut().pop_state();
            return -1;
        }

        {
            let state = self.vm.state_mut();
            state.set_program_counter(Some(address));
            state.clear_call_trace();
        }

        // Drain the call. Events raised by a step are dispatched before the
        // next step, so world mutation and re-entrant calls happen at the
        // point in the instruction stream that caused them.
        loop {
            let more = self.vm.step();
            self.pump_events(world);
            if !more {
                break;
            }
        }

        let ret = if self.vm.state().stack_is_empty() {
            // The seeded default was consumed by script code.
            self.stack_underflows += 1;
            warn!(address, "script emptied the operand stack; substituting 0");
            0
        } else {
            self.vm.state_mut().pop_value().unwrap_or(0)
        };

        self.vm.state_mut().pop_state();
        ret
    }

    pub fn push_int(&mut self, value: i32) {
        self.vm.state_mut().push_int(value);
    }

    pub fn push_string(&mut self, value: impl Into<String>) {
        self.vm.state_mut().push_string(value);
    }

    pub fn push_var(&mut self, name: &str) -> Result<()> {
        let state = self.vm.state_mut();
        let index = state
            .symbols()
            .index_of(name)
            .ok_or_else(|| ScriptError::UnknownSymbol(name.to_string()))?;
        state.push_var(index, 0);
        Ok(())
    }

    pub fn push_var_indexed(&mut self, symbol: usize, array_index: u32) {
        self.vm.state_mut().push_var(symbol, array_index);
    }

    // ---------- symbol helpers ----------

    pub fn has_symbol(&self, name: &str) -> bool {
        self.vm.state().symbols().has_symbol(name)
    }

    pub fn symbol_index(&self, name: &str) -> Option<usize> {
        self.vm.state().symbols().index_of(name)
    }

    // ---------- instance binder ----------

    /// Rebind `target` to whatever handle and class `source` is bound to.
    pub fn bind_instance(&mut self, target: &str, source: &str) -> Result<()> {
        let state = self.vm.state_mut();
        let source_index = state
            .symbols()
            .index_of(source)
            .ok_or_else(|| ScriptError::UnknownSymbol(source.to_string()))?;
        let target_index = state
            .symbols()
            .index_of(target)
            .ok_or_else(|| ScriptError::UnknownSymbol(target.to_string()))?;
        let (handle, class) = state
            .binding(source_index)
            .unwrap_or((InstanceHandle::INVALID, InstanceClass::None));
        state.bind_instance(target_index, handle, class);
        Ok(())
    }

    pub fn bind_instance_npc(&mut self, target: &str, npc: NpcHandle) -> Result<()> {
        let state = self.vm.state_mut();
        let index = state
            .symbols()
            .index_of(target)
            .ok_or_else(|| ScriptError::UnknownSymbol(target.to_string()))?;
        state.bind_instance(index, npc.into(), InstanceClass::Npc);
        Ok(())
    }

    pub fn bind_instance_item(&mut self, target: &str, item: ItemHandle) -> Result<()> {
        let state = self.vm.state_mut();
        let index = state
            .symbols()
            .index_of(target)
            .ok_or_else(|| ScriptError::UnknownSymbol(target.to_string()))?;
        state.bind_instance(index, item.into(), InstanceClass::Item);
        Ok(())
    }

    /// Narrow the symbol's bound instance to an NPC handle; invalid if the
    /// symbol is bound to something else (or nothing).
    pub fn resolve_npc(&self, name: &str) -> Result<NpcHandle> {
        let state = self.vm.state();
        let index = state
            .symbols()
            .index_of(name)
            .ok_or_else(|| ScriptError::UnknownSymbol(name.to_string()))?;
        Ok(match state.binding(index) {
            Some((handle, InstanceClass::Npc)) => handle.as_npc(),
            _ => NpcHandle::INVALID,
        })
    }

    pub fn resolve_item(&self, name: &str) -> Result<ItemHandle> {
        let state = self.vm.state();
        let index = state
            .symbols()
            .index_of(name)
            .ok_or_else(|| ScriptError::UnknownSymbol(name.to_string()))?;
        Ok(match state.binding(index) {
            Some((handle, InstanceClass::Item)) => handle.as_item(),
            _ => ItemHandle::INVALID,
        })
    }

    // ---------- event bridge ----------

    /// Dispatch every queued VM event. Runs automatically between
    /// interpreter steps; host code that mints objects directly calls it to
    /// flush the resulting events.
    pub fn pump_events(&mut self, world: &mut WorldInstance) {
        while let Some(event) = self.vm.state_mut().take_event() {
            debug!(event = %event, "dispatching vm event");
            match event {
                VmEvent::NpcInserted { npc, spawnpoint } => {
                    self.on_npc_inserted(world, npc, &spawnpoint);
                }
                VmEvent::NpcInitialized { npc } => self.on_npc_initialized(world, npc),
                VmEvent::InventoryItemInserted { item, npc } => {
                    self.on_inventory_item_inserted(world, item, npc);
                }
            }
        }
    }

    fn on_npc_inserted(&mut self, world: &mut WorldInstance, npc: NpcHandle, spawnpoint: &str) {
        let Some(instance_symbol) = self.vm.state().objects().npc(npc).map(|n| n.instance_symbol)
        else {
            warn!(%npc, "insertion event for an unknown npc record");
            return;
        };

        let entity = world.spawn_npc(npc, instance_symbol);
        self.npc_registry.insert(entity);
        self.entity_by_npc.insert(npc, entity);
        self.npc_by_entity.insert(entity, npc);

        if !spawnpoint.is_empty() {
            match world.waynet().index_of(spawnpoint) {
                Some(waypoint) => {
                    world.teleport_to_waypoint(entity, waypoint);
                }
                // Some script spawnpoints have no waypoint in the graph.
                None => warn!(spawnpoint, "spawnpoint not in waypoint graph; npc left at origin"),
            }
        }

        let player_instance = self.config.player_instance.clone();
        if self.symbol_index(&player_instance) == Some(instance_symbol) {
            self.designate_player(world, &player_instance);
        }
    }

    /// The constructed NPC is the player instance: mark its entity as the
    /// controlled one, install input bindings and point the hero symbol at
    /// it for downstream script logic.
    fn designate_player(&mut self, world: &mut WorldInstance, player_instance: &str) {
        let player = match self.resolve_npc(player_instance) {
            Ok(handle) if handle.is_valid() => handle,
            _ => {
                warn!(player_instance, "player instance did not resolve to a live npc");
                return;
            }
        };
        let Some(&entity) = self.entity_by_npc.get(&player) else {
            warn!(player_instance, "player npc has no world entity");
            return;
        };

        self.player_entity = Some(entity);
        world.setup_key_bindings(entity);

        let hero_symbol = self.config.hero_symbol.clone();
        if let Err(err) = self.bind_instance_npc(&hero_symbol, player) {
            warn!(%err, "cannot rebind hero symbol to the player");
        }
    }

    fn on_npc_initialized(&mut self, world: &mut WorldInstance, npc: NpcHandle) {
        let routine = self
            .vm
            .state()
            .objects()
            .npc(npc)
            .map(|n| n.daily_routine)
            .unwrap_or(0);
        if routine == 0 {
            return;
        }

        self.prepare_run_function();

        let self_symbol = self.config.self_symbol.clone();
        match self.symbol_index(&self_symbol) {
            Some(index) => {
                let state = self.vm.state_mut();
                state.bind_instance(index, npc.into(), InstanceClass::Npc);
                state.set_current_instance(Some(index));
            }
            None => warn!(%self_symbol, "self symbol missing; routine runs without instance context"),
        }

        if let Err(err) = self.run_function_by_index(world, routine as usize) {
            warn!(%err, %npc, "daily routine symbol out of range");
        }
    }

    fn on_inventory_item_inserted(&mut self, world: &mut WorldInstance, item: ItemHandle, npc: NpcHandle) {
        let Some(&entity) = self.entity_by_npc.get(&npc) else {
            // Observed to fail sporadically on one platform; skip the event
            // rather than treat it as fatal.
            self.skipped_item_events += 1;
            debug!(%item, %npc, "item inserted for an npc without a world entity; skipping");
            return;
        };

        let Some(data) = self.vm.state().objects().item(item) else {
            warn!(%item, "insertion event for an unknown item record");
            return;
        };
        let flags = data.main_flags;
        let visual_change = data.visual_change.clone();

        if flags.contains(ItemFlags::ARMOR) {
            world.set_body_mesh(entity, body_mesh_visual(&visual_change));
        }

        if flags.intersects(ItemFlags::WEAPON) {
            world.equip_weapon(entity, item);
        }
    }

    // ---------- world init ----------

    /// Run the world's startup/init scripts (unless the fallback flag is
    /// set), make sure a player exists, and put the camera in third person.
    pub fn init_for_world(
        &mut self,
        world: &mut WorldInstance,
        world_name: &str,
        first_start: bool,
    ) -> Result<()> {
        if !self.config.fallback_spawn {
            let startup = format!("startup_{world_name}");
            if first_start && self.has_symbol(&startup) {
                info!(function = %startup, "running world startup");
                self.prepare_run_function();
                self.run_function(world, &startup)?;
            }

            let init = format!("init_{world_name}");
            if self.has_symbol(&init) {
                info!(function = %init, "running world init");
                self.prepare_run_function();
                self.run_function(world, &init)?;
            }
        } else {
            let instance = self.config.fallback_npc.clone();
            let waypoint = self.config.fallback_waypoint.clone();
            info!(%instance, %waypoint, "world init bypassed; spawning fallback npc");
            self.insert_npc(world, &instance, &waypoint)?;
        }

        // Create the player unless a live one survived from a loaded save.
        let player_instance = self.config.player_instance.clone();
        let player = self.resolve_npc(&player_instance)?;
        if first_start || !player.is_valid() {
            let start = world
                .waynet()
                .start_points()
                .first()
                .and_then(|&wp| world.waynet().waypoint(wp))
                .map(|wp| wp.name.clone());
            match start {
                Some(waypoint) => {
                    info!(%waypoint, "inserting player at start point");
                    self.insert_npc(world, &player_instance, &waypoint)?;
                }
                None => warn!("world has no start point; player not spawned"),
            }
        }

        world.set_camera_mode(CameraMode::ThirdPerson);
        Ok(())
    }

    // ---------- host-origin object creation ----------

    /// Mint an NPC of the named instance, run its constructor and dispatch
    /// the resulting lifecycle events (entity spawn, routine dispatch).
    pub fn insert_npc(
        &mut self,
        world: &mut WorldInstance,
        instance: &str,
        spawnpoint: &str,
    ) -> Result<NpcHandle> {
        let index = self
            .symbol_index(instance)
            .ok_or_else(|| ScriptError::UnknownSymbol(instance.to_string()))?;
        let address = self.vm.state().symbols().get(index).map(|s| s.address).unwrap_or(0);

        let npc = self.vm.state_mut().insert_npc(index, spawnpoint);
        self.pump_events(world);

        if address != 0 {
            self.prepare_run_function();
            self.vm.state_mut().set_current_instance(Some(index));
            self.run_function_at(world, address);
        }

        self.vm.state_mut().finalize_npc(npc);
        self.pump_events(world);
        Ok(npc)
    }

    /// Mint an item of the named instance, run its constructor and place it
    /// into the NPC's inventory, dispatching the insertion event.
    pub fn give_item(
        &mut self,
        world: &mut WorldInstance,
        instance: &str,
        npc: NpcHandle,
    ) -> Result<ItemHandle> {
        let index = self
            .symbol_index(instance)
            .ok_or_else(|| ScriptError::UnknownSymbol(instance.to_string()))?;
        let address = self.vm.state().symbols().get(index).map(|s| s.address).unwrap_or(0);

        let item = self.vm.state_mut().create_item(index);

        if address != 0 {
            self.prepare_run_function();
            self.vm.state_mut().set_current_instance(Some(index));
            self.run_function_at(world, address);
        }

        self.vm.state_mut().insert_inventory_item(item, npc);
        self.pump_events(world);
        Ok(item)
    }

    // ---------- registries & queries ----------

    pub fn register_item(&mut self, entity: Entity) {
        self.item_registry.insert(entity);
    }

    pub fn unregister_item(&mut self, entity: Entity) {
        self.item_registry.remove(&entity);
    }

    pub fn register_mob(&mut self, entity: Entity) {
        self.mob_registry.insert(entity);
    }

    pub fn unregister_mob(&mut self, entity: Entity) {
        self.mob_registry.remove(&entity);
    }

    pub fn world_npcs(&self) -> &HashSet<Entity> {
        &self.npc_registry
    }

    pub fn world_items(&self) -> &HashSet<Entity> {
        &self.item_registry
    }

    pub fn world_mobs(&self) -> &HashSet<Entity> {
        &self.mob_registry
    }

    pub fn player_entity(&self) -> Option<Entity> {
        self.player_entity
    }

    pub fn entity_of_npc(&self, npc: NpcHandle) -> Option<Entity> {
        self.entity_by_npc.get(&npc).copied()
    }

    pub fn npc_of_entity(&self, entity: Entity) -> Option<NpcHandle> {
        self.npc_by_entity.get(&entity).copied()
    }

    /// The world destroyed an entity; drop every reference the bridge holds
    /// so the registries stay consistent.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        self.npc_registry.remove(&entity);
        self.item_registry.remove(&entity);
        self.mob_registry.remove(&entity);
        if let Some(npc) = self.npc_by_entity.remove(&entity) {
            self.entity_by_npc.remove(&npc);
        }
        if self.player_entity == Some(entity) {
            self.player_entity = None;
        }
    }

    /// All registered NPCs strictly inside the given radius. Linear scan;
    /// the registry is small enough that no spatial index is kept.
    pub fn npcs_in_radius(&self, world: &WorldInstance, center: Vec3, radius: f32) -> HashSet<Entity> {
        let radius_sq = radius * radius;
        self.npc_registry
            .iter()
            .copied()
            .filter(|&entity| {
                world
                    .position_of(entity)
                    .is_some_and(|position| center.distance_squared(position) < radius_sq)
            })
            .collect()
    }

    /// NPCs whose display name or instance symbol name contains `name_part`,
    /// case-insensitively.
    pub fn find_npcs_name_like(&self, world: &WorldInstance, name_part: &str) -> HashSet<Entity> {
        let state = self.vm.state();
        let mut out = HashSet::new();
        for &entity in &self.npc_registry {
            let Some(vob) = world.npc_vob(entity) else { continue };
            let display = state.objects().npc(vob.script).map(|n| n.name.as_str()).unwrap_or("");
            let symbol =
                state.symbols().get(vob.instance_symbol).map(|s| s.name.as_str()).unwrap_or("");
            if contains_ignore_case(display, name_part) || contains_ignore_case(symbol, name_part) {
                out.insert(entity);
            }
        }
        out
    }

    /// Queue a manipulate message on the NPC's controller for this item.
    /// False (and no message) when the item has no use or equip behaviour.
    pub fn use_item_on(&mut self, world: &mut WorldInstance, item: ItemHandle, npc: Entity) -> bool {
        let Some(data) = self.vm.state().objects().item(item) else {
            return false;
        };
        let on_state = data.on_state_primary();
        let on_equip = data.on_equip;
        if on_state == 0 && on_equip == 0 {
            return false;
        }

        let kind = if on_state != 0 { ManipulateKind::UseItem } else { ManipulateKind::EquipItem };
        if !world.post_manipulate_message(npc, ManipulateMessage { target_item: item, kind }) {
            warn!(%item, "manipulate target has no message queue; message dropped");
        }
        true
    }

    /// Relay a quest-log entry onto the world's screen message feed.
    pub fn on_log_entry_added(&self, world: &mut WorldInstance, topic: &str, entry: &str) {
        world.print_screen_message(format!("Topic: {topic}"));
        world.print_screen_message(entry);
    }

    // ---------- diagnostics ----------

    pub fn stack_underflows(&self) -> u64 {
        self.stack_underflows
    }

    pub fn skipped_item_events(&self) -> u64 {
        self.skipped_item_events
    }

    pub fn set_profiling_enabled(&mut self, enabled: bool) {
        self.profiling_enabled = enabled;
    }

    pub fn on_frame_start(&mut self) {
        if self.profiling_enabled {
            self.profiler.on_frame_start();
        }
    }

    /// Top-N most expensive profiled functions, by name, averaged over the
    /// profiler's frame window.
    pub fn profile_report(&self) -> Vec<(String, Duration)> {
        let state = self.vm.state();
        self.profiler
            .report(self.config.profile_top_n)
            .into_iter()
            .map(|entry| {
                let name = state
                    .symbols()
                    .get(entry.symbol)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| format!("<sym {}>", entry.symbol));
                (name, entry.average)
            })
            .collect()
    }
}

fn body_mesh_visual(visual_change: &str) -> String {
    match visual_change.rfind('.') {
        Some(dot) => format!("{}{BODY_MESH_EXTENSION}", &visual_change[..dot]),
        None => format!("{visual_change}{BODY_MESH_EXTENSION}"),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}
