use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use shrike_script::game_state::{ItemFlags, NpcData};
use shrike_script::vm::VmState;
use shrike_script::world::{BodyMesh, EquippedWeapon, ManipulateKind, MessageQueue, PlayerBindings};
use shrike_script::{ScriptEngine, Symbol, SymbolTable, Vm, Waynet, WorldInstance};

fn base_table() -> SymbolTable {
    let mut table = SymbolTable::new();
    table.insert(Symbol::instance("SELF", 0));
    table.insert(Symbol::instance("HERO", 0));
    table.insert(Symbol::instance("PC_HERO", 0));
    table
}

fn idle_engine(table: SymbolTable) -> ScriptEngine {
    ScriptEngine::new(Vm::new(table, |_: &mut VmState| false))
}

#[test]
fn constructed_npc_gets_an_entity_at_its_spawnpoint() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    let mut engine = idle_engine(table);

    let mut waynet = Waynet::new();
    waynet.add_waypoint("WP_GATE", Vec3::new(10.0, 0.0, -4.0), false);
    let mut world = WorldInstance::with_waynet(waynet);

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "WP_GATE").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity spawned");

    assert!(engine.world_npcs().contains(&entity));
    assert_eq!(engine.npc_of_entity(entity), Some(npc));
    assert_eq!(world.position_of(entity), Some(Vec3::new(10.0, 0.0, -4.0)));
}

#[test]
fn unknown_spawnpoint_is_tolerated() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "WP_DOES_NOT_EXIST").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity spawned despite bad spawnpoint");
    assert_eq!(world.position_of(entity), Some(Vec3::ZERO));
}

#[test]
fn daily_routine_runs_with_self_bound_to_the_npc() {
    let mut table = SymbolTable::new();
    let self_sym = table.insert(Symbol::instance("SELF", 0));
    table.insert(Symbol::instance("HERO", 0));
    table.insert(Symbol::instance("PC_HERO", 0));
    let guard_sym = table.insert(Symbol::instance("GRD_233_GUARD", 120));
    let routine_sym = table.insert(Symbol::func("RTN_GUARD_STAND", 220));

    let routine_context: Rc<RefCell<Option<(Option<usize>, bool)>>> = Rc::new(RefCell::new(None));
    let ctx = routine_context.clone();
    let vm = Vm::new(table, move |vm: &mut VmState| {
        match vm.program_counter() {
            // Instance constructor: declare the routine.
            Some(120) => {
                if let Some(current) = vm.current_instance() {
                    assert_eq!(current, guard_sym);
                }
                let npc = vm.binding(guard_sym).map(|(h, _)| h.as_npc()).expect("bound");
                if let Some(data) = vm.objects_mut().npc_mut(npc) {
                    data.daily_routine = routine_sym as u32;
                }
            }
            Some(220) => {
                let bound = vm.binding(self_sym).map(|(h, _)| h.as_npc());
                let npc = vm.binding(guard_sym).map(|(h, _)| h.as_npc());
                *ctx.borrow_mut() =
                    Some((vm.current_instance(), bound.is_some() && bound == npc));
            }
            _ => {}
        }
        vm.set_program_counter(None);
        false
    });

    let mut engine = ScriptEngine::new(vm);
    let mut world = WorldInstance::new();
    engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");

    let recorded = routine_context.borrow().clone().expect("routine dispatched");
    assert_eq!(recorded.0, Some(self_sym), "routine runs in the self instance context");
    assert!(recorded.1, "self must be bound to the constructed npc");
}

#[test]
fn player_instance_designation_end_to_end() {
    let mut engine = idle_engine(base_table());
    let mut waynet = Waynet::new();
    waynet.add_waypoint("WP_HERO_START", Vec3::new(1.0, 2.0, 3.0), true);
    let mut world = WorldInstance::with_waynet(waynet);

    let hero = engine.insert_npc(&mut world, "PC_HERO", "WP_HERO_START").expect("insert");
    let entity = engine.entity_of_npc(hero).expect("player entity");

    assert_eq!(engine.player_entity(), Some(entity), "entity designated as the controlled player");
    assert_eq!(world.key_binding_installs(), 1, "key bindings installed exactly once");
    assert!(world.world.get::<PlayerBindings>(entity).is_some());
    assert_eq!(engine.resolve_npc("hero").expect("hero symbol"), hero, "hero symbol rebound");
}

#[test]
fn armor_insertion_swaps_the_body_mesh() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    table.insert(Symbol::instance("ITAR_GUARD_ARMOR", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity");

    {
        let state = engine.vm_mut().state_mut();
        let sym = state.symbols().index_of("ITAR_GUARD_ARMOR").expect("symbol");
        let item = state.create_item(sym);
        let data = state.objects_mut().item_mut(item).expect("item data");
        data.main_flags = ItemFlags::ARMOR;
        data.visual_change = "ARMOR_GUARD.ASC".into();
        state.insert_inventory_item(item, npc);
    }
    engine.pump_events(&mut world);

    assert_eq!(
        world.world.get::<BodyMesh>(entity),
        Some(&BodyMesh("ARMOR_GUARD.MDM".into()))
    );
    assert!(world.world.get::<EquippedWeapon>(entity).is_none(), "armor is not a weapon");
}

#[test]
fn weapon_insertion_equips_the_wearer() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    table.insert(Symbol::instance("ITMW_SWORD", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity");

    let item = {
        let state = engine.vm_mut().state_mut();
        let sym = state.symbols().index_of("ITMW_SWORD").expect("symbol");
        let item = state.create_item(sym);
        state.objects_mut().item_mut(item).expect("item data").main_flags = ItemFlags::MELEE_WEAPON;
        state.insert_inventory_item(item, npc);
        item
    };
    engine.pump_events(&mut world);

    assert_eq!(world.world.get::<EquippedWeapon>(entity), Some(&EquippedWeapon(item)));
    assert!(world.world.get::<BodyMesh>(entity).is_none());
}

#[test]
fn item_insertion_for_an_unresolved_wearer_is_skipped() {
    let mut table = base_table();
    table.insert(Symbol::instance("ITMW_SWORD", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    // An npc record the bridge never saw an insertion event for, so it has
    // no world entity.
    let ghost = engine.vm_mut().state_mut().objects_mut().insert_npc(NpcData::default());
    {
        let state = engine.vm_mut().state_mut();
        let sym = state.symbols().index_of("ITMW_SWORD").expect("symbol");
        let item = state.create_item(sym);
        state.objects_mut().item_mut(item).expect("item data").main_flags = ItemFlags::MELEE_WEAPON;
        state.insert_inventory_item(item, ghost);
    }
    engine.pump_events(&mut world);

    assert_eq!(engine.skipped_item_events(), 1);
}

#[test]
fn use_item_on_requires_a_behaviour() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    table.insert(Symbol::instance("ITFO_APPLE", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity");

    let sym = engine.symbol_index("ITFO_APPLE").expect("symbol");
    let item = engine.vm_mut().state_mut().create_item(sym);

    assert!(!engine.use_item_on(&mut world, item, entity));
    let queue = world.world.get::<MessageQueue>(entity).expect("queue");
    assert!(queue.0.is_empty(), "unusable item must not dispatch a message");
}

#[test]
fn use_item_on_prefers_state_use_over_equip() {
    let mut table = base_table();
    table.insert(Symbol::instance("GRD_233_GUARD", 0));
    table.insert(Symbol::instance("ITFO_APPLE", 0));
    table.insert(Symbol::instance("ITMW_SWORD", 0));
    let mut engine = idle_engine(table);
    let mut world = WorldInstance::new();

    let npc = engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");
    let entity = engine.entity_of_npc(npc).expect("entity");

    let apple = {
        let state = engine.vm_mut().state_mut();
        let sym = state.symbols().index_of("ITFO_APPLE").expect("symbol");
        let item = state.create_item(sym);
        let data = state.objects_mut().item_mut(item).expect("item data");
        data.on_state.push(77);
        data.on_equip = 88;
        item
    };
    let sword = {
        let state = engine.vm_mut().state_mut();
        let sym = state.symbols().index_of("ITMW_SWORD").expect("symbol");
        let item = state.create_item(sym);
        state.objects_mut().item_mut(item).expect("item data").on_equip = 99;
        item
    };

    assert!(engine.use_item_on(&mut world, apple, entity));
    assert!(engine.use_item_on(&mut world, sword, entity));

    let queue = world.world.get::<MessageQueue>(entity).expect("queue");
    assert_eq!(queue.0.len(), 2, "each usable item dispatches exactly one message");
    assert_eq!(queue.0[0].kind, ManipulateKind::UseItem, "state use wins when both exist");
    assert_eq!(queue.0[0].target_item, apple);
    assert_eq!(queue.0[1].kind, ManipulateKind::EquipItem);
    assert_eq!(queue.0[1].target_item, sword);
}

#[test]
fn log_entries_reach_the_screen_message_feed() {
    let engine = idle_engine(base_table());
    let mut world = WorldInstance::new();

    engine.on_log_entry_added(&mut world, "Buddler", "Found the old mine entrance.");

    assert_eq!(
        world.screen_messages(),
        ["Topic: Buddler".to_string(), "Found the old mine entrance.".to_string()]
    );
}
