use glam::Vec3;
use shrike_script::vm::VmState;
use shrike_script::{ScriptEngine, Symbol, SymbolTable, Vm, WorldInstance};

fn engine_with_npcs(names: &[&str]) -> ScriptEngine {
    let mut table = SymbolTable::new();
    table.insert(Symbol::instance("SELF", 0));
    table.insert(Symbol::instance("HERO", 0));
    table.insert(Symbol::instance("PC_HERO", 0));
    for name in names {
        table.insert(Symbol::instance(*name, 0));
    }
    ScriptEngine::new(Vm::new(table, |_: &mut VmState| false))
}

#[test]
fn radius_query_excludes_the_exact_boundary() {
    let mut engine = engine_with_npcs(&["NPC_A", "NPC_B", "NPC_C"]);
    let mut world = WorldInstance::new();

    let a = engine.insert_npc(&mut world, "NPC_A", "").expect("insert");
    let b = engine.insert_npc(&mut world, "NPC_B", "").expect("insert");
    let c = engine.insert_npc(&mut world, "NPC_C", "").expect("insert");
    let (a, b, c) = (
        engine.entity_of_npc(a).expect("entity"),
        engine.entity_of_npc(b).expect("entity"),
        engine.entity_of_npc(c).expect("entity"),
    );

    world.set_position(a, Vec3::new(1.0, 1.0, 0.0));
    // Exactly at distance 5 from the center: must be excluded.
    world.set_position(b, Vec3::new(3.0, 4.0, 0.0));
    world.set_position(c, Vec3::new(6.0, 0.0, 0.0));

    let hits = engine.npcs_in_radius(&world, Vec3::ZERO, 5.0);
    assert!(hits.contains(&a));
    assert!(!hits.contains(&b), "boundary member at exactly the radius is excluded");
    assert!(!hits.contains(&c));
    assert_eq!(hits.len(), 1);
}

#[test]
fn name_search_matches_display_and_symbol_names() {
    let mut engine = engine_with_npcs(&["GRD_233_GUARD", "VLK_408_FARMER"]);
    let mut world = WorldInstance::new();

    let guard = engine.insert_npc(&mut world, "GRD_233_GUARD", "").expect("insert");
    let farmer = engine.insert_npc(&mut world, "VLK_408_FARMER", "").expect("insert");
    engine
        .vm_mut()
        .state_mut()
        .objects_mut()
        .npc_mut(farmer)
        .expect("npc data")
        .name = "Diego".into();

    let guard_entity = engine.entity_of_npc(guard).expect("entity");
    let farmer_entity = engine.entity_of_npc(farmer).expect("entity");

    let by_symbol = engine.find_npcs_name_like(&world, "guard");
    assert!(by_symbol.contains(&guard_entity));
    assert!(!by_symbol.contains(&farmer_entity));

    let by_display = engine.find_npcs_name_like(&world, "dieg");
    assert!(by_display.contains(&farmer_entity));
    assert!(!by_display.contains(&guard_entity));
}

#[test]
fn item_and_mob_registries_are_idempotent_sets() {
    let mut engine = engine_with_npcs(&[]);
    let mut world = WorldInstance::new();
    let chest = world.world.spawn_empty().id();

    engine.register_item(chest);
    engine.register_item(chest);
    assert_eq!(engine.world_items().len(), 1);

    engine.register_mob(chest);
    assert_eq!(engine.world_mobs().len(), 1);

    engine.unregister_item(chest);
    engine.unregister_item(chest);
    assert!(engine.world_items().is_empty());

    engine.unregister_mob(chest);
    assert!(engine.world_mobs().is_empty());
}

#[test]
fn destroy_notification_clears_every_reference() {
    let mut engine = engine_with_npcs(&[]);
    let mut world = WorldInstance::new();

    let hero = engine.insert_npc(&mut world, "PC_HERO", "").expect("insert");
    let entity = engine.entity_of_npc(hero).expect("entity");
    assert_eq!(engine.player_entity(), Some(entity));

    world.despawn(entity);
    engine.on_entity_destroyed(entity);

    assert!(engine.world_npcs().is_empty());
    assert_eq!(engine.entity_of_npc(hero), None);
    assert_eq!(engine.npc_of_entity(entity), None);
    assert_eq!(engine.player_entity(), None, "destroying the player clears the designation");
}
