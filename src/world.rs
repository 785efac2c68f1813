use std::collections::{HashMap, VecDeque};

use bevy_ecs::prelude::{Component, Entity, World};
use glam::Vec3;

use crate::handles::{ItemHandle, NpcHandle};

// ---------- Components ----------

#[derive(Component, Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: 0.0 }
    }
}

/// Links a world entity back to its script-side NPC record.
#[derive(Component, Clone, Copy, Debug)]
pub struct NpcVob {
    pub script: NpcHandle,
    pub instance_symbol: usize,
}

#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct BodyMesh(pub String);

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EquippedWeapon(pub ItemHandle);

/// Marker for an entity whose controller has player input bindings
/// installed.
#[derive(Component, Clone, Copy, Debug)]
pub struct PlayerBindings;

/// Per-NPC controller inbox. Messages are applied by the controller on its
/// own update, not by the sender.
#[derive(Component, Debug, Default)]
pub struct MessageQueue(pub VecDeque<ManipulateMessage>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipulateKind {
    UseItem,
    EquipItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManipulateMessage {
    pub target_item: ItemHandle,
    pub kind: ManipulateKind,
}

// ---------- Waypoint graph ----------

#[derive(Debug, Clone)]
pub struct Waypoint {
    pub name: String,
    pub position: Vec3,
    pub is_start: bool,
}

/// Named waypoint graph of the loaded world. Names are case-insensitive,
/// matching the script tables that reference them.
#[derive(Debug, Clone, Default)]
pub struct Waynet {
    waypoints: Vec<Waypoint>,
    by_name: HashMap<String, usize>,
}

impl Waynet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waypoint(&mut self, name: impl Into<String>, position: Vec3, is_start: bool) -> usize {
        let name = name.into().to_ascii_uppercase();
        let index = self.waypoints.len();
        self.by_name.insert(name.clone(), index);
        self.waypoints.push(Waypoint { name, position, is_start });
        index
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_ascii_uppercase())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn start_points(&self) -> Vec<usize> {
        (0..self.waypoints.len()).filter(|&i| self.waypoints[i].is_start).collect()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Free,
    FirstPerson,
    ThirdPerson,
}

// ---------- World facade ----------

/// The narrow world surface the script bridge talks to: entity spawn and
/// placement, the waypoint graph, controller inboxes, camera mode and the
/// on-screen message feed. The entity store itself is a plain bevy_ecs
/// world, exposed for host systems that need richer queries.
pub struct WorldInstance {
    pub world: World,
    waynet: Waynet,
    camera_mode: CameraMode,
    screen_messages: Vec<String>,
    key_binding_installs: u32,
}

impl WorldInstance {
    pub fn new() -> Self {
        Self::with_waynet(Waynet::new())
    }

    pub fn with_waynet(waynet: Waynet) -> Self {
        Self {
            world: World::new(),
            waynet,
            camera_mode: CameraMode::default(),
            screen_messages: Vec::new(),
            key_binding_installs: 0,
        }
    }

    pub fn waynet(&self) -> &Waynet {
        &self.waynet
    }

    pub fn waynet_mut(&mut self) -> &mut Waynet {
        &mut self.waynet
    }

    pub fn spawn_npc(&mut self, script: NpcHandle, instance_symbol: usize) -> Entity {
        self.world
            .spawn((Transform::default(), NpcVob { script, instance_symbol }, MessageQueue::default()))
            .id()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    pub fn position_of(&self, entity: Entity) -> Option<Vec3> {
        self.world.get::<Transform>(entity).map(|t| t.translation)
    }

    pub fn set_position(&mut self, entity: Entity, position: Vec3) -> bool {
        match self.world.get_mut::<Transform>(entity) {
            Some(mut transform) => {
                transform.translation = position;
                true
            }
            None => false,
        }
    }

    pub fn teleport_to_waypoint(&mut self, entity: Entity, waypoint: usize) -> bool {
        match self.waynet.waypoint(waypoint) {
            Some(wp) => {
                let position = wp.position;
                self.set_position(entity, position)
            }
            None => false,
        }
    }

    pub fn npc_vob(&self, entity: Entity) -> Option<&NpcVob> {
        self.world.get::<NpcVob>(entity)
    }

    pub fn set_body_mesh(&mut self, entity: Entity, mesh: impl Into<String>) -> bool {
        match self.world.get_entity_mut(entity) {
            Ok(mut e) => {
                e.insert(BodyMesh(mesh.into()));
                true
            }
            Err(_) => false,
        }
    }

    pub fn equip_weapon(&mut self, entity: Entity, item: ItemHandle) -> bool {
        match self.world.get_entity_mut(entity) {
            Ok(mut e) => {
                e.insert(EquippedWeapon(item));
                true
            }
            Err(_) => false,
        }
    }

    pub fn post_manipulate_message(&mut self, entity: Entity, message: ManipulateMessage) -> bool {
        match self.world.get_mut::<MessageQueue>(entity) {
            Some(mut queue) => {
                queue.0.push_back(message);
                true
            }
            None => false,
        }
    }

    pub fn setup_key_bindings(&mut self, entity: Entity) {
        if let Ok(mut e) = self.world.get_entity_mut(entity) {
            e.insert(PlayerBindings);
            self.key_binding_installs += 1;
        }
    }

    pub fn key_binding_installs(&self) -> u32 {
        self.key_binding_installs
    }

    pub fn set_camera_mode(&mut self, mode: CameraMode) {
        self.camera_mode = mode;
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.camera_mode
    }

    pub fn print_screen_message(&mut self, message: impl Into<String>) {
        self.screen_messages.push(message.into());
    }

    pub fn screen_messages(&self) -> &[String] {
        &self.screen_messages
    }
}

impl Default for WorldInstance {
    fn default() -> Self {
        Self::new()
    }
}
