pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod game_state;
pub mod handles;
pub mod profiling;
pub mod save;
pub mod symbols;
pub mod vm;
pub mod world;

pub use config::ScriptConfig;
pub use engine::ScriptEngine;
pub use error::{Result, ScriptError};
pub use events::VmEvent;
pub use handles::{InstanceClass, InstanceHandle, ItemHandle, NpcHandle};
pub use symbols::{Symbol, SymbolFlags, SymbolTable, SymbolType};
pub use vm::{Interpreter, StackValue, Vm, VmRunState, VmState};
pub use world::{CameraMode, Waynet, WorldInstance};
