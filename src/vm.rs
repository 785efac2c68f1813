use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::events::VmEvent;
use crate::game_state::{GameObjects, ItemData, NpcData};
use crate::handles::{InstanceClass, InstanceHandle, ItemHandle, NpcHandle};
use crate::symbols::SymbolTable;

/// One value on the VM operand stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    Int(i32),
    Str(String),
    /// Reference to a symbol's data payload.
    Var { symbol: usize, array_index: u32 },
}

/// The mutable execution context of the VM: operand stack, placed call,
/// call trace, current-instance register and the instance binding map.
///
/// Snapshots of this whole value are what make nested invocation safe: a
/// caller's run-state is cloned onto the save-stack before a call and
/// restored afterwards, no matter what the callee did to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmRunState {
    pub stack: Vec<StackValue>,
    pub program_counter: Option<u32>,
    pub call_trace: Vec<u32>,
    pub current_instance: Option<usize>,
    pub bindings: HashMap<usize, (InstanceHandle, InstanceClass)>,
}

/// The out-of-scope bytecode interpreter, behind a one-method seam. A step
/// executes some instructions against the VM state and reports whether more
/// are pending. Instruction semantics live entirely on the other side.
pub trait Interpreter {
    fn step(&mut self, vm: &mut VmState) -> bool;
}

impl<F> Interpreter for F
where
    F: FnMut(&mut VmState) -> bool,
{
    fn step(&mut self, vm: &mut VmState) -> bool {
        self(vm)
    }
}

/// Everything the interpreter and the host share: symbol table, run-state
/// with its save-stack, the VM object store and the queue of raised events.
#[derive(Debug)]
pub struct VmState {
    symbols: SymbolTable,
    run: VmRunState,
    saved: Vec<VmRunState>,
    objects: GameObjects,
    events: VecDeque<VmEvent>,
    steps_executed: u64,
}

impl VmState {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            run: VmRunState::default(),
            saved: Vec::new(),
            objects: GameObjects::new(),
            events: VecDeque::new(),
            steps_executed: 0,
        }
    }

    // ---------- run-state snapshots ----------

    /// Push a copy of the current run-state onto the save-stack.
    pub fn push_state(&mut self) {
        self.saved.push(self.run.clone());
    }

    /// Restore the most recently saved run-state. Restoring with nothing
    /// saved indicates a mispaired prepare/run; the current state is kept.
    pub fn pop_state(&mut self) {
        debug_assert!(!self.saved.is_empty(), "pop_state without matching push_state");
        match self.saved.pop() {
            Some(prev) => self.run = prev,
            None => warn!("vm state restore without a saved snapshot"),
        }
    }

    pub fn save_depth(&self) -> usize {
        self.saved.len()
    }

    pub fn run_state(&self) -> &VmRunState {
        &self.run
    }

    // ---------- operand stack ----------

    pub fn push_int(&mut self, value: i32) {
        self.run.stack.push(StackValue::Int(value));
    }

    pub fn push_string(&mut self, value: impl Into<String>) {
        self.run.stack.push(StackValue::Str(value.into()));
    }

    pub fn push_var(&mut self, symbol: usize, array_index: u32) {
        self.run.stack.push(StackValue::Var { symbol, array_index });
    }

    /// Pop one value as an integer. Variable references read the referenced
    /// payload element; a missing element or a string reads as 0.
    pub fn pop_value(&mut self) -> Option<i32> {
        match self.run.stack.pop()? {
            StackValue::Int(v) => Some(v),
            StackValue::Var { symbol, array_index } => Some(
                self.symbols
                    .get(symbol)
                    .and_then(|s| s.int_data.get(array_index as usize))
                    .copied()
                    .unwrap_or(0),
            ),
            StackValue::Str(_) => Some(0),
        }
    }

    pub fn stack_is_empty(&self) -> bool {
        self.run.stack.is_empty()
    }

    pub fn stack_depth(&self) -> usize {
        self.run.stack.len()
    }

    // ---------- call placement ----------

    pub fn program_counter(&self) -> Option<u32> {
        self.run.program_counter
    }

    pub fn set_program_counter(&mut self, address: Option<u32>) {
        self.run.program_counter = address;
    }

    /// Record a nested script call for diagnostics.
    pub fn record_call(&mut self, address: u32) {
        self.run.call_trace.push(address);
    }

    pub fn clear_call_trace(&mut self) {
        self.run.call_trace.clear();
    }

    // ---------- instance bindings ----------

    pub fn current_instance(&self) -> Option<usize> {
        self.run.current_instance
    }

    pub fn set_current_instance(&mut self, symbol: Option<usize>) {
        self.run.current_instance = symbol;
    }

    pub fn bind_instance(&mut self, symbol: usize, handle: InstanceHandle, class: InstanceClass) {
        self.run.bindings.insert(symbol, (handle, class));
    }

    pub fn binding(&self, symbol: usize) -> Option<(InstanceHandle, InstanceClass)> {
        self.run.bindings.get(&symbol).copied()
    }

    // ---------- symbol table / object store ----------

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn objects(&self) -> &GameObjects {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut GameObjects {
        &mut self.objects
    }

    // ---------- object lifecycle entry points ----------

    /// Mint an NPC record for the given instance symbol, bind the symbol to
    /// the new handle and raise the insertion event. Called by the external
    /// world-insert function and by host-origin spawning.
    pub fn insert_npc(&mut self, instance_symbol: usize, spawnpoint: impl Into<String>) -> NpcHandle {
        let name = self
            .symbols
            .get(instance_symbol)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let handle = self.objects.insert_npc(NpcData { instance_symbol, name, ..NpcData::default() });
        self.bind_instance(instance_symbol, handle.into(), InstanceClass::Npc);
        self.events.push_back(VmEvent::NpcInserted { npc: handle, spawnpoint: spawnpoint.into() });
        handle
    }

    /// Raise the post-construction event, after the instance constructor has
    /// run and the NPC's data fields are final.
    pub fn finalize_npc(&mut self, npc: NpcHandle) {
        self.events.push_back(VmEvent::NpcInitialized { npc });
    }

    /// Mint an item record and bind its instance symbol. No event is raised
    /// until the item lands in an inventory.
    pub fn create_item(&mut self, instance_symbol: usize) -> ItemHandle {
        let name = self
            .symbols
            .get(instance_symbol)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let handle = self.objects.insert_item(ItemData { instance_symbol, name, ..ItemData::default() });
        self.bind_instance(instance_symbol, handle.into(), InstanceClass::Item);
        handle
    }

    pub fn insert_inventory_item(&mut self, item: ItemHandle, npc: NpcHandle) {
        self.events.push_back(VmEvent::InventoryItemInserted { item, npc });
    }

    // ---------- events / accounting ----------

    pub fn take_event(&mut self) -> Option<VmEvent> {
        self.events.pop_front()
    }

    pub fn steps_executed(&self) -> u64 {
        self.steps_executed
    }

    pub(crate) fn count_step(&mut self) {
        self.steps_executed += 1;
    }
}

/// The VM collaborator: shared state plus the interpreter driving it.
pub struct Vm {
    state: VmState,
    interpreter: Box<dyn Interpreter>,
}

impl Vm {
    pub fn new(symbols: SymbolTable, interpreter: impl Interpreter + 'static) -> Self {
        Self { state: VmState::new(symbols), interpreter: Box::new(interpreter) }
    }

    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut VmState {
        &mut self.state
    }

    /// Execute one interpreter step. Returns whether instructions are still
    /// pending.
    pub fn step(&mut self) -> bool {
        self.state.count_step();
        self.interpreter.step(&mut self.state)
    }

    pub fn steps_executed(&self) -> u64 {
        self.state.steps_executed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbol;

    fn idle() -> impl Interpreter {
        |_: &mut VmState| false
    }

    #[test]
    fn snapshot_restores_stack_and_bindings() {
        let mut table = SymbolTable::new();
        let sym = table.insert(Symbol::instance("SELF", 0));
        let mut vm = Vm::new(table, idle());
        let state = vm.state_mut();

        state.push_int(7);
        state.push_state();
        state.push_int(99);
        state.push_string("junk");
        state.bind_instance(sym, NpcHandle::from_index(3).into(), InstanceClass::Npc);
        state.set_current_instance(Some(sym));
        state.pop_state();

        assert_eq!(state.stack_depth(), 1);
        assert_eq!(state.pop_value(), Some(7));
        assert_eq!(state.binding(sym), None);
        assert_eq!(state.current_instance(), None);
    }

    #[test]
    fn pop_value_reads_through_var_references() {
        let mut table = SymbolTable::new();
        let sym = table.insert(Symbol::int("COUNTER", [10, 20, 30]));
        let mut vm = Vm::new(table, idle());
        let state = vm.state_mut();

        state.push_var(sym, 2);
        assert_eq!(state.pop_value(), Some(30));
        state.push_var(sym, 9);
        assert_eq!(state.pop_value(), Some(0));
    }

    #[test]
    fn insert_npc_binds_symbol_and_queues_event() {
        let mut table = SymbolTable::new();
        let sym = table.insert(Symbol::instance("GRD_233", 0));
        let mut vm = Vm::new(table, idle());
        let state = vm.state_mut();

        let npc = state.insert_npc(sym, "WP_GATE");
        assert_eq!(state.binding(sym), Some((npc.into(), InstanceClass::Npc)));
        assert_eq!(
            state.take_event(),
            Some(VmEvent::NpcInserted { npc, spawnpoint: "WP_GATE".into() })
        );
        assert_eq!(state.objects().npc(npc).map(|n| n.name.as_str()), Some("GRD_233"));
    }

    #[test]
    fn steps_are_counted_per_interpreter_invocation() {
        let mut remaining = 3;
        let mut vm = Vm::new(SymbolTable::new(), move |_: &mut VmState| {
            remaining -= 1;
            remaining > 0
        });
        while vm.step() {}
        assert_eq!(vm.steps_executed(), 3);
    }
}
