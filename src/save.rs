use serde::{Deserialize, Serialize};

use crate::error::{Result, ScriptError};
use crate::symbols::{SymbolTable, SymbolType};

/// One persisted global: symbol name and one payload element. Array globals
/// contribute one entry per element, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalEntry(pub String, pub i32);

/// The save-game subset of the symbol table: every plain integer global
/// without storage flags. Flagged, const and non-integer symbols are
/// excluded by design.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGlobals {
    pub globals: Vec<GlobalEntry>,
}

pub fn export_globals(symbols: &SymbolTable) -> SavedGlobals {
    let mut globals = Vec::new();
    for symbol in symbols.iter() {
        if symbol.ty == SymbolType::Int && symbol.flags.is_empty() {
            for &value in &symbol.int_data {
                globals.push(GlobalEntry(symbol.name.clone(), value));
            }
        }
    }
    SavedGlobals { globals }
}

/// Replay a saved snapshot into the symbol table. The first entry for a
/// name clears that symbol's payload; every entry then appends, so array
/// globals rebuild element by element from the entry order.
pub fn import_globals(symbols: &mut SymbolTable, saved: &SavedGlobals) -> Result<()> {
    for GlobalEntry(name, _) in &saved.globals {
        symbols
            .by_name_mut(name)
            .ok_or_else(|| ScriptError::UnknownSymbol(name.clone()))?
            .int_data
            .clear();
    }
    for GlobalEntry(name, value) in &saved.globals {
        symbols
            .by_name_mut(name)
            .ok_or_else(|| ScriptError::UnknownSymbol(name.clone()))?
            .int_data
            .push(*value);
    }
    Ok(())
}
