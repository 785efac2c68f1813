use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Fatal precondition violations. Hitting one of these means the loaded
/// script tables do not match what the host expects (a corrupted or
/// mismatched script file), not a runtime condition to recover from.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("unknown script symbol '{0}'")]
    UnknownSymbol(String),

    #[error("script symbol index {0} out of range")]
    UnknownSymbolIndex(usize),
}
