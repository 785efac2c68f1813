use crate::config::ScriptConfigOverrides;
use anyhow::{anyhow, bail, Result};
use std::env;
use std::path::PathBuf;

/// Command-line switches of the script bridge. `--fallback-spawn` bypasses
/// the normal startup_*/init_* invocation and inserts the configured
/// fallback NPC instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config_path: Option<PathBuf>,
    fallback_spawn: bool,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --config <path> or --fallback-spawn.");
            }
            match &flag[2..] {
                "config" => {
                    let value =
                        iter.next().ok_or_else(|| anyhow!("Expected a path after '{flag}'"))?;
                    overrides.config_path = Some(PathBuf::from(value.as_ref()));
                }
                "fallback-spawn" => {
                    overrides.fallback_spawn = true;
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --fallback-spawn."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    pub fn into_config_overrides(self) -> ScriptConfigOverrides {
        ScriptConfigOverrides { fallback_spawn: self.fallback_spawn.then_some(true) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_path_and_fallback_flag() {
        let args = ["app", "--config", "scripts.json", "--fallback-spawn"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.config_path(), Some(&PathBuf::from("scripts.json")));
        assert_eq!(overrides.into_config_overrides().fallback_spawn, Some(true));
    }

    #[test]
    fn absent_flag_leaves_override_unset() {
        let overrides = CliOverrides::parse(["app"]).expect("parse overrides");
        assert_eq!(overrides.into_config_overrides().fallback_spawn, None);
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--config"]).unwrap_err();
        assert!(err.to_string().contains("Expected a path"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOverrides::parse(["app", "--teleport", "now"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }
}
