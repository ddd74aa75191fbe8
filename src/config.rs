use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    /// Quiet period before an edit is saved
    pub debounce_ms: Option<u64>,
    /// How long `Saved`/`Save failed` stays up
    pub cooldown_ms: Option<u64>,
    pub read_only: bool,
    /// Print Markdown rather than the JSON tree
    pub markdown_only: bool,
}

impl ConfigFlags {
    /// Merge with `other` taking precedence for valued options.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            cooldown_ms: other.cooldown_ms.or(self.cooldown_ms),
            read_only: self.read_only || other.read_only,
            markdown_only: self.markdown_only || other.markdown_only,
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("notesync").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("notesync")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("notesync").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("notesync").join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".notesyncrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Global file first, then the local override on top.
pub fn load_effective_flags() -> Result<ConfigFlags> {
    let global = load_config_flags(&global_config_path())?;
    let local = load_config_flags(&local_override_path())?;
    Ok(global.union(&local))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# notesync defaults (saved with --save)".to_string()];
    if let Some(ms) = flags.debounce_ms {
        lines.push(format!("--debounce-ms {ms}"));
    }
    if let Some(ms) = flags.cooldown_ms {
        lines.push(format!("--cooldown-ms {ms}"));
    }
    if flags.read_only {
        lines.push("--read-only".to_string());
    }
    if flags.markdown_only {
        lines.push("--markdown".to_string());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n"))).with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick known flags out of a token list; anything else is skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "--read-only" => flags.read_only = true,
            "--markdown" => flags.markdown_only = true,
            "--debounce-ms" | "--cooldown-ms" => {
                if let Some(value) = tokens.get(i + 1).and_then(|v| v.parse().ok()) {
                    set_duration(&mut flags, token, value);
                    i += 1;
                }
            }
            _ => {
                if let Some((name, value)) = token.split_once('=')
                    && let Ok(value) = value.parse()
                {
                    set_duration(&mut flags, name, value);
                }
            }
        }
        i += 1;
    }
    flags
}

fn set_duration(flags: &mut ConfigFlags, name: &str, ms: u64) {
    match name {
        "--debounce-ms" => flags.debounce_ms = Some(ms),
        "--cooldown-ms" => flags.cooldown_ms = Some(ms),
        _ => {}
    }
}
