use crate::types::*;
use std::{
    env,
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

pub fn data_root() -> PathBuf {
  match env_default("ARENA_DATA_DIR") {
    Some(dir) => PathBuf::from(dir),
    None => PathBuf::from(env!("CARGO_MANIFEST_DIR")),
  }
}

pub fn resolve_data_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw.trim());
  if path.is_absolute() {
    path
  } else {
    data_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  data_root().join("config.json")
}

pub fn logs_dir() -> PathBuf {
  data_root().join("logs")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if let Some(value) = env_default("ARENA_WATCHER_LOG") {
    config.watcher_log_path = value;
  }
  if let Some(value) = env_default("ARENA_LISTEN_ADDR") {
    config.listen_addr = value;
  }
  if config.characters.is_empty() {
    if let Some(value) = env_default("ARENA_CHARACTERS") {
      config.characters = parse_list(&value);
    }
  }
  if config.stages.is_empty() {
    if let Some(value) = env_default("ARENA_STAGES") {
      config.stages = parse_list(&value);
    }
  }
  config
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(&path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn save_config_inner(config: AppConfig) -> Result<AppConfig, String> {
  let path = config_path();
  let payload = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
  fs::write(&path, payload).map_err(|e| format!("write config {}: {e}", path.display()))?;
  Ok(config)
}

pub fn load_env_file() {
  let env_path = data_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

/// Comma separated roster/stage lists from the environment.
pub fn parse_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(|part| part.trim())
    .filter(|part| !part.is_empty())
    .map(|part| part.to_string())
    .collect()
}

pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

pub fn normalize_name_key(raw: &str) -> String {
  raw.trim().to_lowercase()
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  if config.characters.is_empty() {
    warnings.push("no characters configured (config.json or ARENA_CHARACTERS); random tournaments will fail".to_string());
  }
  if config.stages.is_empty() {
    warnings.push("no stages configured (config.json or ARENA_STAGES); matches will start without a stage".to_string());
  }
  if crate::bracket::SUPPORTED_SIZES.binary_search(&config.tournament_size).is_err() {
    warnings.push(format!(
      "tournamentSize {} is not 4, 8, 16 or 32; random tournaments will be rejected",
      config.tournament_size
    ));
  }
  let watcher_dir = resolve_data_path(&config.watcher_log_path)
    .parent()
    .map(|dir| dir.to_path_buf());
  if let Some(dir) = watcher_dir {
    if !dir.as_os_str().is_empty() && !dir.is_dir() {
      warnings.push(format!("watcher log directory {} does not exist", dir.display()));
    }
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}
