use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::CalendarPolicy;
use crate::datetime::parse_timezone;
use crate::task::DEFAULT_COLOR;

const CONFIG_ENV_VAR: &str =
  "DOCKET_CONFIG";
const CONFIG_FILE_NAME: &str =
  "config.toml";
const APP_DIR_NAME: &str = "docket";

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub data_dir:      Option<PathBuf>,
  pub timezone:      Option<String>,
  pub default_color: String,
  pub color:         bool,
  pub calendar:      CalendarPolicy,
  #[serde(skip)]
  pub loaded_files:  Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir:      None,
      timezone:      None,
      default_color: DEFAULT_COLOR
        .to_string(),
      color:         true,
      calendar:
        CalendarPolicy::default(),
      loaded_files:  vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    if let Some(path) = config_override
    {
      info!(config = %path.display(), "loading explicit config");
      return Self::load_file(path);
    }

    match resolve_config_path() {
      | Some(path) if path.exists() => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)
      }
      | Some(path) => {
        warn!(
          config = %path.display(),
          "no config file found; using defaults"
        );
        Ok(Self::default())
      }
      | None => {
        warn!(
          "config disabled; using \
           defaults"
        );
        Ok(Self::default())
      }
    }
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Self =
      toml::from_str(raw)
        .context("invalid config")?;
    cfg.calendar =
      cfg.calendar.sanitized();
    Ok(cfg)
  }

  #[tracing::instrument]
  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  /// Applies `KEY=VALUE` overrides on
  /// top of whatever the file set.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k.trim();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");
      match key {
        | "data_dir" => {
          self.data_dir =
            Some(PathBuf::from(value));
        }
        | "timezone" => {
          self.timezone =
            (!value.is_empty())
              .then(|| value.to_string());
        }
        | "default_color" => {
          self.default_color =
            value.to_string();
        }
        | "color" => {
          self.color = parse_bool(value);
        }
        | "calendar.max_markers" => {
          self.calendar.max_markers =
            value.parse().with_context(
              || {
                format!(
                  "invalid {key}: \
                   {value}"
                )
              }
            )?;
        }
        | "calendar.marker_stagger_px" => {
          self
            .calendar
            .marker_stagger_px = value
            .parse()
            .with_context(|| {
              format!(
                "invalid {key}: {value}"
              )
            })?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: {other}"
          ));
        }
      }
    }
    self.calendar =
      self.calendar.sanitized();
    Ok(())
  }

  pub fn timezone(&self) -> Option<Tz> {
    self.timezone.as_deref().and_then(
      |raw| parse_timezone(raw, "config")
    )
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.data_dir.as_deref()
  {
    expand_tilde(cfg_value)
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_config_path()
-> Option<PathBuf> {
  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return None;
    }
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir
      .join(APP_DIR_NAME)
      .join(CONFIG_FILE_NAME)
  })
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let base = dirs::data_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine data \
         directory"
      )
    })?;
  Ok(base.join(APP_DIR_NAME))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
  {
    if let Some(home) = dirs::home_dir()
    {
      return home.join(rest);
    }
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
