pub mod app;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod list_view;
pub mod navigation;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use app::{
  Tracker,
  Views
};
pub use error::TrackerError;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting docket CLI"
  );
  debug!(overrides = ?cli.overrides, "config overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let today = datetime::today_in(
    cfg.timezone().as_ref(),
    Utc::now()
  );
  debug!(%today, "resolved today");

  let mut tracker = Tracker::open(
    store,
    today,
    cfg.calendar
  )?;

  let renderer =
    render::Renderer::new(&cfg);

  if let Err(err) = commands::dispatch(
    &mut tracker,
    &cfg,
    &renderer,
    cli.command,
    cli.json
  ) {
    if cli.json {
      println!(
        "{}",
        serde_json::to_string_pretty(
          &commands::error_envelope(
            &err
          )
        )?
      );
    }
    return Err(err);
  }

  info!("done");
  Ok(())
}
