pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datekey;
pub mod greeting;
pub mod planner;
pub mod render;
pub mod session;
pub mod stats;
pub mod storage;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.almanacrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

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
    storage::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open store at {}",
          data_dir.display()
        )
      })?;

  let timezone = cfg.timezone()?;
  let env = commands::CommandEnv {
    cfg:        &cfg,
    today:      datekey::today(timezone),
    hour:       greeting::current_hour(
      timezone
    ),
    week_start: cfg.week_start()
  };
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(store, &env, inv)?;

  info!("done");
  Ok(())
}
