use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod dispatch;
mod error;
mod ext;
mod http;
mod logging;
mod merge;
mod model;
mod pipeline;
mod report;
mod store;
mod summary;
#[cfg(test)]
mod testing;
mod tracker;
mod util;

use crate::cli::{normalize, Cli};

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(ExitCode::SUCCESS);
  }

  logging::init(cli.log_level);

  // Phase 1: normalize CLI
  let cfg = normalize(cli)?;
  tracing::debug!(config = %serde_json::to_string(&cfg)?, "effective config");

  // Phase 2: run the action
  let out = commands::execute(&cfg)?;
  println!("{}", out.stdout.trim_end());

  Ok(if out.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
