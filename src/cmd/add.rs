use clap::{App};

use crate::ctx::{Command, Context, PLATFORM, RunResult};
use crate::ext::{self, Outcome};
use crate::podfile::Pods;

pub struct Add;

impl Command for Add {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Adds the notification service extension to the iOS project")
  }

  fn run(&self, ctx: &Context) -> RunResult {
    if !ctx.has_platform(PLATFORM) {
      tracing::debug!("Not building for {}, nothing to add", PLATFORM);
      return Ok(());
    }

    match ext::install(ctx, &Pods::new(ctx.pod_timeout()))? {
      Outcome::Foreign       => tracing::info!("No notification service extension added"),
      Outcome::Reconciled(n) => tracing::debug!("Updated {} bundle identifier(s)", n),
      Outcome::Installed(_)  => {}
    }
    Ok(())
  }
}
