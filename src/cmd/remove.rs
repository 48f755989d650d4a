use clap::{App};

use crate::ctx::{Command, Context, PLATFORM, RunResult};
use crate::ext;

pub struct Remove;

impl Command for Remove {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Removes the notification service extension from the iOS project")
  }

  fn run(&self, ctx: &Context) -> RunResult {
    if !ctx.has_platform(PLATFORM) {
      tracing::debug!("Not building for {}, nothing to remove", PLATFORM);
      return Ok(());
    }

    let report = ext::uninstall(ctx)?;
    tracing::debug!("Deleted {} file(s)", report.deleted.len());
    Ok(())
  }
}
