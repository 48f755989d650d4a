use clap::{App};
use std::fmt::Write;

use crate::ctx::{Command, Context, RunResult};
use crate::ext::{ENVIRONMENTS, EXTENSION_NAME};
use crate::pbx::unquote;
use crate::project::{APP_EXTENSION_TYPE, Entry, Project};

pub struct Show;

impl Command for Show {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Displays the app and extension targets of the iOS project")
  }

  fn run(&self, ctx: &Context) -> RunResult {
    let project = ctx.read_project()?;
    print!("{}", describe(&project));
    Ok(())
  }
}

fn describe(project: &Project) -> String {
  let mut s = String::new();
  let mut targets = Vec::new();

  if let Some(app) = project.app_target_id() {
    targets.extend(project.native_targets().get_key_value(app).map(|(id, object)| Entry { id, object }));
  }
  targets.extend(project.find_targets_by_product_type(APP_EXTENSION_TYPE));

  // Writing to a String cannot fail.
  let _ = writeln!(s, "{}", project.path().display());
  for target in targets {
    let name = target.name().map(unquote).unwrap_or(target.id);
    let mark = match name == EXTENSION_NAME {
      true  => " (WonderPush)",
      false => ""
    };

    let _ = writeln!(s, "{} {}{}", target.id, name, mark);
    for env in ENVIRONMENTS {
      let id = project.bundle_identifier_of(target.id, env).map(unquote).unwrap_or("-");
      let _ = writeln!(s, "  {:<8} {}", env, id);
    }
  }

  s
}
