mod cmd;
mod ctx;
mod ext;
mod pbx;
mod podfile;
mod project;

use clap::{Arg, App, AppSettings, SubCommand};
use std::fmt::Display;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
  // Initialize.
  let commands = cmd::init();

  // Parse the command line.
  let args = App::new(env!("CARGO_PKG_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .setting(AppSettings::SubcommandRequiredElseHelp)
    .arg(Arg::with_name("project-root")
         .long("project-root")
         .value_name("FOLDER")
         .help("Root of the Cordova project")
         .takes_value(true)
         .global(true))
    .arg(Arg::with_name("plugin-dir")
         .long("plugin-dir")
         .value_name("FOLDER")
         .help("Where the WonderPush plugin is installed from")
         .takes_value(true)
         .global(true))
    .arg(Arg::with_name("plugin-id")
         .long("plugin-id")
         .value_name("ID")
         .help("Identifier of the plugin running the hook")
         .takes_value(true)
         .global(true))
    .arg(Arg::with_name("platforms")
         .long("platforms")
         .value_name("LIST")
         .help("Comma separated platforms being prepared")
         .takes_value(true)
         .global(true))
    .arg(Arg::with_name("v")
         .short("v")
         .help("Logs every step")
         .global(true))
    .subcommands(commands.iter().map(|(name, cmd)| {
      cmd.init(SubCommand::with_name(name))
    }))
    .get_matches();

  let (cmd_name, sub_args) = args.subcommand();
  let sub_args = sub_args.unwrap_or(&args);

  // Initialize logging.
  let level = match sub_args.is_present("v") {
    true  => "debug",
    false => "info"
  };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_env("WONDERPUSH_LOG")
                     .unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  // Parse the environment variables.
  let env: ctx::Env = envy::prefixed("WONDERPUSH_").from_env()
    .check(|| "Failed to parse environment variables");

  let project_root = sub_args.value_of("project-root").map(PathBuf::from)
    .or_else(|| env.project_root.clone());
  let plugin_dir = sub_args.value_of("plugin-dir").map(PathBuf::from)
    .or_else(|| env.plugin_dir.clone());
  let platforms = sub_args.value_of("platforms")
    .map(|x| x.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from).collect())
    .unwrap_or_default();

  // Execute the requested command.
  let ctx = ctx::Context {
    commands,
    project_root,
    plugin_dir,
    plugin_id: sub_args.value_of("plugin-id").map(String::from),
    platforms,
    env
  };

  tracing::debug!("Running {} for {}", cmd_name,
                  ctx.plugin_id.as_deref().unwrap_or(env!("CARGO_PKG_NAME")));

  match ctx.commands.get(cmd_name) {
    Some(cmd) => cmd.run(&ctx).check(|| format!("Failed to run command ({})", cmd_name)),
    None      => fatal(format!("Unknown command ({})", cmd_name))
  }
}

trait Check {
  type R;
  fn check<F, S>(self, msg: F) -> Self::R where F: FnOnce() -> S, S: Display;
}

impl<T, E> Check for Result<T, E> where E: Display {
  type R = T;
  fn check<F, S>(self, msg: F) -> Self::R where F: FnOnce() -> S, S: Display {
    match self {
      Ok (v) => v,
      Err(e) => fatal(format!("{}: {}", msg(), e))
    }
  }
}

fn fatal<S: Display>(msg: S) -> ! {
  tracing::error!("{}", msg);
  std::process::exit(1)
}
