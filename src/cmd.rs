mod add;
mod remove;
mod show;

use crate::ctx::Commands;

pub fn init() -> Commands {
  let mut commands = Commands::new();
  commands.insert("add",    Box::new(add::Add));
  commands.insert("remove", Box::new(remove::Remove));
  commands.insert("show",   Box::new(show::Show));
  commands
}
