use std::io::{self, IsTerminal, Write};

use gitid_lib::deprovision::Confirm;

pub fn confirm(message: &str, force: bool) -> io::Result<bool> {
  if force {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    return Err(io::Error::other(
      "Cannot prompt for confirmation in non-interactive mode. Use --yes to proceed.",
    ));
  }

  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;

  Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Prompts on the controlling terminal.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
  fn confirm(&self, message: &str) -> io::Result<bool> {
    confirm(message, false)
  }
}
