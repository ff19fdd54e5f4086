mod add;
mod list;
mod remove;

pub use add::{AddArgs, cmd_add};
pub use list::cmd_list;
pub use remove::cmd_remove;
