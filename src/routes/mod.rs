mod health_check;
mod index;
mod send_emails;

pub use health_check::*;
pub use index::*;
pub use send_emails::*;
