pub mod message;
pub mod session;

pub use message::{Message, Role};
pub use session::{Session, SessionOwner, SessionStatus};
