pub(crate) mod cors;
pub(crate) mod request_tracing;
pub(crate) mod session;

pub use session::{CurrentSession, CurrentUser, SessionToken, SESSION_COOKIE};
