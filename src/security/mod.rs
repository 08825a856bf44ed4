pub mod session;
pub mod token_mask;

pub use session::{
    AuthSession, Clock, Credentials, LoginGrant, SessionManager, SessionState, SystemClock,
};
pub use token_mask::mask_token;
