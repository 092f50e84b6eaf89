pub mod auth;
pub mod permissions;

pub use auth::{auth_middleware, AppState, AuthContext};
pub use permissions::{ensure_residence_syndic, Capabilities, Capability};
