pub mod traits;
pub mod session_events;
pub mod factory;
pub mod omdb;
pub mod hosted;
pub mod memory;
pub mod error;

pub use traits::{CommentRepository, IdentityService, MovieProvider, PasswordSignIn, SessionHandler, Subscription, WatchedRepository};
pub use session_events::SessionEvents;
pub use factory::Gateways;
pub use error::GatewayError;
pub use memory::{InMemoryBackend, MemoryOp};
