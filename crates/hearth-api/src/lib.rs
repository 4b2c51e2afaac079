pub mod attachments;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod unread;
pub mod views;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
