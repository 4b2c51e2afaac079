use std::sync::Arc;

use hearth_db::Database;
use hearth_gateway::dispatcher::Dispatcher;

use crate::attachments::AttachmentStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    /// Shared with the gateway, which checks conversation membership at
    /// subscribe time.
    pub db: Arc<Database>,
    pub store: AttachmentStore,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}
