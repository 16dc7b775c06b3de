use std::sync::Arc;

use tracing::error;

use whisper_db::Database;
use whisper_types::api::{Claims, Role};
use whisper_types::models::{AuthorRef, Message};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Indent cap applied when building reply threads.
    pub max_nesting_level: u32,
}

/// Who is calling. Requests without a bearer token are anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(i64),
    Admin(i64),
}

impl Identity {
    pub fn from_claims(claims: &Claims) -> Self {
        match claims.role {
            Role::User => Self::User(claims.sub),
            Role::Admin => Self::Admin(claims.sub),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }

    pub fn as_author(&self) -> AuthorRef {
        match *self {
            Self::Anonymous => AuthorRef::Anonymous,
            Self::User(id) => AuthorRef::User(id),
            Self::Admin(id) => AuthorRef::Admin(id),
        }
    }

    /// Anonymous callers cannot be matched against any author.
    pub fn is_author(&self, author: AuthorRef) -> bool {
        !matches!(self, Self::Anonymous) && self.as_author() == author
    }

    /// Admins, and the user or listener whose board it is.
    pub fn can_moderate(&self, message: &Message) -> bool {
        self.is_admin() || self.is_author(message_owner(message))
    }
}

pub fn message_owner(message: &Message) -> AuthorRef {
    AuthorRef::from_columns(message.owner_user_id, message.owner_admin_id)
}

/// Run a blocking database call off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
}
