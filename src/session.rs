use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::AnalysisResult;

/// The last successfully analyzed document for one caller. Either all three
/// fields describe the same document or the entry is absent; partial context
/// is never observable.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub text: String,
    pub filename: String,
    pub analysis: AnalysisResult,
}

/// Keyed session-context store. One lock guards the whole map so set and
/// clear replace or remove an entry atomically.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, DocumentContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites (never merges) any previous context for this session.
    pub async fn set(&self, session_id: Uuid, context: DocumentContext) {
        self.inner.write().await.insert(session_id, context);
    }

    pub async fn get(&self, session_id: Uuid) -> Option<DocumentContext> {
        self.inner.read().await.get(&session_id).cloned()
    }

    pub async fn clear(&self, session_id: Uuid) {
        self.inner.write().await.remove(&session_id);
    }
}

/// Caller identity for session-scoped document context.
///
/// Clients pass a UUID in `X-Session-Id`; a missing or malformed header maps
/// to the nil UUID, so header-less clients share one anonymous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-session-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or(Uuid::nil());
        Ok(SessionId(id))
    }
}
