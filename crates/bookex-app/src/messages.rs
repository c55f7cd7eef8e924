//! One-shot feedback messages, kept in session until the next rendered page

use tower_sessions::Session;

use crate::error::ApiResult;

const SESSION_MESSAGES_KEY: &str = "messages";

pub async fn flash(session: &Session, message: impl Into<String>) -> ApiResult<()> {
    let mut messages: Vec<String> = session
        .get(SESSION_MESSAGES_KEY)
        .await?
        .unwrap_or_default();
    messages.push(message.into());
    session.insert(SESSION_MESSAGES_KEY, messages).await?;
    Ok(())
}

/// Returns pending messages, oldest first, and removes them from session
pub async fn take(session: &Session) -> ApiResult<Vec<String>> {
    let messages = session
        .remove::<Vec<String>>(SESSION_MESSAGES_KEY)
        .await?
        .unwrap_or_default();
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flash_and_take() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store, None);

        assert!(take(&session).await.unwrap().is_empty());

        flash(&session, "Rated 4 stars!").await.unwrap();
        flash(&session, "Added to favorites!").await.unwrap();
        let messages = take(&session).await.unwrap();
        assert_eq!(messages, vec!["Rated 4 stars!", "Added to favorites!"]);

        assert!(take(&session).await.unwrap().is_empty());
    }
}
