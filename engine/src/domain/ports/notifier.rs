//! Notifier port

use async_trait::async_trait;

/// Best-effort operator notification; implementations swallow their own failures
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}
