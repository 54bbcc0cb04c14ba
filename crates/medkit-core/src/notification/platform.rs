//! Host notification service boundary.

use async_trait::async_trait;
use thiserror::Error;

use super::NotificationDescriptor;

/// Errors reported by the host notification service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Platform error: {0}")]
    Other(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// The OS-level "show a notification at time T" primitive.
///
/// Implemented by the host app (or by a test double).
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    async fn check_permission(&self) -> bool;

    async fn request_permission(&self) -> bool;

    /// Whether exact-time triggers are allowed (platform dependent).
    async fn can_schedule_exact_alarms(&self) -> bool;

    /// Register a trigger. Re-using an id replaces the existing trigger.
    async fn schedule_notification(&self, notification: &NotificationDescriptor) -> PlatformResult<()>;

    async fn cancel_notification(&self, id: &str) -> PlatformResult<()>;

    async fn cancel_all_notifications(&self) -> PlatformResult<()>;

    /// Triggers registered and not yet delivered.
    async fn get_trigger_notifications(&self) -> PlatformResult<Vec<NotificationDescriptor>>;
}
