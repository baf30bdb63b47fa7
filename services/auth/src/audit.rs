//! Audit trail for authentication events
//!
//! Audit delivery never decides a login: sink failures are logged and
//! dropped by the caller.

use async_trait::async_trait;
use common::identity::Role;
use serde::Serialize;
use tracing::info;

/// Authentication event worth keeping
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: String,
        email: String,
        role: Role,
    },
    LoginFailed {
        email: String,
        reason: String,
    },
}

impl AuditEvent {
    pub fn action(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "login_success",
            AuditEvent::LoginFailed { .. } => "login_failed",
        }
    }
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Writes audit events to the `audit` tracing target
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(target: "audit", action = event.action(), "{}", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::LoginFailed {
            email: "admin@vanityhub.com".to_string(),
            reason: "Invalid credentials".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "login_failed");
        assert_eq!(json["email"], "admin@vanityhub.com");
        assert_eq!(event.action(), "login_failed");
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let event = AuditEvent::LoginSuccess {
            user_id: "u1".to_string(),
            email: "admin@vanityhub.com".to_string(),
            role: Role::Admin,
        };
        assert!(TracingAuditSink.record(&event).await.is_ok());
    }
}
