use async_trait::async_trait;
use tracing::{info, warn};

/// Delivery channel for reset secrets (email, SMS, ...).
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()>;
}

/// Development notifier: records that a link was issued instead of sending mail.
///
/// The link itself carries a redeemable secret and is only written when
/// `log_links` is set (`RESET_LOG_LINKS=true`), which is off by default.
#[derive(Clone, Default)]
pub struct LogNotifier {
    log_links: bool,
}

impl LogNotifier {
    pub fn new(log_links: bool) -> Self {
        if log_links {
            warn!("reset links will be written to the log; do not enable outside development");
        }
        Self { log_links }
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        if self.log_links {
            info!(%email, %reset_url, "password reset link issued");
        } else {
            info!(%email, "password reset link issued");
        }
        Ok(())
    }
}

pub fn reset_url(base: &str, secret: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), secret)
}
