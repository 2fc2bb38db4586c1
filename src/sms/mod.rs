pub mod twilio;

use crate::config::BUSINESS_NAME_PLACEHOLDER;
use crate::error::SmsError;
use crate::models::StoredLead;
use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;
use tracing::{error, info, warn};

pub use twilio::TwilioClient;

/// Provider response for an accepted message
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
}

/// Hosted SMS API
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send `body` to an E.164 number
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SmsError>;
}

/// What happened to one lead in a bulk send
#[derive(Debug, Clone, PartialEq)]
pub enum SmsOutcome {
    Sent {
        row: usize,
        business: String,
        to: String,
        sid: String,
        sent_at: String,
    },
    Skipped {
        row: usize,
        business: String,
        reason: String,
    },
    Failed {
        row: usize,
        business: String,
        error: String,
    },
}

/// Phone number in E.164 form. Numbers without a `+` are taken as US
/// numbers (10 digits, or 11 starting with 1)
pub fn format_e164(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == crate::models::NOT_AVAILABLE {
        return None;
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if cleaned.starts_with('+') {
        return (cleaned.len() > 1).then_some(cleaned);
    }
    match cleaned.len() {
        10 => Some(format!("+1{}", cleaned)),
        11 if cleaned.starts_with('1') => Some(format!("+{}", cleaned)),
        _ => None,
    }
}

pub fn render_template(template: &str, business_name: &str) -> String {
    template.replace(BUSINESS_NAME_PLACEHOLDER, business_name)
}

/// Sends templated messages through an optional gateway
pub struct SmsSender<G: SmsGateway> {
    gateway: Option<G>,
    delay: Duration,
}

impl<G: SmsGateway> SmsSender<G> {
    pub fn new(gateway: Option<G>, delay: Duration) -> Self {
        if gateway.is_none() {
            warn!("SMS credentials not provided, SMS sending is disabled");
        }
        Self { gateway, delay }
    }

    pub fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    #[cfg(test)]
    pub fn gateway(&self) -> Option<&G> {
        self.gateway.as_ref()
    }

    /// Send one message to a raw phone number
    pub async fn send(&self, phone: &str, body: &str) -> Result<SentMessage, SmsError> {
        let gateway = self.gateway.as_ref().ok_or(SmsError::Disabled)?;
        let to = format_e164(phone).ok_or_else(|| SmsError::InvalidNumber(phone.to_string()))?;
        let sent = gateway.send(&to, body).await?;
        info!("SMS sent to {} (sid {}, {})", to, sent.sid, sent.status);
        Ok(sent)
    }

    /// One outcome per lead, pausing between messages that were attempted
    pub async fn send_bulk(&self, leads: &[StoredLead], template: &str) -> Vec<SmsOutcome> {
        let mut outcomes = Vec::with_capacity(leads.len());

        for lead in leads {
            let business = if lead.business_name.trim().is_empty() {
                "Business".to_string()
            } else {
                lead.business_name.trim().to_string()
            };

            let Some(phone) = lead.phone.as_deref() else {
                warn!("No phone number for {}, skipping", business);
                outcomes.push(SmsOutcome::Skipped {
                    row: lead.row,
                    business,
                    reason: "No phone number".to_string(),
                });
                continue;
            };

            let Some(to) = format_e164(phone) else {
                warn!("Invalid phone number format for {}: {}", business, phone);
                outcomes.push(SmsOutcome::Skipped {
                    row: lead.row,
                    business,
                    reason: format!("Invalid phone number: {}", phone),
                });
                continue;
            };

            let body = render_template(template, &business);
            let outcome = match self.send(&to, &body).await {
                Ok(sent) => SmsOutcome::Sent {
                    row: lead.row,
                    business,
                    to,
                    sid: sent.sid,
                    sent_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                },
                Err(e) => {
                    error!("Error sending SMS to {}: {}", to, e);
                    SmsOutcome::Failed {
                        row: lead.row,
                        business,
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        outcomes
    }
}
