use crate::config::TwilioConfig;
use crate::error::SmsError;
use crate::sms::{SentMessage, SmsGateway};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Twilio Programmable Messaging over its REST API
pub struct TwilioClient {
    http: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    /// `None` when the account sid or token is missing
    pub fn from_config(config: &TwilioConfig) -> Result<Option<Self>, SmsError> {
        if !config.is_configured() {
            return Ok(None);
        }
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Some(Self {
            http,
            account_sid: config.account_sid.trim().to_string(),
            auth_token: config.auth_token.trim().to_string(),
            from_number: config.from_number.trim().to_string(),
        }))
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", API_BASE, self.account_sid)
    }
}

#[async_trait]
impl SmsGateway for TwilioClient {
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SmsError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let err = serde_json::from_str::<ErrorResource>(&text).unwrap_or(ErrorResource {
                code: i64::from(status.as_u16()),
                message: text,
            });
            return Err(SmsError::Provider {
                code: err.code,
                message: err.message,
            });
        }

        let message: MessageResource = response.json().await?;
        Ok(SentMessage {
            sid: message.sid,
            status: message.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_twilio_gives_no_client() {
        assert!(TwilioClient::from_config(&TwilioConfig::default()).unwrap().is_none());
    }

    #[test]
    fn builds_messages_url() {
        let config = TwilioConfig {
            account_sid: " AC123 ".into(),
            auth_token: "token".into(),
            from_number: "+15550001111".into(),
        };
        let client = TwilioClient::from_config(&config).unwrap().unwrap();
        assert_eq!(
            client.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn parses_provider_error_body() {
        let err: ErrorResource =
            serde_json::from_str(r#"{"code":21211,"message":"Invalid 'To' Phone Number","status":400}"#)
                .unwrap();
        assert_eq!(err.code, 21211);
        assert!(err.message.contains("Invalid"));
    }
}
