//! Password-reset email delivery.
//!
//! Two providers: `console` logs the event and sends nothing (the default, used
//! in development), `resend` posts to the Resend HTTP API. Delivery is
//! best-effort everywhere: a failed send is logged and the reset request still
//! succeeds, since the token row is already committed.

use std::time::Duration;

use serde::Serialize;

use crate::config::Config;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EmailService {
    provider: Provider,
    client: reqwest::Client,
}

enum Provider {
    Console,
    Resend { api_key: String, from: String },
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

impl EmailService {
    /// Build the service from configuration.
    ///
    /// An incomplete `resend` configuration (missing key or sender) falls back
    /// to the console provider with a warning rather than failing startup.
    pub fn from_config(config: &Config) -> Self {
        let provider = match config.email_provider.as_str() {
            "resend" => match (&config.resend_api_key, &config.email_from) {
                (Some(api_key), Some(from)) => Provider::Resend {
                    api_key: api_key.clone(),
                    from: from.clone(),
                },
                _ => {
                    tracing::warn!(
                        "EMAIL_PROVIDER=resend but RESEND_API_KEY/EMAIL_FROM unset, using console"
                    );
                    Provider::Console
                }
            },
            "console" => Provider::Console,
            other => {
                tracing::warn!(provider = other, "unknown email provider, using console");
                Provider::Console
            }
        };

        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }

    /// Send the password-reset token to a client. Never fails the caller.
    pub async fn send_reset_email(&self, to_email: &str, org_name: &str, token: &str) {
        match &self.provider {
            Provider::Console => {
                tracing::info!(to_email, org_name, "password reset requested (console provider)");
            }
            Provider::Resend { api_key, from } => {
                let body = format!(
                    "Hello {org_name},\n\n\
                     A password reset was requested for your account. Use this token to set a new password:\n\n\
                     {token}\n\n\
                     If you did not request this, you can ignore this email."
                );
                let payload = ResendPayload {
                    from,
                    to: [to_email],
                    subject: "Reset your password",
                    text: body,
                };

                let result = self
                    .client
                    .post(RESEND_ENDPOINT)
                    .bearer_auth(api_key)
                    .timeout(SEND_TIMEOUT)
                    .json(&payload)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status);

                match result {
                    Ok(_) => tracing::info!(to_email, "password reset email sent"),
                    Err(e) => tracing::error!(to_email, error = %e, "password reset email failed"),
                }
            }
        }
    }
}
