//! Notification sender: order-confirmation email and OTP SMS.
//!
//! Both channels are best-effort from the caller's point of view: a delivery
//! failure is reported but never rolls back the state transition that
//! triggered it. Outside production the SMS channel runs as a logging stub
//! so the OTP flow works without a gateway account.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::transport::smtp::Error as SmtpError;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use copper_kettle_core::{Email, PhoneNumber};

use crate::config::{SmsConfig, SmtpConfig, StorefrontConfig};
use crate::models::order::{Order, OrderTotals};

const SMS_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// No email transport configured.
    #[error("email transport not configured")]
    EmailNotConfigured,

    /// SMS gateway transport failure.
    #[error("SMS gateway request failed: {0}")]
    SmsHttp(#[from] reqwest::Error),

    /// SMS gateway rejected the message.
    #[error("SMS gateway error ({status})")]
    SmsGateway {
        /// HTTP status returned by the gateway.
        status: u16,
    },
}

// =============================================================================
// Email
// =============================================================================

/// SMTP-backed email sender.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_plain(&self, to: &str, subject: &str, body: String) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_owned()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

// =============================================================================
// SMS
// =============================================================================

#[derive(Clone)]
struct SmsGateway {
    http: reqwest::Client,
    api_url: String,
    account: String,
    token: SecretString,
    from: Option<String>,
}

#[derive(Clone)]
enum SmsSender {
    /// Real gateway delivery.
    Gateway(SmsGateway),
    /// Log the code instead of delivering it.
    Stub,
}

// =============================================================================
// Notifier
// =============================================================================

/// The notification collaborator injected into the services.
#[derive(Clone)]
pub struct Notifier {
    email: Option<EmailService>,
    sms: SmsSender,
}

impl Notifier {
    /// Build the notifier from storefront configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if SMTP is configured but the relay cannot be set up.
    ///
    /// # Panics
    ///
    /// Panics if the SMS HTTP client cannot be constructed, which only
    /// happens when the TLS backend fails to initialize at startup.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, SmtpError> {
        let email = config.smtp.as_ref().map(EmailService::new).transpose()?;
        let sms = Self::sms_sender(&config.sms);

        if email.is_none() {
            tracing::warn!("SMTP not configured; order confirmation emails disabled");
        }

        Ok(Self { email, sms })
    }

    fn sms_sender(config: &SmsConfig) -> SmsSender {
        if !config.enabled {
            tracing::info!("SMS delivery disabled; OTP codes will be logged");
            return SmsSender::Stub;
        }

        match (&config.api_url, &config.account, &config.token) {
            (Some(api_url), Some(account), Some(token)) => SmsSender::Gateway(SmsGateway {
                http: reqwest::Client::builder()
                    .timeout(SMS_TIMEOUT)
                    .build()
                    .expect("failed to build SMS gateway HTTP client"),
                api_url: api_url.clone(),
                account: account.clone(),
                token: token.clone(),
                from: config.from.clone(),
            }),
            // Config validation rejects this combination already
            _ => SmsSender::Stub,
        }
    }

    /// Send the order-confirmation email.
    ///
    /// Callers treat failures as best-effort: log and move on.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` when no transport is configured or delivery fails.
    pub async fn send_order_confirmation(
        &self,
        to: &Email,
        order: &Order,
        totals: &OrderTotals,
    ) -> Result<(), NotifyError> {
        let Some(email) = &self.email else {
            return Err(NotifyError::EmailNotConfigured);
        };

        let transaction_id = order
            .transaction_id
            .map(|id| id.to_string())
            .unwrap_or_default();

        let subject = format!("Order Confirmation - #{transaction_id}");
        let body = format!(
            "Thank you for your order!\n\n\
             Order ID: {transaction_id}\n\
             Total Amount: {}\n\
             Items: {}\n\n\
             Your order has been confirmed and will be processed shortly.\n\n\
             Thank you for shopping with us!\n",
            totals.total, totals.item_count
        );

        email.send_plain(to.as_str(), &subject, body).await
    }

    /// Deliver an OTP code over SMS.
    ///
    /// The OTP row persists whether or not delivery succeeds, so the caller
    /// may retry delivery without reissuing a code.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` when the gateway rejects the message or is
    /// unreachable. The stub transport never fails.
    pub async fn send_otp_sms(
        &self,
        phone: &PhoneNumber,
        code: &str,
    ) -> Result<(), NotifyError> {
        let body =
            format!("Your login OTP is: {code}\nDo not share with anyone. Valid for 10 minutes.");

        match &self.sms {
            SmsSender::Stub => {
                tracing::info!(phone = %phone, code, "stub SMS transport: OTP not delivered");
                Ok(())
            }
            SmsSender::Gateway(gateway) => {
                let mut params = vec![("To", phone.as_str().to_owned()), ("Body", body)];
                if let Some(from) = &gateway.from {
                    params.push(("From", from.clone()));
                }

                let response = gateway
                    .http
                    .post(&gateway.api_url)
                    .basic_auth(&gateway.account, Some(gateway.token.expose_secret()))
                    .form(&params)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(NotifyError::SmsGateway {
                        status: status.as_u16(),
                    });
                }

                Ok(())
            }
        }
    }
}
