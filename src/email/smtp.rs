use std::fmt;
use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{compose, MailError, OutboundMessage, Relay};

/// Port that speaks TLS from the first byte instead of upgrading.
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 25,
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SmtpSettings {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "*****" })
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Relays through a single configured SMTP server.
///
/// Server certificates are NOT verified. Relays commonly sit on the same
/// host or LAN with self-signed certificates; anyone able to intercept that
/// hop can read and alter mail.
pub struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    settings: SmtpSettings,
}

impl SmtpRelay {
    pub fn new(settings: SmtpSettings) -> Result<Self, MailError> {
        let tls = tls_for(&settings.host, settings.port)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str())
            .port(settings.port)
            .tls(tls)
            .timeout(Some(settings.timeout));

        if settings.has_credentials() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(SmtpRelay {
            transport: builder.build(),
            settings,
        })
    }
}

/// Implicit TLS on 465, opportunistic STARTTLS everywhere else.
pub fn tls_for(host: &str, port: u16) -> Result<Tls, MailError> {
    let params = TlsParameters::builder(host.to_string())
        .dangerous_accept_invalid_certs(true)
        .build_rustls()
        .map_err(|e| MailError::Relay(e.to_string()))?;
    if port == IMPLICIT_TLS_PORT {
        Ok(Tls::Wrapper(params))
    } else {
        Ok(Tls::Opportunistic(params))
    }
}

#[rocket::async_trait]
impl Relay for SmtpRelay {
    async fn relay(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let email = match compose(message) {
            Ok(email) => email,
            Err(MailError::NothingToSend) => {
                log::warn!("There is no message to send");
                return Err(MailError::NothingToSend);
            }
            Err(e) => {
                log::warn!("{}", e);
                log::error!("Will not send email");
                return Err(e);
            }
        };

        if self.settings.has_credentials() {
            log::debug!(
                "Connecting to {}:*****@{}:{}",
                self.settings.username,
                self.settings.host,
                self.settings.port
            );
        } else {
            log::debug!("Connecting to {}:{}", self.settings.host, self.settings.port);
        }

        match self.transport.send(email).await {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("An error occurred when sending email: {}", e);
                Err(MailError::Send(e))
            }
        }
    }
}
