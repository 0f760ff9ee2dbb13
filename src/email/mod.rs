pub mod smtp;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::Message;

use crate::address::{self, AddressError};

/// A message ready to hand to a relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Empty means `dispatch@<hostname>`.
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid sender: {0}")]
    InvalidSender(AddressError),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(AddressError),

    #[error("no recipients")]
    NoRecipients,

    #[error("there is no message to send")]
    NothingToSend,

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP relay error: {0}")]
    Relay(String),

    #[error("SMTP send error: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

/// Delivery seam between dispatch and the outside world.
#[rocket::async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, message: &OutboundMessage) -> Result<(), MailError>;
}

/// Build the transport-level message. Recipients are all-or-nothing:
/// one bad address aborts the whole message.
pub fn compose(message: &OutboundMessage) -> Result<Message, MailError> {
    let from = if message.from.trim().is_empty() {
        address::default_sender()
    } else {
        message.from.clone()
    };
    log::debug!("From: {}", from);
    let from: Mailbox = address::parse_mailbox(&from).map_err(MailError::InvalidSender)?;

    let recipients = message
        .to
        .iter()
        .map(|to| address::parse_mailbox(to))
        .collect::<Result<Vec<_>, _>>()
        .map_err(MailError::InvalidRecipient)?;
    if recipients.is_empty() {
        return Err(MailError::NoRecipients);
    }

    let mut builder = Message::builder().from(from).subject(message.subject.as_str());
    for to in recipients {
        log::debug!("To: {}", to);
        builder = builder.to(to);
    }
    log::debug!("Subject: {}", message.subject);

    let have_text = !message.text_body.is_empty();
    let have_html = !message.html_body.is_empty();
    let email = match (have_text, have_html) {
        (true, true) => builder.multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))?,
        (true, false) => builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.text_body.clone())?,
        (false, true) => builder
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())?,
        (false, false) => return Err(MailError::NothingToSend),
    };
    Ok(email)
}
