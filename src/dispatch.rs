use crate::email::{MailError, OutboundMessage, Relay};
use crate::fields::{self, Fields, AUTH_TOKEN, SUBJECT};
use crate::render::{self, RenderError};
use crate::targets::{Target, TargetStore};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("auth-token not recognized")]
    AuthNotRecognized,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Delivery(#[from] MailError),
}

/// Owns the target store and the relay; resolves a submission to a target
/// and sends it.
pub struct Dispatch {
    targets: TargetStore,
    relay: Box<dyn Relay>,
}

impl Dispatch {
    pub fn new(targets: TargetStore, relay: Box<dyn Relay>) -> Self {
        Dispatch { targets, relay }
    }

    pub async fn send(&self, request: &Fields) -> Result<(), DispatchError> {
        let token = request.get(AUTH_TOKEN).map(String::as_str).unwrap_or_default();
        let target = self
            .targets
            .lookup(token)
            .ok_or(DispatchError::AuthNotRecognized)?;

        let merged = fields::merge(request, &target.defaults);
        let message = OutboundMessage {
            from: target.from.clone(),
            to: target.to.clone(),
            subject: subject_for(target, &merged),
            text_body: render::render(&merged)?,
            html_body: String::new(),
        };

        log::debug!("sending message for target '{}': {:?}", target.name, message.subject);
        self.relay.relay(&message).await?;
        log::info!("message relayed for target '{}'", target.name);
        Ok(())
    }
}

/// `[dispatch] <name> - <subject>`, or `[dispatch] <name>` without a subject.
pub fn subject_for(target: &Target, fields: &Fields) -> String {
    match fields.get(SUBJECT).map(|s| s.trim()) {
        Some(subject) if !subject.is_empty() => {
            format!("[dispatch] {} - {}", target.name, subject)
        }
        _ => format!("[dispatch] {}", target.name),
    }
}
