use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use super::{Dispatch, DispatchError, Notifier, REPORT_CONTENT_TYPE};
use crate::settings::SmtpSettings;

/// Sends reports through an SMTP relay using STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, DispatchError> {
        if settings.host.trim().is_empty() {
            return Err(DispatchError::NotConfigured);
        }
        let sender = settings.sender().ok_or(DispatchError::NotConfigured)?;
        let sender = parse_mailbox(sender)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|err| DispatchError::Transport(err.to_string()))?
            .port(settings.port)
            .timeout(Some(settings.timeout()));
        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn build_message(&self, dispatch: &Dispatch) -> Result<Message, DispatchError> {
        build_message(self.sender.clone(), dispatch)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(name = "smtp_deliver", skip_all, fields(to = dispatch.recipients.to.len()))]
    async fn deliver(&self, dispatch: &Dispatch) -> Result<(), DispatchError> {
        let message = self.build_message(dispatch)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;
        info!(
            recipients = dispatch.recipients.all().count(),
            "report email delivered"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| DispatchError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

/// Compose the report email. `to`/`cc` become headers; `bcc` only reaches the
/// envelope because lettre strips the Bcc header before sending.
fn build_message(sender: Mailbox, dispatch: &Dispatch) -> Result<Message, DispatchError> {
    let recipients = &dispatch.recipients;
    let mut builder = Message::builder()
        .from(sender)
        .subject(dispatch.subject.clone());
    for address in &recipients.to {
        builder = builder.to(parse_mailbox(address)?);
    }
    for address in &recipients.cc {
        builder = builder.cc(parse_mailbox(address)?);
    }
    for address in &recipients.bcc {
        builder = builder.bcc(parse_mailbox(address)?);
    }

    let content_type = ContentType::parse(REPORT_CONTENT_TYPE)
        .map_err(|err| DispatchError::Message(err.to_string()))?;
    let attachment = Attachment::new(dispatch.attachment_name.clone())
        .body(dispatch.attachment.clone(), content_type);

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(dispatch.body.clone()))
                .singlepart(attachment),
        )
        .map_err(|err| DispatchError::Message(err.to_string()))
}
