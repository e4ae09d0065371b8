use crate::config::logging::secure_log;
use crate::config::settings::MailSettings;
use crate::error::mail_error::MailError;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const MAIL_QUEUE_CAPACITY: usize = 256;
const VERIFY_SUBJECT: &str = "Verify Your Email";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Why a verification link is being sent; only the wording differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationPurpose {
    Welcome,
    Resend,
}

pub fn verification_link(client_url: &str, token: &str) -> String {
    format!("{}/auth/verify-email?token={}", client_url, token)
}

impl EmailMessage {
    pub fn verification(to: &str, name: &str, link: &str, purpose: VerificationPurpose) -> Self {
        let (intro, disclaimer) = match purpose {
            VerificationPurpose::Welcome => (
                "Welcome! Please verify your email address by clicking the link below:",
                "If you didn't create this account, you can ignore this email.",
            ),
            VerificationPurpose::Resend => (
                "Please verify your email address by clicking the link below:",
                "If you didn't request this, you can ignore this email.",
            ),
        };

        let html = format!(
            "<div>\
             <p>Hi, {name}</p>\
             <p>{intro}</p>\
             <p><a href=\"{link}\">Verify Email</a></p>\
             <p>This link will expire in 24 hours.</p>\
             <p>{disclaimer}</p>\
             <p>Thank you!</p>\
             </div>",
            name = escape_html(name),
            intro = intro,
            link = escape_html(link),
            disclaimer = disclaimer,
        );

        Self {
            to: to.to_string(),
            subject: VERIFY_SUBJECT.to_string(),
            html,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailSender {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: settings.from.parse()?,
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse()?)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html)?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Hands messages to a background worker so callers never wait on SMTP.
#[derive(Clone)]
pub struct MailDispatcher {
    queue: mpsc::Sender<EmailMessage>,
}

impl MailDispatcher {
    /// Spawn the delivery worker. On shutdown it delivers what is already queued, then exits.
    pub fn start(sender: Arc<dyn MailSender>, shutdown_token: CancellationToken) -> (Self, JoinHandle<()>) {
        let (queue, mut receiver) = mpsc::channel::<EmailMessage>(MAIL_QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = receiver.recv() => match next {
                        Some(message) => deliver(sender.as_ref(), message).await,
                        None => break,
                    },
                    _ = shutdown_token.cancelled() => {
                        tracing::info!("Mail worker received shutdown signal, draining queue");
                        receiver.close();
                        while let Some(message) = receiver.recv().await {
                            deliver(sender.as_ref(), message).await;
                        }
                        break;
                    }
                }
            }

            tracing::info!("Mail worker stopped");
        });

        (Self { queue }, handle)
    }

    /// Queue a message without waiting; failures are logged, never returned.
    pub fn dispatch(&self, message: EmailMessage) {
        match self.queue.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                tracing::error!("Mail queue is full, dropping message '{}'", message.subject);
            }
            Err(TrySendError::Closed(message)) => {
                tracing::error!("Mail worker is not running, dropping message '{}'", message.subject);
            }
        }
    }
}

async fn deliver(sender: &dyn MailSender, message: EmailMessage) {
    let subject = message.subject.clone();
    let recipient = message.to.clone();

    match sender.send(message).await {
        Ok(()) => secure_log::sensitive_debug!("Mail '{}' delivered to {}", subject, recipient),
        Err(e) => secure_log::secure_error!(format!("Failed to deliver mail '{}'", subject), e),
    }
}
