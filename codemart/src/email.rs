//! Email service for verification mails.
//!
//! Sending is fire-and-forget from the request's point of view: [`EmailService::dispatch`]
//! spawns the send and only logs a failure, so a broken mail relay never fails or slows down
//! registration.

use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use std::sync::Arc;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Log,
}

/// A verification mail ready to send.
#[derive(Debug, Clone)]
pub struct VerificationEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub link: String,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
            EmailTransportConfig::Log => EmailTransport::Log,
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
        })
    }

    /// Send a verification mail in the background. Failures are logged and otherwise ignored.
    pub fn dispatch(self: &Arc<Self>, email: VerificationEmail) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.send_verification_email(&email).await {
                tracing::error!(error = %e, "Failed to send verification email");
            }
        });
    }

    pub async fn send_verification_email(&self, email: &VerificationEmail) -> Result<(), Error> {
        let subject = "Verify your email address";
        let body = create_verification_body(email.to_name.as_deref(), &email.link);

        self.send_email(&email.to_email, email.to_name.as_deref(), subject, &body, &email.link)
            .await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str, link: &str) -> Result<(), Error> {
        if let EmailTransport::Log = self.transport {
            tracing::info!(to = %to_email, %subject, %link, "Email transport is 'log'; not sending");
            return Ok(());
        }

        let from_address = self.from_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let from = Mailbox::new(Some(self.from_name.clone()), from_address);

        // Names are quoted by lettre, never parsed, so any display name is accepted
        let to_address = to_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;
        let to = Mailbox::new(to_name.map(str::to_string), to_address);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
            EmailTransport::Log => {}
        }

        tracing::debug!(to = %to_email, "Verification email sent");
        Ok(())
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn create_verification_body(to_name: Option<&str>, link: &str) -> String {
    let greeting = match to_name {
        Some(name) => format!("Hello {},", escape_html(name)),
        None => "Hello,".to_string(),
    };
    let link = escape_html(link);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Verify your email address</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Confirm your email address</h2>

        <p>{greeting}</p>

        <p>Thanks for joining Codemart. Please confirm this address so buyers and sellers can trust your account.</p>

        <p><a href="{link}">Verify your email</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{link}</p>

        <p>This link expires in 24 hours.</p>

        <div class="footer">
            <p>If you did not create an account, you can ignore this email.</p>
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
    )
}
