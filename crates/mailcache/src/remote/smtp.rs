//! Outbound mail over SMTP

use anyhow::{Context, Result};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::api::ComposedMessage;
use crate::config::AccountConfig;
use crate::error::{ConnectionError, InvalidInputError};

/// Port on which SMTP servers expect implicit TLS
const SMTPS_PORT: u16 = 465;

/// Send a message through the account's SMTP server
pub fn send_smtp(account: &AccountConfig, message: &ComposedMessage) -> Result<()> {
    let email = build_message(account, message)?;

    let builder = if account.smtp_port == SMTPS_PORT {
        SmtpTransport::relay(&account.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&account.smtp_host)
    }
    .map_err(|e| ConnectionError::new(&account.name, e))?;

    let transport = builder
        .port(account.smtp_port)
        .credentials(Credentials::new(
            account.smtp_username.clone(),
            account.smtp_password.clone(),
        ))
        .build();

    transport
        .send(&email)
        .with_context(|| format!("Failed to send message via {}", account.smtp_host))?;

    log::info!(
        "Sent '{}' from account {} to {} recipient(s)",
        message.subject,
        account.name,
        message.to.len() + message.cc.len() + message.bcc.len()
    );
    Ok(())
}

/// Build the RFC 5322 message for a composed email
pub fn build_message(account: &AccountConfig, message: &ComposedMessage) -> Result<Message> {
    if message.to.iter().all(|addr| addr.trim().is_empty()) {
        return Err(InvalidInputError::Missing("to").into());
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(&account.smtp_username)?)
        .subject(message.subject.clone());

    for addr in message.to.iter().filter(|a| !a.trim().is_empty()) {
        builder = builder.to(parse_mailbox(addr)?);
    }
    for addr in message.cc.iter().filter(|a| !a.trim().is_empty()) {
        builder = builder.cc(parse_mailbox(addr)?);
    }
    for addr in message.bcc.iter().filter(|a| !a.trim().is_empty()) {
        builder = builder.bcc(parse_mailbox(addr)?);
    }
    if let Some(reply_to) = message.reply_to.as_deref().filter(|r| !r.is_empty()) {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }
    if let Some(in_reply_to) = message.in_reply_to.as_deref().filter(|r| !r.is_empty()) {
        builder = builder.in_reply_to(in_reply_to.to_string());
    }

    let html = message.body_html.as_deref().filter(|h| !h.is_empty());
    let email = match (message.body_text.is_empty(), html) {
        (false, Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
            message.body_text.clone(),
            html.to_string(),
        )),
        (true, Some(html)) => builder.singlepart(SinglePart::html(html.to_string())),
        (_, None) => builder.singlepart(SinglePart::plain(message.body_text.clone())),
    };

    email.context("Failed to build message")
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.trim()
        .parse()
        .with_context(|| format!("Invalid email address: {}", addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountConfig {
        AccountConfig::new("work", "imap.example.com", "smtp.example.com", "me@example.com")
    }

    #[test]
    fn test_build_plain_message() {
        let composed = ComposedMessage {
            to: vec!["Bob <bob@example.com>".to_string()],
            cc: vec!["carol@example.com".to_string()],
            subject: "Lunch".to_string(),
            body_text: "Noon?".to_string(),
            in_reply_to: Some("<abc@example.com>".to_string()),
            ..ComposedMessage::default()
        };

        let email = build_message(&account(), &composed).unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();

        assert!(formatted.contains("Subject: Lunch"));
        assert!(formatted.contains("From: me@example.com"));
        assert!(formatted.contains("bob@example.com"));
        assert!(formatted.contains("Cc: carol@example.com"));
        assert!(formatted.contains("In-Reply-To: <abc@example.com>"));
        assert!(formatted.contains("Noon?"));
    }

    #[test]
    fn test_build_alternative_message() {
        let composed = ComposedMessage {
            to: vec!["bob@example.com".to_string()],
            subject: "News".to_string(),
            body_text: "plain".to_string(),
            body_html: Some("<b>rich</b>".to_string()),
            ..ComposedMessage::default()
        };

        let email = build_message(&account(), &composed).unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/html"));
    }

    #[test]
    fn test_missing_recipient_is_invalid_input() {
        let composed = ComposedMessage {
            subject: "Nobody".to_string(),
            ..ComposedMessage::default()
        };

        let err = build_message(&account(), &composed).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InvalidInputError>(),
            Some(&InvalidInputError::Missing("to"))
        );
    }

    #[test]
    fn test_invalid_address_is_error() {
        let composed = ComposedMessage {
            to: vec!["not an address".to_string()],
            ..ComposedMessage::default()
        };
        assert!(build_message(&account(), &composed).is_err());
    }
}
