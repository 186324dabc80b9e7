use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{AppState, config::Config, utils::Lang};

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Link worth printing when the message falls back to the log.
    pub link: Option<String>,
}

pub fn verification_email(to: &str, link: &str, lang: Lang) -> OutgoingEmail {
    let (subject, html) = match lang {
        Lang::Fr => (
            "Vérifiez votre email - DZ Clothes".to_string(),
            format!(
                r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:auto">
<h2>Bienvenue chez DZ Clothes</h2>
<p>Merci pour votre inscription. Cliquez sur le bouton ci-dessous pour vérifier votre adresse email.</p>
<p><a href="{link}" style="background:#111;color:#fff;padding:12px 24px;text-decoration:none;border-radius:4px">Vérifier mon email</a></p>
<p>Ou copiez ce lien : <br>{link}</p>
<p>Si vous n'avez pas créé de compte, ignorez cet email.</p>
</div>"#
            ),
        ),
        Lang::Ar => (
            "تحقق من بريدك الإلكتروني - DZ Clothes".to_string(),
            format!(
                r#"<div dir="rtl" style="font-family:Arial,sans-serif;max-width:600px;margin:auto">
<h2>مرحبا بك في DZ Clothes</h2>
<p>شكرا لتسجيلك. اضغط على الزر أدناه للتحقق من بريدك الإلكتروني.</p>
<p><a href="{link}" style="background:#111;color:#fff;padding:12px 24px;text-decoration:none;border-radius:4px">تحقق من بريدي</a></p>
<p>أو انسخ هذا الرابط: <br>{link}</p>
<p>إذا لم تقم بإنشاء حساب، تجاهل هذا البريد.</p>
</div>"#
            ),
        ),
    };

    OutgoingEmail {
        to: to.to_string(),
        subject,
        html,
        link: Some(link.to_string()),
    }
}

pub fn order_confirmation_email(
    to: &str,
    order_number: &str,
    total: Decimal,
    items_summary: &str,
    lang: Lang,
) -> OutgoingEmail {
    let items_html = items_summary.replace('\n', "<br>");
    let (subject, html) = match lang {
        Lang::Fr => (
            format!("Commande confirmée #{} - DZ Clothes", order_number),
            format!(
                r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:auto">
<h2>Merci pour votre commande</h2>
<p>Numéro de commande : <b>{order_number}</b></p>
<p>{items_html}</p>
<p>Total : <b>{total:.2} DA</b></p>
<p>Nous vérifions votre paiement Baridi Mob et vous tiendrons informé de l'expédition.</p>
</div>"#
            ),
        ),
        Lang::Ar => (
            format!("تأكيد الطلب #{} - DZ Clothes", order_number),
            format!(
                r#"<div dir="rtl" style="font-family:Arial,sans-serif;max-width:600px;margin:auto">
<h2>شكرا على طلبك</h2>
<p>رقم الطلب: <b>{order_number}</b></p>
<p>{items_html}</p>
<p>المجموع: <b>{total:.2} DA</b></p>
<p>نحن نتحقق من دفع بريدي موب وسنخبرك عند الشحن.</p>
</div>"#
            ),
        ),
    };

    OutgoingEmail {
        to: to.to_string(),
        subject,
        html,
        link: None,
    }
}

pub(crate) fn mailjet_payload(email: &OutgoingEmail, config: &Config) -> Value {
    let text = email.html.replace("<br>", "\n").replace("</p>", "\n");
    json!({
        "Messages": [{
            "From": { "Email": config.mail_from, "Name": config.mail_from_name },
            "To": [{ "Email": email.to }],
            "Subject": email.subject,
            "HTMLPart": email.html,
            "TextPart": text,
        }]
    })
}

async fn send_via_mailjet(state: &AppState, email: &OutgoingEmail) -> bool {
    let Some((key, secret)) = state.config.mailjet_credentials() else {
        tracing::debug!("Mailjet not configured");
        return false;
    };

    let result = state
        .http
        .post(MAILJET_SEND_URL)
        .basic_auth(key, Some(secret))
        .json(&mailjet_payload(email, &state.config))
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Mailjet email sent to {}", email.to);
            true
        }
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!("Mailjet rejected email to {}: {} {}", email.to, status, body);
            false
        }
        Err(e) => {
            tracing::warn!("Mailjet request failed for {}: {}", email.to, e);
            false
        }
    }
}

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("invalid message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub(crate) fn smtp_message(email: &OutgoingEmail, config: &Config) -> Result<Message, SmtpError> {
    let from = Mailbox::new(Some(config.mail_from_name.clone()), config.mail_from.parse()?);
    let message = Message::builder()
        .from(from)
        .to(email.to.parse()?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())?;
    Ok(message)
}

async fn deliver_smtp(email: &OutgoingEmail, config: &Config) -> Result<bool, SmtpError> {
    let Some((server, username, password)) = config.smtp_credentials() else {
        return Ok(false);
    };

    let builder = if config.smtp_use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::relay(server)?
    };
    let transport = builder
        .port(config.smtp_port)
        .credentials(Credentials::new(username.to_string(), password.to_string()))
        .build();

    transport.send(smtp_message(email, config)?).await?;
    tracing::info!("SMTP email sent to {} via {}", email.to, server);
    Ok(true)
}

async fn send_via_smtp(state: &AppState, email: &OutgoingEmail) -> bool {
    match deliver_smtp(email, &state.config).await {
        Ok(sent) => {
            if !sent {
                tracing::debug!("SMTP not configured");
            }
            sent
        }
        Err(e) => {
            tracing::warn!("SMTP delivery failed for {}: {}", email.to, e);
            false
        }
    }
}

fn log_to_console(email: &OutgoingEmail) {
    tracing::info!(
        to = %email.to,
        subject = %email.subject,
        link = email.link.as_deref().unwrap_or("-"),
        "Email not delivered by a provider, logged instead"
    );
}

/// Sends through Mailjet, then SMTP, logging the message instead when neither
/// provider delivers it.
pub async fn send(state: &AppState, email: &OutgoingEmail) -> bool {
    if send_via_mailjet(state, email).await || send_via_smtp(state, email).await {
        return true;
    }
    log_to_console(email);
    false
}

pub async fn send_verification_email(state: &AppState, to: &str, token: &str, lang: Lang) -> bool {
    let link = state.config.verify_email_link(token);
    send(state, &verification_email(to, &link, lang)).await
}

pub async fn send_order_confirmation(
    state: &AppState,
    to: &str,
    order_number: &str,
    total: Decimal,
    items_summary: &str,
    lang: Lang,
) -> bool {
    let email = order_confirmation_email(to, order_number, total, items_summary, lang);
    send(state, &email).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_follows_language() {
        let fr = verification_email("a@b.dz", "https://shop.dz/verify-email?token=t1", Lang::Fr);
        assert!(fr.subject.starts_with("Vérifiez"));
        assert!(fr.html.contains("https://shop.dz/verify-email?token=t1"));

        let ar = verification_email("a@b.dz", "https://shop.dz/verify-email?token=t1", Lang::Ar);
        assert!(ar.html.contains("dir=\"rtl\""));
        assert!(ar.html.contains("token=t1"));
    }

    #[test]
    fn confirmation_lists_items_and_total() {
        let email = order_confirmation_email(
            "a@b.dz",
            "DZ-0A1B2C3D",
            Decimal::new(700000, 2),
            "- Veste x1\n- Polo x2",
            Lang::Fr,
        );
        assert_eq!(email.subject, "Commande confirmée #DZ-0A1B2C3D - DZ Clothes");
        assert!(email.html.contains("- Veste x1<br>- Polo x2"));
        assert!(email.html.contains("7000.00 DA"));
        assert!(email.link.is_none());
    }

    #[test]
    fn mailjet_payload_shape() {
        let config = Config::new("postgres://localhost/shop", "secret");
        let email = OutgoingEmail {
            to: "c@d.dz".into(),
            subject: "Hi".into(),
            html: "<p>one</p><p>two<br>three</p>".into(),
            link: None,
        };
        let payload = mailjet_payload(&email, &config);
        let message = &payload["Messages"][0];
        assert_eq!(message["From"]["Email"], "noreply@dzclothes.dz");
        assert_eq!(message["To"][0]["Email"], "c@d.dz");
        assert_eq!(message["TextPart"], "<p>one\n<p>two\nthree\n");
    }

    #[test]
    fn smtp_message_is_html_from_the_shop() {
        let config = Config::new("postgres://localhost/shop", "secret");
        let email = verification_email("client@exemple.dz", "https://shop.dz/v?token=t9", Lang::Fr);
        let message = smtp_message(&email, &config).unwrap();

        let envelope = message.envelope();
        assert_eq!(
            envelope.from().map(|a| a.to_string()),
            Some("noreply@dzclothes.dz".to_string())
        );
        assert_eq!(envelope.to()[0].to_string(), "client@exemple.dz");

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn smtp_message_rejects_bad_recipient() {
        let config = Config::new("postgres://localhost/shop", "secret");
        let email = OutgoingEmail {
            to: "pas-une-adresse".into(),
            subject: "Hi".into(),
            html: "<p>x</p>".into(),
            link: None,
        };
        assert!(matches!(
            smtp_message(&email, &config),
            Err(SmtpError::Address(_))
        ));
    }

    #[tokio::test]
    async fn smtp_is_skipped_without_credentials() {
        let config = Config::new("postgres://localhost/shop", "secret");
        let email = verification_email("a@b.dz", "https://shop.dz/v?token=t1", Lang::Fr);
        assert!(!deliver_smtp(&email, &config).await.unwrap());
    }
}
