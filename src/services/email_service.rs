use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::utils::validators::escape_html;

pub struct EmailService {
    config: Config,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
    message: Option<String>,
}

/// Готовое письмо: тема и HTML-тело
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:560px\">\
         <h2>{}</h2>{}<p style=\"color:#888\">SyndicHub</p></div>",
        title, body
    )
}

pub fn payment_reminder_template(
    full_name: &str,
    fee_title: &str,
    amount: Decimal,
    currency: &str,
    due_date: NaiveDate,
) -> EmailTemplate {
    let body = format!(
        "<p>Bonjour {},</p><p>Le paiement « {} » de <strong>{} {}</strong> est dû le {}.</p>",
        escape_html(full_name),
        escape_html(fee_title),
        amount.round_dp(2),
        escape_html(currency),
        due_date.format("%d/%m/%Y")
    );
    EmailTemplate {
        subject: format!("Rappel de paiement : {}", fee_title),
        html: layout("Rappel de paiement", &body),
    }
}

pub fn registration_approved_template(full_name: &str, residence_name: &str) -> EmailTemplate {
    let body = format!(
        "<p>Bonjour {},</p><p>Votre inscription à la résidence <strong>{}</strong> a été approuvée.</p>",
        escape_html(full_name),
        escape_html(residence_name)
    );
    EmailTemplate {
        subject: "Inscription approuvée".to_string(),
        html: layout("Bienvenue", &body),
    }
}

pub fn registration_rejected_template(
    full_name: &str,
    residence_name: &str,
    reason: Option<&str>,
) -> EmailTemplate {
    let reason = reason
        .map(|r| format!("<p>Motif : {}</p>", escape_html(r)))
        .unwrap_or_default();
    let body = format!(
        "<p>Bonjour {},</p><p>Votre inscription à la résidence <strong>{}</strong> a été refusée.</p>{}",
        escape_html(full_name),
        escape_html(residence_name),
        reason
    );
    EmailTemplate {
        subject: "Inscription refusée".to_string(),
        html: layout("Inscription refusée", &body),
    }
}

impl EmailService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, to: &str, template: &EmailTemplate) -> AppResult<()> {
        if !self.config.email_enabled {
            tracing::info!("Email disabled. '{}' for {}", template.subject, to);
            return Ok(());
        }

        let request = SendEmailRequest {
            from: &self.config.email_from,
            to: [to],
            subject: &template.subject,
            html: &template.html,
        };

        let response = self
            .client
            .post(&self.config.email_api_url)
            .bearer_auth(&self.config.email_api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        if !status.is_success() {
            tracing::error!("Email API error: {} - {}", status, body);
            return Err(AppError::Email(format!("Email API error: {}", status)));
        }

        let result: SendEmailResponse =
            serde_json::from_str(&body).map_err(|e| AppError::Email(e.to_string()))?;

        match result.id {
            Some(id) => {
                tracing::info!("Email {} sent to {}", id, to);
                Ok(())
            }
            None => {
                let message = result.message.unwrap_or_else(|| "unknown error".to_string());
                tracing::error!("Email send failed: {}", message);
                Err(AppError::Email(message))
            }
        }
    }

    /// Ошибка отправки логируется и не прерывает основное действие
    pub async fn send_logged(&self, to: &str, template: &EmailTemplate) -> bool {
        match self.send(to, template).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send '{}' to {}: {}", template.subject, to, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_template_mentions_amount_and_date() {
        let template = payment_reminder_template(
            "Salma",
            "Charges communes",
            Decimal::new(30000, 2),
            "MAD",
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        assert_eq!(template.subject, "Rappel de paiement : Charges communes");
        assert!(template.html.contains("300.00 MAD"));
        assert!(template.html.contains("01/04/2024"));
    }

    #[test]
    fn test_rejection_reason_is_optional() {
        let with_reason = registration_rejected_template("Omar", "Atlas", Some("Appartement inconnu"));
        assert!(with_reason.html.contains("Motif : Appartement inconnu"));

        let without = registration_rejected_template("Omar", "Atlas", None);
        assert!(!without.html.contains("Motif"));
    }

    #[test]
    fn test_user_content_is_escaped_in_emails() {
        let payload = "<img src=x onerror=alert(1)>";

        let reminder = payment_reminder_template(
            payload,
            "<script>alert(1)</script>",
            Decimal::new(100, 0),
            "MAD",
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        assert!(!reminder.html.contains("<img"));
        assert!(!reminder.html.contains("<script>"));
        assert!(reminder.html.contains("&lt;img src=x onerror=alert(1)&gt;"));

        let approved = registration_approved_template("Omar", payload);
        assert!(!approved.html.contains("<img"));

        let rejected = registration_rejected_template(payload, "Atlas", Some("<b>non</b>"));
        assert!(!rejected.html.contains("<img"));
        assert!(rejected.html.contains("Motif : &lt;b&gt;non&lt;/b&gt;"));
    }

    #[test]
    fn test_disabled_mode_does_not_call_api() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_access_expiry: 600,
            // Недоступный адрес: любой реальный запрос завершился бы ошибкой
            email_api_url: "http://127.0.0.1:9".to_string(),
            email_api_key: String::new(),
            email_from: "test@example.com".to_string(),
            email_enabled: false,
            minio_endpoint: "http://localhost:9000".to_string(),
            minio_access_key: "key".to_string(),
            minio_secret_key: "secret".to_string(),
            minio_bucket: "test".to_string(),
            minio_public_url: None,
            max_upload_size_mb: 10,
            currency: "MAD".to_string(),
        };
        let service = EmailService::new(config);
        let template = registration_approved_template("Salma", "Atlas");

        assert!(tokio_test::block_on(service.send_logged("salma@example.com", &template)));
    }
}
