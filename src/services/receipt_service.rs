use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Payment, PaymentMethod, PaymentStatus, ReceiptDocument};
use crate::utils::validators::escape_html;

pub struct ReceiptService;

/// Номер квитанции: RC-ГГГГММДД-первые 8 символов id платежа
pub fn receipt_number(payment_id: Uuid, paid_at: DateTime<Utc>) -> String {
    let short = payment_id.simple().to_string()[..8].to_uppercase();
    format!("RC-{}-{}", paid_at.format("%Y%m%d"), short)
}

/// Квитанция выдаётся только за завершённые платежи наличными
pub fn ensure_receipt_eligible(payment: &Payment) -> AppResult<()> {
    if payment.method != PaymentMethod::Cash {
        return Err(AppError::BadRequest(
            "Квитанция доступна только для оплаты наличными".to_string(),
        ));
    }
    if payment.status != PaymentStatus::Completed {
        return Err(AppError::BadRequest(
            "Квитанция доступна только для завершённых платежей".to_string(),
        ));
    }
    Ok(())
}

pub fn render_html(receipt: &ReceiptDocument) -> String {
    let mut rows = vec![
        ("Résidence", escape_html(&receipt.residence_name)),
        ("Résident", escape_html(&receipt.resident_name)),
    ];
    if let Some(apartment) = &receipt.apartment_number {
        rows.push(("Appartement", escape_html(apartment)));
    }
    if let Some(title) = &receipt.fee_title {
        rows.push(("Objet", escape_html(title)));
    }
    rows.push((
        "Montant",
        format!("{} {}", receipt.amount.round_dp(2), escape_html(&receipt.currency)),
    ));
    rows.push(("Mode de paiement", receipt.method.label().to_string()));
    rows.push((
        "Date",
        receipt.paid_at.format("%d/%m/%Y %H:%M").to_string(),
    ));
    if let Some(name) = &receipt.verified_by_name {
        rows.push(("Reçu par", escape_html(name)));
    }

    let body: String = rows
        .iter()
        .map(|(label, value)| format!("<tr><th>{}</th><td>{}</td></tr>", label, value))
        .collect();

    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
            "<title>Reçu {number}</title></head><body>",
            "<h1>Reçu de paiement</h1><p>N° {number}</p>",
            "<table>{body}</table>",
            "<img src=\"{qr}\" alt=\"QR\" width=\"120\" height=\"120\">",
            "</body></html>"
        ),
        number = receipt.receipt_number,
        body = body,
        qr = receipt.qr_code,
    )
}

// QR код генерация
pub fn generate_qr_code(data: &str) -> AppResult<Vec<u8>> {
    use image::Luma;
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes()).map_err(|e| AppError::Internal(e.to_string()))?;

    let image = code.render::<Luma<u8>>().build();

    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(buffer.into_inner())
}

pub fn generate_qr_code_base64(data: &str) -> AppResult<String> {
    let png_data = generate_qr_code(data)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &png_data)
    ))
}

impl ReceiptService {
    pub async fn build(pool: &PgPool, payment: &Payment, currency: &str) -> AppResult<ReceiptDocument> {
        ensure_receipt_eligible(payment)?;

        let (residence_name,): (String,) =
            sqlx::query_as("SELECT name FROM residences WHERE id = $1")
                .bind(payment.residence_id)
                .fetch_one(pool)
                .await?;

        let (resident_name, apartment_number): (String, Option<String>) = sqlx::query_as(
            r#"
            SELECT p.full_name, pr.apartment_number
            FROM profiles p
            LEFT JOIN profile_residences pr
                ON pr.profile_id = p.id AND pr.residence_id = $2
            WHERE p.id = $1
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.residence_id)
        .fetch_one(pool)
        .await?;

        let fee_title = match payment.fee_id {
            Some(fee_id) => sqlx::query_as::<_, (String,)>("SELECT title FROM fees WHERE id = $1")
                .bind(fee_id)
                .fetch_optional(pool)
                .await?
                .map(|(title,)| title),
            None => payment.note.clone(),
        };

        let verified_by_name = match payment.verified_by {
            Some(syndic_id) => {
                sqlx::query_as::<_, (String,)>("SELECT full_name FROM profiles WHERE id = $1")
                    .bind(syndic_id)
                    .fetch_optional(pool)
                    .await?
                    .map(|(name,)| name)
            }
            None => None,
        };

        let number = receipt_number(payment.id, payment.paid_at);
        let qr_code = generate_qr_code_base64(&format!("{}:{}", number, payment.id))?;

        Ok(ReceiptDocument {
            receipt_number: number,
            payment_id: payment.id,
            residence_name,
            resident_name,
            apartment_number,
            amount: payment.amount,
            currency: currency.to_string(),
            method: payment.method,
            fee_title,
            paid_at: payment.paid_at,
            verified_by_name,
            qr_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn cash_payment() -> Payment {
        Payment {
            id: Uuid::parse_str("3f2b8c1e-0000-4000-8000-000000000001").unwrap(),
            user_id: Uuid::new_v4(),
            residence_id: Uuid::new_v4(),
            fee_id: None,
            amount: Decimal::new(45000, 2),
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            note: None,
            paid_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap(),
            verified_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_receipt_number_format() {
        let payment = cash_payment();
        assert_eq!(
            receipt_number(payment.id, payment.paid_at),
            "RC-20240305-3F2B8C1E"
        );
    }

    #[test]
    fn test_only_completed_cash_payments_get_receipts() {
        let mut payment = cash_payment();
        assert!(ensure_receipt_eligible(&payment).is_ok());

        payment.method = PaymentMethod::Check;
        assert!(ensure_receipt_eligible(&payment).is_err());

        payment.method = PaymentMethod::Cash;
        payment.status = PaymentStatus::Rejected;
        assert!(ensure_receipt_eligible(&payment).is_err());
    }

    #[test]
    fn test_html_receipt_escapes_user_content() {
        let payment = cash_payment();
        let receipt = ReceiptDocument {
            receipt_number: receipt_number(payment.id, payment.paid_at),
            payment_id: payment.id,
            residence_name: "Les <Jardins>".to_string(),
            resident_name: "Amine & Sara".to_string(),
            apartment_number: Some("12".to_string()),
            amount: payment.amount,
            currency: "MAD".to_string(),
            method: payment.method,
            fee_title: None,
            paid_at: payment.paid_at,
            verified_by_name: None,
            qr_code: "data:image/png;base64,AAAA".to_string(),
        };

        let html = render_html(&receipt);
        assert!(html.contains("Les &lt;Jardins&gt;"));
        assert!(html.contains("Amine &amp; Sara"));
        assert!(html.contains("450.00 MAD"));
        assert!(html.contains("Espèces"));
    }

    #[test]
    fn test_qr_code_is_png_data_url() {
        let qr = generate_qr_code_base64("RC-20240305-3F2B8C1E").unwrap();
        assert!(qr.starts_with("data:image/png;base64,"));
    }
}
