use crate::domain::enrollment::Enrollment;
use crate::domain::money::Money;
use crate::error::Result;
use chrono::{DateTime, NaiveDate};
use std::io::Write;

const HEADERS: [&str; 21] = [
    "ID",
    "Nome Completo",
    "Email",
    "Telefone",
    "CPF",
    "RG",
    "Data Nascimento",
    "Tamanho Camiseta",
    "Membro Batista Capital",
    "Igreja",
    "Líder PG",
    "Produto",
    "Lote",
    "Status",
    "Método Pagamento",
    "Parcelas",
    "Valor Total",
    "Desconto",
    "Valor Final",
    "Data Inscrição",
    "Data Pagamento",
];

/// Writes an admin enrollment listing as CSV, one row per enrollment.
///
/// Wraps `csv::Writer`; every field is quoted so spreadsheets keep CPFs and
/// phone numbers as text.
pub struct EnrollmentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> EnrollmentWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(sink);
        Self { writer }
    }

    pub fn write_enrollments<'a, I>(&mut self, enrollments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Enrollment>,
    {
        self.writer.write_record(HEADERS)?;
        for enrollment in enrollments {
            self.writer.write_record(row(enrollment))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn row(e: &Enrollment) -> Vec<String> {
    let email = e
        .user_email
        .clone()
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| e.form_field("email"));
    vec![
        e.id.to_string(),
        e.form_field("nome_completo"),
        email,
        e.form_field("telefone"),
        e.form_field("cpf"),
        e.form_field("rg"),
        br_date(&e.form_field("data_nascimento")),
        e.form_field("tamanho_camiseta"),
        e.form_field("membro_batista_capital"),
        e.form_field("igreja"),
        e.form_field("lider_pg"),
        e.product_label().to_string(),
        e.batch_label().to_string(),
        e.status.as_str().to_string(),
        e.payment_method
            .map(|m| m.label().to_string())
            .unwrap_or_default(),
        e.installments.map(|n| n.to_string()).unwrap_or_default(),
        amount(e.total_amount),
        amount(e.discount_amount),
        amount(Some(e.final_amount)),
        e.created_at.as_deref().map(br_date).unwrap_or_default(),
        e.paid_at.as_deref().map(br_date).unwrap_or_default(),
    ]
}

fn amount(value: Option<Money>) -> String {
    value
        .map(|m| format!("{:.2}", m.round_cents().value()))
        .unwrap_or_default()
}

/// `dd/mm/yyyy` for an ISO timestamp or date; anything else is kept as is.
fn br_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%d/%m/%Y").to_string();
    }
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}
