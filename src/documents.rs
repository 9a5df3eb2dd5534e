//! Fixed-layout commercial documents.
//!
//! [`render`] lays a quotation or proposal out as a [`Document`]; optional
//! sections only appear when the record carries the data. Plain text via
//! [`Document::to_text`] is the only output format; PDF is not produced.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Company, Proposal, Quotation};

const TEXT_WIDTH: usize = 72;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SectionBody {
    Lines(Vec<String>),
    Table { columns: Vec<String>, rows: Vec<Vec<String>> },
    /// Label / amount pairs, right-aligned in text output.
    Summary(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    fn lines(heading: &str, lines: Vec<String>) -> Self {
        Self {
            heading: heading.to_string(),
            body: SectionBody::Lines(lines),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.heading == heading)
    }

    /// Plain text, `TEXT_WIDTH` columns wide.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&center(&self.title));
        out.push('\n');
        out.push_str(&"=".repeat(TEXT_WIDTH));
        out.push('\n');

        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.heading.to_uppercase());
            out.push('\n');
            out.push_str(&"-".repeat(section.heading.len()));
            out.push('\n');

            match &section.body {
                SectionBody::Lines(lines) => {
                    for line in lines {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                SectionBody::Table { columns, rows } => render_table(&mut out, columns, rows),
                SectionBody::Summary(pairs) => {
                    for (label, amount) in pairs {
                        let label = format!("{}:", label);
                        let pad = TEXT_WIDTH.saturating_sub(label.len() + amount.len());
                        out.push_str(&format!("{}{}{}\n", label, " ".repeat(pad), amount));
                    }
                }
            }
        }
        out
    }
}

pub trait Renderable {
    fn to_document(&self, company: &Company) -> Document;
}

pub fn render<T: Renderable>(record: &T, company: &Company) -> Document {
    record.to_document(company)
}

impl Renderable for Quotation {
    fn to_document(&self, company: &Company) -> Document {
        let totals = self.totals();
        let mut sections = vec![
            issuer_section(company),
            Section::lines(
                "Client",
                vec![self.client_name.clone()]
                    .into_iter()
                    .chain(self.client_email.clone())
                    .collect(),
            ),
            Section::lines(
                "Reference",
                vec![
                    format!("No. {}", self.number),
                    format!("Date: {}", format_date(self.created_at)),
                ],
            ),
            Section {
                heading: "Items".to_string(),
                body: SectionBody::Table {
                    columns: ["Description", "Site", "Qty", "Months", "Unit price", "Amount"]
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                    rows: self
                        .items
                        .iter()
                        .map(|item| {
                            vec![
                                item.description.clone(),
                                item.site_code.clone().unwrap_or_else(|| "-".to_string()),
                                item.quantity.to_string(),
                                item.months.to_string(),
                                format_money(item.unit_price),
                                format_money(item.amount()),
                            ]
                        })
                        .collect(),
                },
            },
        ];

        let mut summary = vec![("Subtotal".to_string(), format_money(totals.subtotal))];
        if totals.discount > 0.0 {
            summary.push(("Discount".to_string(), format!("-{}", format_money(totals.discount))));
        }
        summary.push((
            format!("Tax ({}%)", format_rate(self.tax_rate)),
            format_money(totals.tax),
        ));
        summary.push(("Total".to_string(), format_money(totals.total)));
        sections.push(Section {
            heading: "Totals".to_string(),
            body: SectionBody::Summary(summary),
        });

        if let Some(valid_until) = self.valid_until {
            sections.push(Section::lines(
                "Validity",
                vec![format!("Valid until {}", format_date(valid_until))],
            ));
        }
        if let Some(notes) = &self.notes {
            sections.push(Section::lines("Notes", notes.lines().map(str::to_string).collect()));
        }

        Document {
            title: format!("{} {}", self.kind.label(), self.number),
            sections,
        }
    }
}

impl Renderable for Proposal {
    fn to_document(&self, company: &Company) -> Document {
        let mut sections = vec![
            issuer_section(company),
            Section::lines(
                "Client",
                vec![self.client_name.clone()]
                    .into_iter()
                    .chain(self.client_email.clone())
                    .collect(),
            ),
            Section::lines(
                "Reference",
                vec![
                    format!("Status: {}", self.status.as_str()),
                    format!("Date: {}", format_date(self.created_at)),
                ],
            ),
        ];

        if !self.sites.is_empty() {
            sections.push(Section::lines(
                "Sites",
                self.sites
                    .iter()
                    .enumerate()
                    .map(|(i, site)| format!("{:>3}. {}", i + 1, site))
                    .collect(),
            ));
        }
        if let Some(valid_until) = self.valid_until {
            sections.push(Section::lines(
                "Validity",
                vec![format!("Valid until {}", format_date(valid_until))],
            ));
        }
        if let Some(notes) = &self.notes {
            sections.push(Section::lines("Notes", notes.lines().map(str::to_string).collect()));
        }

        Document {
            title: format!("Proposal: {}", self.title),
            sections,
        }
    }
}

fn issuer_section(company: &Company) -> Section {
    let lines = std::iter::once(company.name.clone())
        .chain(company.address.clone())
        .chain(company.phone.clone())
        .chain(company.email.clone())
        .collect();
    Section::lines("From", lines)
}

fn render_table(out: &mut String, columns: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                // First column reads left to right; figures align right.
                if i == 0 {
                    format!("{:<width$}", cell, width = *width)
                } else {
                    format!("{:>width$}", cell, width = *width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    out.push_str(&format_row(columns));
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
}

fn center(text: &str) -> String {
    let pad = TEXT_WIDTH.saturating_sub(text.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

fn format_rate(rate: f64) -> String {
    let percent = crate::models::quotation::round_money(rate * 100.0);
    if percent.fract() == 0.0 {
        format!("{}", percent as i64)
    } else {
        format!("{}", percent)
    }
}

/// Two decimals with thousands separators: `1234567.5` -> `1,234,567.50`.
pub fn format_money(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, QuotationKind};
    use chrono::TimeZone;

    fn company() -> Company {
        let mut company = Company::new("Skyline Outdoor");
        company.address = Some("12 Ayala Ave, Makati".to_string());
        company
    }

    fn quotation() -> Quotation {
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        Quotation {
            id: "q-1".to_string(),
            company_id: "co-1".to_string(),
            proposal_id: None,
            kind: QuotationKind::Quotation,
            number: "Q-202403-0007".to_string(),
            client_name: "Acme Beverages".to_string(),
            client_email: None,
            items: vec![LineItem {
                site_code: Some("EDSA-NB-01".to_string()),
                ..LineItem::new("Billboard rental", 1, 150_000.0, 3)
            }],
            tax_rate: 0.12,
            discount: 0.0,
            status: "draft".to_string(),
            notes: None,
            valid_until: None,
            created_by: "u1".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(1_234_567.5), "1,234,567.50");
        assert_eq!(format_money(-42.1), "-42.10");
    }

    #[test]
    fn test_quotation_optional_sections_absent() {
        let doc = render(&quotation(), &company());
        assert_eq!(doc.title, "Quotation Q-202403-0007");
        assert!(doc.section("Notes").is_none());
        assert!(doc.section("Validity").is_none());

        let Some(Section { body: SectionBody::Summary(summary), .. }) = doc.section("Totals") else {
            panic!("totals section missing");
        };
        let labels: Vec<_> = summary.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Subtotal", "Tax (12%)", "Total"]);
        assert_eq!(summary[2].1, "504,000.00");
    }

    #[test]
    fn test_quotation_optional_sections_present() {
        let mut q = quotation();
        q.discount = 50_000.0;
        q.notes = Some("Printing not included.\nPermits by client.".to_string());
        q.valid_until = Some(Utc.with_ymd_and_hms(2024, 4, 4, 0, 0, 0).unwrap());

        let doc = render(&q, &company());
        assert!(doc.section("Notes").is_some());
        let text = doc.to_text();
        assert!(text.contains("Valid until April 4, 2024"));
        assert!(text.contains("Discount:"));
        assert!(text.contains("-50,000.00"));
        assert!(text.contains("Permits by client."));
    }

    #[test]
    fn test_text_layout() {
        let text = render(&quotation(), &company()).to_text();
        assert!(text.lines().all(|line| line.chars().count() <= TEXT_WIDTH));
        assert!(text.contains("EDSA-NB-01"));
        assert!(text.contains("12 Ayala Ave, Makati"));
        assert!(text.contains("Date: March 5, 2024"));
    }

    #[test]
    fn test_proposal_document() {
        let mut proposal = Proposal::new("co-1", "u1", "Northwind Telecom", "Airport static boards");
        proposal.sites = vec!["NAIA-T3-01".to_string(), "NAIA-T3-02".to_string()];

        let doc = render(&proposal, &company());
        assert_eq!(doc.title, "Proposal: Airport static boards");
        assert!(doc.section("Notes").is_none());
        let text = doc.to_text();
        assert!(text.contains("  2. NAIA-T3-02"));
        assert!(text.contains("Status: draft"));
    }
}
