#![allow(dead_code)]

use invoice_agent::data::{DataContext, Scalar, Table};

pub fn s(v: &str) -> Scalar {
    Scalar::Str(v.to_string())
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

fn invoice(id: &str, client: &str, issued: &str, due: &str, status: &str, currency: &str, fx: f64) -> Vec<Scalar> {
    vec![s(id), s(client), s(issued), s(due), s(status), s(currency), Scalar::Float(fx)]
}

fn line(id: &str, invoice: &str, service: &str, quantity: i64, unit_price: f64, tax_rate: f64) -> Vec<Scalar> {
    vec![
        s(id),
        s(invoice),
        s(service),
        Scalar::Int(quantity),
        Scalar::Float(unit_price),
        Scalar::Float(tax_rate),
    ]
}

/// Four clients (two in the UK, one without invoices), three invoices,
/// four line items.
pub fn context() -> DataContext {
    let clients = Table::new(
        cols(&["client_id", "client_name", "industry", "country"]),
        vec![
            vec![s("C001"), s("Acme Corp"), s("Manufacturing"), s("UK")],
            vec![s("C002"), s("Bright Legal"), s("Legal"), s("USA")],
            vec![s("C003"), s("Cobalt Retail"), s("Retail"), s("UK")],
            vec![s("C004"), s("Delta Logistics"), s("Logistics"), s("Germany")],
        ],
    );
    let invoices = Table::new(
        cols(&["invoice_id", "client_id", "invoice_date", "due_date", "status", "currency", "fx_rate_to_usd"]),
        vec![
            invoice("I1001", "C001", "2024-03-05", "2024-04-04", "Paid", "GBP", 1.25),
            invoice("I1002", "C002", "2024-02-10", "2024-03-10", "Overdue", "USD", 1.0),
            invoice("I1003", "C001", "2023-12-01", "2023-12-31", "Paid", "GBP", 1.25),
        ],
    );
    let line_items = Table::new(
        cols(&["line_id", "invoice_id", "service_name", "quantity", "unit_price", "tax_rate"]),
        vec![
            line("L001", "I1001", "Contract Review", 2, 100.0, 0.2),
            line("L002", "I1001", "Tax Planning", 1, 500.0, 0.0),
            line("L003", "I1002", "Court Appearance", 3, 200.0, 0.25),
            line("L004", "I1003", "Training Session", 1, 80.0, 0.5),
        ],
    );
    DataContext::from_tables(clients, invoices, line_items).expect("fixture is valid")
}
