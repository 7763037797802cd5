use crate::normalize::{Record, RecordSet, parse_number};
use serde_json::Value;
use std::collections::HashSet;

/// Summary figures for the dashboard cards. Derived on demand from a
/// record set, never persisted; every upload attempt recomputes from
/// scratch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    pub total_revenue: f64,
    pub invoice_count: usize,
    pub unique_product_count: usize,
    pub unique_customer_count: usize,
    pub average_transaction_value: f64,
}

// The record schema is open, so each figure probes a candidate list of
// field names and takes the first present. Keyed to the spellings the
// three backend shapes have been seen to emit.
const AMOUNT_FIELDS: [&str; 5] = [
    "total_amount",
    "Item Total Amount",
    "totalAmount",
    "amount",
    "total",
];
const INVOICE_ID_FIELDS: [&str; 6] = [
    "serial_number",
    "Serial Number",
    "id",
    "invoice_id",
    "invoiceId",
    "invoice_number",
];
const PRODUCT_NAME_FIELDS: [&str; 4] = ["product_name", "Product Name", "productName", "name"];
const CUSTOMER_ID_FIELDS: [&str; 5] = ["customer_name", "Customer Name", "customerName", "name", "id"];
// When there is no dedicated entity array the values come from the
// invoice rows themselves (the tabular shape folds everything into one table).
// Generic keys like "name"/"id" mean something else on an invoice row,
// so the fallback probes only the unambiguous spellings.
const PRODUCT_FALLBACK_FIELDS: [&str; 3] = ["product_name", "Product Name", "productName"];
const CUSTOMER_FALLBACK_FIELDS: [&str; 3] = ["customer_name", "Customer Name", "customerName"];

/// Compute summary statistics over a canonical record set.
///
/// Invoices are counted by distinct identifier when any row carries one,
/// by row count otherwise. The average is defined as 0 for an empty set
/// rather than NaN.
pub fn aggregate(set: &RecordSet) -> SummaryStats {
    let total_revenue: f64 = set
        .invoices
        .iter()
        .map(|rec| field_number(rec, &AMOUNT_FIELDS).unwrap_or(0.0))
        .sum();

    let invoice_ids: HashSet<String> = set
        .invoices
        .iter()
        .filter_map(|rec| field_string(rec, &INVOICE_ID_FIELDS))
        .collect();
    let invoice_count = if invoice_ids.is_empty() {
        set.invoices.len()
    } else {
        invoice_ids.len()
    };

    let unique_product_count = distinct(
        &set.products,
        &PRODUCT_NAME_FIELDS,
        &set.invoices,
        &PRODUCT_FALLBACK_FIELDS,
    );
    let unique_customer_count = distinct(
        &set.customers,
        &CUSTOMER_ID_FIELDS,
        &set.invoices,
        &CUSTOMER_FALLBACK_FIELDS,
    );

    let average_transaction_value = if invoice_count == 0 {
        0.0
    } else {
        total_revenue / invoice_count as f64
    };

    SummaryStats {
        total_revenue,
        invoice_count,
        unique_product_count,
        unique_customer_count,
        average_transaction_value,
    }
}

/// Distinct values across a dedicated entity array, falling back to the
/// invoice rows when the server folded everything into one table
/// (the tabular shape has no separate products/customers arrays).
fn distinct(
    entities: &[Record],
    entity_fields: &[&str],
    invoices: &[Record],
    fallback_fields: &[&str],
) -> usize {
    let (source, fields) = if entities.is_empty() {
        (invoices, fallback_fields)
    } else {
        (entities, entity_fields)
    };
    source
        .iter()
        .filter_map(|rec| field_string(rec, fields))
        .collect::<HashSet<_>>()
        .len()
}

fn field_string(rec: &Record, candidates: &[&str]) -> Option<String> {
    for key in candidates {
        match rec.get(*key) {
            Some(Value::String(s)) if !s.is_empty() && s != "N/A" => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn field_number(rec: &Record, candidates: &[&str]) -> Option<f64> {
    candidates.iter().find_map(|key| rec.get(*key).and_then(parse_number))
}
