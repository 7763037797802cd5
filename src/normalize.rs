// src/normalize.rs
//
// The backend's response contract has drifted across deployments; three
// shapes are live in the wild. The per-file shape (`extractedData` with
// the three entity arrays, one element per file) is the contract going
// forward; the flat and tabular shapes are kept as legacy shims. All
// three funnel into the same canonical `RecordSet`.

use crate::error::ExtractError;
use regex::Regex;
use serde_json::{Map, Value, json};

/// One extracted entity, open schema: field name → primitive value.
pub type Record = Map<String, Value>;

/// Canonical output of normalization for one upload attempt. The arrays
/// are always present (empty, never absent) and keep the server's
/// emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub customers: Vec<Record>,
    pub invoices: Vec<Record>,
    pub products: Vec<Record>,
    pub processed_file_names: Vec<String>,
}

impl RecordSet {
    /// Re-wrap the canonical set as a flat payload. One caller
    /// feeds normalized output back through `normalize`, which relies on
    /// this round-trip being lossless for the three entity arrays.
    pub fn to_payload(&self) -> Value {
        json!({
            "success": true,
            "filesProcessed": self.processed_file_names.len(),
            "data": [{
                "invoices": self.invoices,
                "products": self.products,
                "customers": self.customers,
            }]
        })
    }
}

/// Rows whose "Qty" cell carries one of these labels are tax/fee lines or
/// spreadsheet artifacts, not transactions.
const QTY_EXCLUSIONS: [&str; 9] = [
    "CGST",
    "SGST",
    "IGST",
    "ITEM NET AMOUNT",
    "ITEM TOTAL AMOUNT",
    "QTY",
    "EXTRA DISCOUNT",
    "ROUND OFF AMOUNT",
    "CESS",
];

/// Normalize a raw server payload into the canonical record set.
///
/// Pure function, no I/O, never retries. Shape is detected by probing
/// `data[0]`: entity arrays at the top level (flat), per-file
/// `extractedData` holding entity arrays, or per-file
/// `extractedData.originalData` holding display-labeled table rows
/// (tabular). Anything else fails with a `Normalization` error naming
/// the first expectation the payload missed.
pub fn normalize(payload: &Value) -> Result<RecordSet, ExtractError> {
    if payload.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(ExtractError::normalization("success: true"));
    }

    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::normalization("data array"))?;

    let first = data
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| ExtractError::normalization("non-empty data array"))?;

    if first.contains_key("invoices")
        || first.contains_key("products")
        || first.contains_key("customers")
    {
        return Ok(from_flat(first));
    }

    let extracted = first
        .get("extractedData")
        .and_then(Value::as_object)
        .ok_or_else(|| ExtractError::normalization("missing data[0].extractedData"))?;

    if extracted.contains_key("originalData") {
        from_tabular(first, extracted)
    } else {
        Ok(from_per_file(data))
    }
}

/// Flat shape: `data[0]` carries the three entity arrays directly. This
/// variant never reported per-file provenance, so `processed_file_names`
/// stays empty.
fn from_flat(first: &Map<String, Value>) -> RecordSet {
    RecordSet {
        customers: records_of(first, "customers"),
        invoices: records_of(first, "invoices"),
        products: records_of(first, "products"),
        processed_file_names: Vec::new(),
    }
}

/// Per-file shape: one `data` element per processed file, each wrapping the
/// entity arrays under `extractedData`. Arrays concatenate in emission
/// order; every element carrying `extractedData` contributes its
/// filename once.
fn from_per_file(data: &[Value]) -> RecordSet {
    let mut set = RecordSet::default();

    for element in data {
        let Some(obj) = element.as_object() else {
            continue;
        };
        let Some(extracted) = obj.get("extractedData").and_then(Value::as_object) else {
            continue;
        };

        set.customers.extend(records_of(extracted, "customers"));
        set.invoices.extend(records_of(extracted, "invoices"));
        set.products.extend(records_of(extracted, "products"));

        if let Some(name) = obj.get("filename").and_then(Value::as_str) {
            set.processed_file_names.push(name.to_string());
        }
    }

    set
}

/// Tabular shape: raw table rows keyed by spreadsheet display labels. Summary
/// and tax rows are dropped; the rest become canonical invoice records
/// with parsed numeric fields.
fn from_tabular(
    first: &Map<String, Value>,
    extracted: &Map<String, Value>,
) -> Result<RecordSet, ExtractError> {
    let rows = extracted
        .get("originalData")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ExtractError::normalization("data[0].extractedData.originalData array")
        })?;

    let mut set = RecordSet::default();

    for row in rows {
        let Some(row) = row.as_object() else {
            continue;
        };
        if !is_transaction_row(row) {
            continue;
        }

        let mut rec = Record::new();
        rec.insert("serial_number".into(), string_or_na(row, "Serial Number"));
        rec.insert("invoice_date".into(), string_or_na(row, "Invoice Date"));
        rec.insert("product_name".into(), string_or_na(row, "Product Name"));
        rec.insert("quantity".into(), number_or_zero(row.get("Qty")));
        rec.insert(
            "total_amount".into(),
            number_or_zero(row.get("Item Total Amount")),
        );
        set.invoices.push(rec);
    }

    if let Some(name) = first.get("filename").and_then(Value::as_str) {
        set.processed_file_names.push(name.to_string());
    }

    Ok(set)
}

/// A row counts as a transaction when it has a serial number that isn't
/// the "Totals" footer and its Qty cell isn't one of the tax/fee labels.
fn is_transaction_row(row: &Map<String, Value>) -> bool {
    let serial = match row.get("Serial Number") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        Some(Value::Number(_)) => "",
        _ => return false,
    };
    if serial == "Totals" {
        return false;
    }

    match row.get("Qty").and_then(Value::as_str) {
        Some(qty) => !QTY_EXCLUSIONS.contains(&qty),
        None => true,
    }
}

fn records_of(obj: &Map<String, Value>, key: &str) -> Vec<Record> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn string_or_na(row: &Map<String, Value>, key: &str) -> Value {
    match row.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        Some(Value::Number(n)) => Value::String(n.to_string()),
        _ => Value::String("N/A".to_string()),
    }
}

fn number_or_zero(value: Option<&Value>) -> Value {
    let parsed = value.and_then(parse_number).unwrap_or(0.0);
    json!(parsed)
}

/// Parse a numeric field that may arrive as a JSON number or as a string
/// with currency punctuation ("1,234.50", "₹300").
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let re = Regex::new(r"[^0-9.\-]").unwrap();
            let cleaned = re.replace_all(s, "");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}
