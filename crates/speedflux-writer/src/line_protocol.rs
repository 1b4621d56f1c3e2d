//! InfluxDB line-protocol encoding.
//!
//! `measurement,tag=v,... field=v,... timestamp_ms`
//!
//! Tags and fields are emitted in key order, integers carry the `i`
//! suffix, and timestamps are milliseconds since the epoch (the write
//! request uses `precision=ms`).

use std::fmt::Write;

use speedflux_core::{FieldValue, Record};

pub const PRECISION: &str = "ms";

pub fn encode_batch(batch: &[Record]) -> String {
    let mut out = String::new();
    for (i, record) in batch.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        encode_into(&mut out, record);
    }
    out
}

pub fn encode_record(record: &Record) -> String {
    let mut out = String::new();
    encode_into(&mut out, record);
    out
}

fn encode_into(out: &mut String, record: &Record) {
    escape(out, record.measurement(), &[',', ' ']);

    for (key, value) in record.tags() {
        if value.is_empty() {
            continue;
        }
        out.push(',');
        escape(out, key, &[',', '=', ' ']);
        out.push('=');
        escape(out, value, &[',', '=', ' ']);
    }

    let mut first = true;
    for (key, value) in record.fields() {
        let Some(encoded) = encode_field(*value) else {
            continue;
        };
        out.push(if first { ' ' } else { ',' });
        first = false;
        escape(out, key, &[',', '=', ' ']);
        out.push('=');
        out.push_str(&encoded);
    }

    let _ = write!(out, " {}", record.timestamp().timestamp_millis());
}

/// NaN and infinities have no line-protocol form and are skipped.
fn encode_field(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(v) if v.is_finite() => Some(format!("{v}")),
        FieldValue::Float(_) => None,
        FieldValue::Integer(v) => Some(format!("{v}i")),
        FieldValue::Boolean(v) => Some(v.to_string()),
    }
}

fn escape(out: &mut String, text: &str, special: &[char]) {
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}
