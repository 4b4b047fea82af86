//! Browser hand-off for desktop payments.
//!
//! A desktop consumption is never sent by us: the signed fields are
//! rendered into a self-submitting HTML form that the merchant site returns
//! to the cardholder's browser, which then posts it to the gateway.

use std::fmt::Write;

use crate::encoding::FieldMap;

/// Render `fields` as an auto-submitting POST form targeting `action`.
///
/// Empty values are skipped. Keys and values are HTML-attribute escaped;
/// the browser unescapes them before posting, so the gateway receives the
/// exact signed text.
pub fn auto_submit_form(fields: &FieldMap, action: &str) -> String {
    let mut inputs = String::new();
    for (key, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        let key = escape_attr(key);
        let _ = write!(
            inputs,
            r#"<input type="hidden" name="{key}" id="{key}" value="{value}" />"#,
            key = key,
            value = escape_attr(&value.to_text()),
        );
    }

    format!(
        concat!(
            r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/></head><body>"#,
            r#"<form id="pay_form" action="{action}" method="POST">{inputs}</form>"#,
            r#"<script type="text/javascript">document.getElementById("pay_form").submit();</script>"#,
            "</body></html>",
        ),
        action = escape_attr(action),
        inputs = inputs,
    )
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
