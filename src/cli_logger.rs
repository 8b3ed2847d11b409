use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
            return Ok(());
        }

        let rendered = render_value(&serde_json::to_value(value)?, 0);
        println!("{rendered}");
        Ok(())
    }

    /// Rows of flat objects as an aligned table; column order follows the
    /// first row.
    pub fn print_table(&self, rows: &[Value]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(rows)?);
            return Ok(());
        }
        let Some(Value::Object(first)) = rows.first() else {
            println!("{}", self.style("no results", "90"));
            return Ok(());
        };

        let columns = first.keys().cloned().collect::<Vec<_>>();
        let cells = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(render_cell).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let widths = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(c.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect::<Vec<_>>();

        let header = columns
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        let mut out = format!("{}\n", self.style(header.trim_end(), "37;1"));
        for row in &cells {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:>w$}"))
                .collect::<Vec<_>>()
                .join("  ");
            out.push_str(&line);
            out.push('\n');
        }
        println!("{}", out.trim_end());
        Ok(())
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    pub fn print_warning(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "warning",
                "message": msg,
            });
            eprintln!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("warn", "33;1"));
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => format!("{f:.3}"),
            _ => n.to_string(),
        },
        other => render_value(other, 0),
    }
}

fn render_value(value: &Value, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(_) | Value::Array(_) => {
                    format!("{pad}-\n{}", render_value(item, indent + 2))
                }
                _ => format!("{pad}- {}", render_value(item, indent + 2)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| match item {
                Value::Object(m) if !m.is_empty() => {
                    format!("{pad}{key}:\n{}", render_value(item, indent + 2))
                }
                Value::Array(a) if !a.is_empty() => {
                    format!("{pad}{key}:\n{}", render_value(item, indent + 2))
                }
                _ => format!("{pad}{key}: {}", render_value(item, indent + 2)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
