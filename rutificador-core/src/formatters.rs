//! Output serializers for already validated, already formatted identifiers
//!
//! Formatters never re-validate: they receive the strings produced by the
//! batch processor and only serialize them.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Serializer for a list of identifiers
pub trait RutFormatter: Send + Sync {
    fn format(&self, ruts: &[String]) -> String;
}

fn warn_if_empty(ruts: &[String]) {
    if ruts.is_empty() {
        warn!("Empty RUT list passed to formatter");
    }
}

/// One column CSV with a header row
///
/// Values starting with `=`, `+`, `-` or `@` are prefixed with `'` so that
/// spreadsheet tools do not evaluate them as formulas.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub header: String,
    pub line_delimiter: String,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self {
            header: "rut".to_string(),
            line_delimiter: "\n".to_string(),
        }
    }
}

impl CsvFormatter {
    fn field(value: &str) -> String {
        let value = match value.chars().next() {
            Some('=' | '+' | '-' | '@') => format!("'{}", value),
            _ => value.to_string(),
        };
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value
        }
    }
}

impl RutFormatter for CsvFormatter {
    fn format(&self, ruts: &[String]) -> String {
        warn_if_empty(ruts);
        std::iter::once(Self::field(&self.header))
            .chain(ruts.iter().map(|r| Self::field(r)))
            .collect::<Vec<_>>()
            .join(&self.line_delimiter)
    }
}

/// `<root><rut>..</rut></root>` with four-space indented items
#[derive(Debug, Clone)]
pub struct XmlFormatter {
    pub root_element: String,
    pub item_element: String,
}

impl Default for XmlFormatter {
    fn default() -> Self {
        Self {
            root_element: "root".to_string(),
            item_element: "rut".to_string(),
        }
    }
}

/// Escape text for XML content and attribute values
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

impl RutFormatter for XmlFormatter {
    fn format(&self, ruts: &[String]) -> String {
        warn_if_empty(ruts);
        let mut lines = Vec::with_capacity(ruts.len() + 2);
        lines.push(format!("<{}>", self.root_element));
        for rut in ruts {
            lines.push(format!(
                "    <{item}>{}</{item}>",
                escape_xml(rut),
                item = self.item_element
            ));
        }
        lines.push(format!("</{}>", self.root_element));
        lines.join("\n")
    }
}

/// Array of single-key objects
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pub key: String,
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self {
            key: "rut".to_string(),
            pretty: true,
        }
    }
}

impl RutFormatter for JsonFormatter {
    fn format(&self, ruts: &[String]) -> String {
        warn_if_empty(ruts);
        let items: Vec<Value> = ruts
            .iter()
            .map(|rut| {
                let mut obj = Map::new();
                obj.insert(self.key.clone(), Value::String(rut.clone()));
                Value::Object(obj)
            })
            .collect();
        let value = Value::Array(items);
        // Serializing a Value built from strings cannot fail
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        rendered.unwrap_or_default()
    }
}

type FormatterFactory = Arc<dyn Fn() -> Box<dyn RutFormatter> + Send + Sync>;

/// Name to formatter constructor map
///
/// Names are case-insensitive. `csv`, `xml` and `json` are always present.
#[derive(Clone)]
pub struct FormatterRegistry {
    factories: BTreeMap<String, FormatterFactory>,
}

impl FormatterRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.insert("csv", || Box::new(CsvFormatter::default()));
        registry.insert("xml", || Box::new(XmlFormatter::default()));
        registry.insert("json", || Box::new(JsonFormatter::default()));
        registry
    }

    fn insert<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn RutFormatter> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    /// Register (or replace) a formatter under `name`
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn RutFormatter> + Send + Sync + 'static,
    {
        self.insert(name, factory);
        info!(format = %name, "Custom formatter registered");
    }

    pub fn get(&self, name: &str) -> Option<Box<dyn RutFormatter>> {
        self.factories.get(&name.to_lowercase()).map(|f| f())
    }

    /// Like [`get`](Self::get), failing with the list of known names
    pub fn require(&self, name: &str) -> Result<Box<dyn RutFormatter>> {
        self.get(name).ok_or_else(|| Error::UnsupportedFormat {
            requested: name.to_string(),
            available: self.available().join(", "),
        })
    }

    /// Registered names, sorted
    pub fn available(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("formats", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_csv() {
        let out = CsvFormatter::default().format(&ruts(&["12345678-5", "6-k"]));
        assert_eq!(out, "rut\n12345678-5\n6-k");
    }

    #[test]
    fn test_csv_formula_guard_and_quoting() {
        let out = CsvFormatter::default().format(&ruts(&["=SUM(A1)", "-1", "a,b", "x\"y"]));
        assert_eq!(out, "rut\n'=SUM(A1)\n'-1\n\"a,b\"\n\"x\"\"y\"");
    }

    #[test]
    fn test_csv_empty_is_header_only() {
        assert_eq!(CsvFormatter::default().format(&[]), "rut");
    }

    #[test]
    fn test_xml() {
        let out = XmlFormatter::default().format(&ruts(&["12345678-5"]));
        assert_eq!(out, "<root>\n    <rut>12345678-5</rut>\n</root>");
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(
            escape_xml("<a href='x'>&\"</a>"),
            "&lt;a href=&#x27;x&#x27;&gt;&amp;&quot;&lt;/a&gt;"
        );
        let formatter = XmlFormatter {
            root_element: "ruts".to_string(),
            item_element: "id".to_string(),
        };
        assert_eq!(formatter.format(&[]), "<ruts>\n</ruts>");
    }

    #[test]
    fn test_json_pretty_and_compact() {
        let items = ruts(&["12345678-5", "6-k"]);
        let compact = JsonFormatter {
            key: "id".to_string(),
            pretty: false,
        };
        assert_eq!(
            compact.format(&items),
            r#"[{"id":"12345678-5"},{"id":"6-k"}]"#
        );

        let pretty = JsonFormatter::default().format(&items);
        let parsed: Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed[1]["rut"], "6-k");
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FormatterRegistry::new();
        assert_eq!(registry.available(), vec!["csv", "json", "xml"]);
        assert!(registry.get("CSV").is_some());
        assert!(registry.get("yaml").is_none());
    }

    #[test]
    fn test_registry_require_unknown() {
        let err = FormatterRegistry::new().require("yaml").err().unwrap();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("csv, json, xml"));
    }

    struct Pipe;

    impl RutFormatter for Pipe {
        fn format(&self, ruts: &[String]) -> String {
            ruts.join("|")
        }
    }

    #[test]
    fn test_register_custom() {
        let mut registry = FormatterRegistry::new();
        registry.register("Pipe", || Box::new(Pipe));
        let formatter = registry.get("pipe").unwrap();
        assert_eq!(formatter.format(&ruts(&["1-9", "6-k"])), "1-9|6-k");
        assert!(registry.available().contains(&"pipe".to_string()));
    }
}
