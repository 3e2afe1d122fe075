//! Vendor SQL fragment registry.
//!
//! Each adapter loads `base.yaml` plus its vendor file from embedded assets
//! and merges them key-wise (vendor overrides base) into seven sub-maps.
//! Fragments are looked up by dotted path (`core.drop_table`,
//! `general_type_map.integer`, ...) and rendered by `{name}` substitution.
//! Templates are immutable once loaded.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, TransferError};

/// The seven fragment maps of one vendor's template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub core: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub analysis: HashMap<String, String>,
    #[serde(default)]
    pub function: HashMap<String, String>,
    #[serde(default)]
    pub general_type_map: HashMap<String, String>,
    #[serde(default)]
    pub native_type_map: HashMap<String, String>,
    #[serde(default)]
    pub variable: HashMap<String, String>,
}

const BASE_YAML: &str = include_str!("templates/base.yaml");

fn vendor_yaml(vendor: &str) -> Option<&'static str> {
    match vendor {
        "postgres" => Some(include_str!("templates/postgres.yaml")),
        "redshift" => Some(include_str!("templates/redshift.yaml")),
        "mysql" => Some(include_str!("templates/mysql.yaml")),
        "oracle" => Some(include_str!("templates/oracle.yaml")),
        "sqlserver" => Some(include_str!("templates/sqlserver.yaml")),
        "sqlite" => Some(include_str!("templates/sqlite.yaml")),
        _ => None,
    }
}

impl Template {
    /// Load the merged template for a vendor.
    pub fn load(vendor: &str) -> Result<Template> {
        let mut template: Template = serde_yaml::from_str(BASE_YAML)?;
        let vendor_src = vendor_yaml(vendor)
            .ok_or_else(|| TransferError::TemplateMissing(format!("{}.yaml", vendor)))?;
        let overlay: Template = serde_yaml::from_str(vendor_src)?;
        template.merge(overlay);
        Ok(template)
    }

    fn merge(&mut self, other: Template) {
        self.core.extend(other.core);
        self.metadata.extend(other.metadata);
        self.analysis.extend(other.analysis);
        self.function.extend(other.function);
        self.general_type_map.extend(other.general_type_map);
        self.native_type_map.extend(other.native_type_map);
        self.variable.extend(other.variable);
    }

    /// Look up a fragment by dotted path. Empty string when absent, mirroring
    /// optional variables; use [`Template::require`] for mandatory fragments.
    pub fn value(&self, path: &str) -> String {
        let Some((prefix, key)) = path.split_once('.') else {
            return String::new();
        };
        let map = match prefix {
            "core" => &self.core,
            "metadata" => &self.metadata,
            "analysis" => &self.analysis,
            "function" => &self.function,
            "general_type_map" => &self.general_type_map,
            "native_type_map" => &self.native_type_map,
            "variable" => &self.variable,
            _ => return String::new(),
        };
        map.get(key).cloned().unwrap_or_default()
    }

    /// Like [`Template::value`] but a missing fragment is an error.
    pub fn require(&self, path: &str) -> Result<String> {
        let v = self.value(path);
        if v.is_empty() {
            return Err(TransferError::TemplateMissing(path.to_string()));
        }
        Ok(v)
    }
}

/// Substitute `{name}` occurrences from alternating `(name, value)` pairs.
pub fn render(format: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = format.to_string();
    for (name, value) in pairs {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Map-based variant of [`render`].
pub fn render_map(format: &str, values: &HashMap<String, String>) -> String {
    let mut out = format.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENDORS: &[&str] = &[
        "postgres",
        "redshift",
        "mysql",
        "oracle",
        "sqlserver",
        "sqlite",
    ];

    #[test]
    fn test_all_vendor_templates_parse() {
        for vendor in VENDORS {
            let t = Template::load(vendor).unwrap();
            assert!(!t.core.is_empty(), "{} core empty", vendor);
            assert!(
                !t.general_type_map.is_empty(),
                "{} general_type_map empty",
                vendor
            );
            // every vendor must be able to render the core DDL set
            for key in ["core.create_table", "core.drop_table", "core.insert"] {
                assert!(!t.value(key).is_empty(), "{} missing {}", vendor, key);
            }
            assert!(!t.value("variable.bind_string").is_empty(), "{}", vendor);
        }
    }

    #[test]
    fn test_vendor_overrides_base() {
        let pg = Template::load("postgres").unwrap();
        assert_eq!(pg.value("variable.bind_string"), "${i}");
        let my = Template::load("mysql").unwrap();
        assert_eq!(my.value("variable.bind_string"), "?");
    }

    #[test]
    fn test_unknown_vendor() {
        assert!(Template::load("voltdb").is_err());
    }

    #[test]
    fn test_value_and_require() {
        let t = Template::load("postgres").unwrap();
        assert_eq!(t.value("nope"), "");
        assert_eq!(t.value("core.nope"), "");
        assert!(t.require("core.nope").is_err());
        assert!(t.require("core.drop_table").is_ok());
    }

    #[test]
    fn test_render_pairs() {
        let out = render(
            "drop table {table} -- {table}",
            &[("table", "public.place")],
        );
        assert_eq!(out, "drop table public.place -- public.place");
    }

    #[test]
    fn test_render_map() {
        let mut values = HashMap::new();
        values.insert("schema".to_string(), "public".to_string());
        values.insert("table".to_string(), "place".to_string());
        let out = render_map("select * from {schema}.{table}", &values);
        assert_eq!(out, "select * from public.place");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{a} {b}", &[("a", "1")]), "1 {b}");
    }
}
