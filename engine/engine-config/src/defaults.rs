//! Built-in values from `config.defaults.toml`, embedded at compile time.
//!
//! User files only need the keys they change: their table is laid over the
//! default table before deserializing, so every struct field is always set.

use once_cell::sync::Lazy;
use toml::{Table, Value};

use crate::CentralConfig;

const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

static DEFAULT_TABLE: Lazy<Table> = Lazy::new(|| {
    DEFAULTS_TOML
        .parse()
        .expect("config.defaults.toml is valid TOML")
});

pub(crate) static DEFAULT_CONFIG: Lazy<CentralConfig> = Lazy::new(|| {
    Value::Table(DEFAULT_TABLE.clone())
        .try_into()
        .expect("config.defaults.toml sets every key")
});

/// The default table with `overrides` laid over it, section by section.
pub fn merge_with_defaults(overrides: Table) -> Table {
    let mut merged = DEFAULT_TABLE.clone();
    overlay(&mut merged, overrides);
    merged
}

fn overlay(base: &mut Table, top: Table) {
    for (key, value) in top {
        match value {
            Value::Table(section) if base.get(&key).is_some_and(Value::is_table) => {
                if let Some(Value::Table(inner)) = base.get_mut(&key) {
                    overlay(inner, section);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
