//! Shallow-recursive merge of TOML tables: `overlay` wins per leaf key.

use toml::Value;

/// Merge `overlay` onto `base` in place, recursing into nested tables and
/// overwriting `base`'s leaves (or whole non-table values) with `overlay`'s.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_table.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::toml;

    #[test]
    fn overlay_leaf_wins() {
        let mut base: Value = toml! { [server]
            port = 1
            host = "a"
        }
        .into();
        let overlay: Value = toml! { [server]
            port = 2
        }
        .into();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["server"]["port"].as_integer(), Some(2));
        assert_eq!(base["server"]["host"].as_str(), Some("a"));
    }

    #[test]
    fn overlay_adds_new_tables() {
        let mut base: Value = toml! { [server]
            port = 1
        }
        .into();
        let overlay: Value = toml! { [runtime]
            port = 2
        }
        .into();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["runtime"]["port"].as_integer(), Some(2));
    }
}
