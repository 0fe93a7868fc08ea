use chrono::{SecondsFormat, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a JSON string column, returning CorruptRow on parse failure.
pub fn parse_json(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<serde_json::Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Fixed-width UTC timestamp so lexical order matches chronological order.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verso_core::PoemStyle;

    #[test]
    fn parse_enum_success() {
        let result: Result<PoemStyle, _> = parse_enum("haiku", "poems", "style");
        assert_eq!(result.unwrap(), PoemStyle::Haiku);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<PoemStyle, _> = parse_enum("sonnet", "poems", "style");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "poems", column: "style", .. })
        ));
    }

    #[test]
    fn parse_json_failure() {
        let result = parse_json("not valid json", "poems", "metadata");
        assert!(matches!(result, Err(StoreError::CorruptRow { column: "metadata", .. })));
    }

    #[test]
    fn timestamps_sort_lexically() {
        let a = timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = timestamp();
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
