//! Parent exchange identity inherited through the process environment.

/// Variable a launcher sets on a spawned process to name the exchange it
/// belongs to, as decimal text.
pub const PARENT_EXCHANGE_ID_VAR: &str = "COM_PARENT_EXCHANGE_ID";

/// Exchange id meaning "not spawned under any exchange".
pub const UNSET_EXCHANGE_ID: u32 = u32::MAX;

/// Parse an exchange id from its environment text.
///
/// Absent or unparseable text yields [`UNSET_EXCHANGE_ID`].
pub fn parse_exchange_id(value: Option<&str>) -> u32 {
    value
        .and_then(|text| text.trim().parse::<u32>().ok())
        .unwrap_or(UNSET_EXCHANGE_ID)
}

/// The exchange id this process was spawned under.
pub fn parent_exchange_id() -> u32 {
    let value = std::env::var(PARENT_EXCHANGE_ID_VAR).ok();
    if let Some(text) = value.as_deref() {
        if text.trim().parse::<u32>().is_err() {
            tracing::warn!(
                variable = PARENT_EXCHANGE_ID_VAR,
                value = text,
                "ignoring unparseable exchange id"
            );
        }
    }
    parse_exchange_id(value.as_deref())
}

/// Environment entry a launcher passes to a child spawned under `exchange_id`.
pub fn child_environment(exchange_id: u32) -> (&'static str, String) {
    (PARENT_EXCHANGE_ID_VAR, exchange_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_text() {
        assert_eq!(parse_exchange_id(Some("17")), 17);
        assert_eq!(parse_exchange_id(Some(" 4 ")), 4);
    }

    #[test]
    fn absent_or_garbage_is_unset() {
        assert_eq!(parse_exchange_id(None), UNSET_EXCHANGE_ID);
        assert_eq!(parse_exchange_id(Some("")), UNSET_EXCHANGE_ID);
        assert_eq!(parse_exchange_id(Some("0x10")), UNSET_EXCHANGE_ID);
        assert_eq!(parse_exchange_id(Some("-1")), UNSET_EXCHANGE_ID);
    }

    #[test]
    fn child_environment_round_trips() {
        let (name, value) = child_environment(23);
        assert_eq!(name, PARENT_EXCHANGE_ID_VAR);
        assert_eq!(parse_exchange_id(Some(&value)), 23);
    }
}
