use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoemStyle {
    #[default]
    FreeVerse,
    Haiku,
    Limerick,
}

impl std::fmt::Display for PoemStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeVerse => write!(f, "free_verse"),
            Self::Haiku => write!(f, "haiku"),
            Self::Limerick => write!(f, "limerick"),
        }
    }
}

impl std::str::FromStr for PoemStyle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free_verse" | "freeverse" | "free-verse" => Ok(Self::FreeVerse),
            "haiku" => Ok(Self::Haiku),
            "limerick" => Ok(Self::Limerick),
            other => Err(format!("unknown poem style: {other}")),
        }
    }
}

/// Cursor policy when a vocabulary word has no position after the current cursor.
///
/// `EarliestPosition` rewinds the cursor to the word's first occurrence after
/// recording the violation; later tokens are then checked against that earlier
/// position, which can hide further violations. `KeepCursor` leaves the cursor
/// where it was.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFallback {
    #[default]
    EarliestPosition,
    KeepCursor,
}

impl std::str::FromStr for OrderFallback {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest_position" => Ok(Self::EarliestPosition),
            "keep_cursor" => Ok(Self::KeepCursor),
            other => Err(format!("unknown order fallback: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parses_back() {
        for style in [PoemStyle::FreeVerse, PoemStyle::Haiku, PoemStyle::Limerick] {
            let parsed: PoemStyle = style.to_string().parse().unwrap();
            assert_eq!(parsed, style);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PoemStyle::FreeVerse).unwrap();
        assert_eq!(json, r#""free_verse""#);
    }

    #[test]
    fn order_fallback_defaults_to_earliest() {
        assert_eq!(OrderFallback::default(), OrderFallback::EarliestPosition);
        let parsed: OrderFallback = serde_json::from_str(r#""keep_cursor""#).unwrap();
        assert_eq!(parsed, OrderFallback::KeepCursor);
        assert_eq!("earliest_position".parse(), Ok(OrderFallback::EarliestPosition));
    }

    #[test]
    fn unknown_style_rejected() {
        assert!("sonnet".parse::<PoemStyle>().is_err());
    }
}
