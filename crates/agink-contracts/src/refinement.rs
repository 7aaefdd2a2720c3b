use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! labelled_enum {
    ($name:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let trimmed = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.label().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| {
                        let options = $name::ALL
                            .iter()
                            .map(|value| value.label())
                            .collect::<Vec<&str>>()
                            .join(", ");
                        format!("Unknown {} '{trimmed}' (expected one of: {options}).", $kind)
                    })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Professional,
    #[default]
    Casual,
    Creative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    Concise,
    #[default]
    Descriptive,
    Technical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

labelled_enum!(Plan, "plan", [Free, Paid]);
labelled_enum!(Tone, "tone", [Professional, Casual, Creative]);
labelled_enum!(Style, "style", [Concise, Descriptive, Technical]);
labelled_enum!(Length, "length", [Short, Medium, Long]);

/// The (tone, style, length) triple that shapes a generated prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementOptions {
    pub tone: Tone,
    pub style: Style,
    pub length: Length,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Length, Plan, RefinementOptions, Style, Tone};

    #[test]
    fn defaults_are_casual_descriptive_medium() {
        let options = RefinementOptions::default();
        assert_eq!(options.tone, Tone::Casual);
        assert_eq!(options.style, Style::Descriptive);
        assert_eq!(options.length, Length::Medium);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("paid".parse::<Plan>(), Ok(Plan::Paid));
        assert_eq!(" TECHNICAL ".parse::<Style>(), Ok(Style::Technical));
        assert_eq!("creative".parse::<Tone>(), Ok(Tone::Creative));
        assert_eq!("Long".parse::<Length>(), Ok(Length::Long));
    }

    #[test]
    fn parse_error_lists_options() {
        let err = "loud".parse::<Tone>().err().unwrap_or_default();
        assert_eq!(
            err,
            "Unknown tone 'loud' (expected one of: Professional, Casual, Creative)."
        );
    }

    #[test]
    fn serializes_as_display_names() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_value(Plan::Free)?, json!("Free"));
        assert_eq!(
            serde_json::to_value(RefinementOptions::default())?,
            json!({"tone": "Casual", "style": "Descriptive", "length": "Medium"})
        );
        Ok(())
    }
}
