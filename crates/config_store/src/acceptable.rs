use crate::value::SettingValue;

/// Constraint on the values a setting may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptableValues<T> {
    /// Inclusive range; out-of-range values are clamped to the nearest bound.
    Range { min: T, max: T },
    /// Allow-list; values not in the list are replaced by its first element.
    List(Vec<T>),
}

impl<T: SettingValue> AcceptableValues<T> {
    /// Creates a range, swapping the bounds if they are given in reverse.
    pub fn range(min: T, max: T) -> Self {
        if min > max {
            Self::Range { min: max, max: min }
        } else {
            Self::Range { min, max }
        }
    }

    pub fn list(values: impl IntoIterator<Item = T>) -> Self {
        Self::List(values.into_iter().collect())
    }

    pub fn is_valid(&self, value: &T) -> bool {
        match self {
            Self::Range { min, max } => value >= min && value <= max,
            Self::List(values) => values.is_empty() || values.contains(value),
        }
    }

    /// Returns the closest acceptable value.
    pub fn clamp(&self, value: T) -> T {
        match self {
            Self::Range { min, max } => {
                if value < *min {
                    min.clone()
                } else if value > *max {
                    max.clone()
                } else {
                    value
                }
            }
            Self::List(values) => {
                if values.is_empty() || values.contains(&value) {
                    value
                } else {
                    values[0].clone()
                }
            }
        }
    }

    /// Comment line written above the setting in the file.
    pub fn describe(&self) -> String {
        match self {
            Self::Range { min, max } => format!(
                "Acceptable value range: From {} to {}",
                min.to_config_string(),
                max.to_config_string()
            ),
            Self::List(values) => {
                let names: Vec<String> = values.iter().map(SettingValue::to_config_string).collect();
                format!("Acceptable values: {}", names.join(", "))
            }
        }
    }
}
