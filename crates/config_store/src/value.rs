//! Setting value types and their text representation.
//!
//! Every type stored in a [`ConfigFile`](crate::ConfigFile) implements
//! [`SettingValue`], which knows how to write itself into the settings file,
//! read itself back, and coerce a loosely typed [`RawValue`] declared on a
//! model member.

use crate::error::ConversionError;
use std::fmt;

/// A loosely typed value, as declared next to a model member before the
/// member's concrete setting type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
}

impl RawValue {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Char(_) => "char",
            RawValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(v) => write!(f, "{v}"),
            RawValue::Int(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Char(v) => write!(f, "{v}"),
            RawValue::Str(v) => f.write_str(v),
        }
    }
}

macro_rules! raw_from {
    ($variant:ident: $($ty:ty),+) => {$(
        impl From<$ty> for RawValue {
            fn from(value: $ty) -> Self {
                RawValue::$variant(value.into())
            }
        }
    )+};
}

raw_from!(Bool: bool);
raw_from!(Int: i8, i16, i32, i64, u8, u16, u32);
raw_from!(Float: f32, f64);
raw_from!(Char: char);
raw_from!(Str: String, &str);

/// A type that can be stored in a settings file.
///
/// `Default` supplies the zero value used whenever a declared default is
/// missing or cannot be converted.
pub trait SettingValue:
    Clone + PartialEq + PartialOrd + Default + fmt::Debug + Send + Sync + 'static
{
    /// Name written to the `# Setting type:` comment.
    fn type_name() -> &'static str;

    /// Text written after `key = ` in the settings file.
    fn to_config_string(&self) -> String;

    /// Parses the text found in the settings file.
    fn from_config_str(text: &str) -> Result<Self, ConversionError>;

    /// Coerces a loosely typed declared value into this type.
    fn from_raw(raw: &RawValue) -> Result<Self, ConversionError>;

    /// Names of every accepted value, for types with a closed set of values.
    fn variant_names() -> Option<&'static [&'static str]> {
        None
    }
}

/// Rounds a float to the nearest integer when it is finite and in range.
fn rounded_integer(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

macro_rules! impl_integer_setting {
    ($($ty:ty),+ $(,)?) => {$(
        impl SettingValue for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn to_config_string(&self) -> String {
                self.to_string()
            }

            fn from_config_str(text: &str) -> Result<Self, ConversionError> {
                text.trim()
                    .parse::<$ty>()
                    .map_err(|e| ConversionError::new(text, stringify!($ty), e.to_string()))
            }

            fn from_raw(raw: &RawValue) -> Result<Self, ConversionError> {
                match raw {
                    RawValue::Int(v) => <$ty>::try_from(*v)
                        .map_err(|e| ConversionError::new(raw, stringify!($ty), e.to_string())),
                    RawValue::Float(v) => rounded_integer(*v)
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| ConversionError::new(raw, stringify!($ty), "value is out of range")),
                    RawValue::Bool(v) => Ok(if *v { 1 } else { 0 }),
                    RawValue::Str(text) => Self::from_config_str(text),
                    RawValue::Char(_) => Err(ConversionError::new(
                        raw,
                        stringify!($ty),
                        "a character is not a number",
                    )),
                }
            }
        }
    )+};
}

impl_integer_setting!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

macro_rules! impl_float_setting {
    ($($ty:ty),+ $(,)?) => {$(
        impl SettingValue for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn to_config_string(&self) -> String {
                self.to_string()
            }

            fn from_config_str(text: &str) -> Result<Self, ConversionError> {
                text.trim()
                    .parse::<$ty>()
                    .map_err(|e| ConversionError::new(text, stringify!($ty), e.to_string()))
            }

            fn from_raw(raw: &RawValue) -> Result<Self, ConversionError> {
                let converted = match raw {
                    RawValue::Int(v) => *v as $ty,
                    RawValue::Float(v) => *v as $ty,
                    RawValue::Str(text) => return Self::from_config_str(text),
                    RawValue::Bool(_) | RawValue::Char(_) => {
                        return Err(ConversionError::new(
                            raw,
                            stringify!($ty),
                            format!("a {} is not a number", raw.kind()),
                        ))
                    }
                };
                if converted.is_infinite() {
                    return Err(ConversionError::new(raw, stringify!($ty), "value is out of range"));
                }
                Ok(converted)
            }
        }
    )+};
}

impl_float_setting!(f32, f64);

impl SettingValue for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn to_config_string(&self) -> String {
        self.to_string()
    }

    fn from_config_str(text: &str) -> Result<Self, ConversionError> {
        match text.trim() {
            t if t.eq_ignore_ascii_case("true") => Ok(true),
            t if t.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ConversionError::new(text, "bool", "expected 'true' or 'false'")),
        }
    }

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionError> {
        match raw {
            RawValue::Bool(v) => Ok(*v),
            RawValue::Int(0) => Ok(false),
            RawValue::Int(1) => Ok(true),
            RawValue::Str(text) => Self::from_config_str(text),
            _ => Err(ConversionError::new(raw, "bool", "only 0 and 1 convert to bool")),
        }
    }
}

impl SettingValue for char {
    fn type_name() -> &'static str {
        "char"
    }

    fn to_config_string(&self) -> String {
        self.to_string()
    }

    fn from_config_str(text: &str) -> Result<Self, ConversionError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::new(text, "char", "expected exactly one character")),
        }
    }

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionError> {
        match raw {
            RawValue::Char(c) => Ok(*c),
            RawValue::Str(text) => Self::from_config_str(text),
            _ => Err(ConversionError::new(raw, "char", format!("a {} is not a character", raw.kind()))),
        }
    }
}

impl SettingValue for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn to_config_string(&self) -> String {
        escape(self)
    }

    fn from_config_str(text: &str) -> Result<Self, ConversionError> {
        unescape(text)
    }

    /// Every declared value has a text form, so this never fails.
    fn from_raw(raw: &RawValue) -> Result<Self, ConversionError> {
        Ok(raw.to_string())
    }
}

/// Escapes characters that would break the one-line `key = value` layout.
///
/// Whitespace at either end is escaped too, since the parser trims lines.
fn escape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let lead = chars.iter().take_while(|c| c.is_whitespace()).count();
    let trail = chars[lead..].iter().rev().take_while(|c| c.is_whitespace()).count();
    let body = lead..chars.len() - trail;

    let mut escaped = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ' ' if !body.contains(&i) => escaped.push_str("\\s"),
            other if other.is_whitespace() && !body.contains(&i) => {
                escaped.push_str(&format!("\\u{{{:x}}}", other as u32))
            }
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape(text: &str) -> Result<String, ConversionError> {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => unescaped.push('\\'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some('s') => unescaped.push(' '),
            Some('u') => unescaped.push(unescape_code_point(text, &mut chars)?),
            Some(other) => {
                return Err(ConversionError::new(
                    text,
                    "String",
                    format!("unknown escape sequence '\\{other}'"),
                ))
            }
            None => return Err(ConversionError::new(text, "String", "dangling '\\' at end of value")),
        }
    }
    Ok(unescaped)
}

/// Reads the `{hex}` part of a `\u{hex}` escape.
fn unescape_code_point(text: &str, chars: &mut std::str::Chars<'_>) -> Result<char, ConversionError> {
    let invalid = || ConversionError::new(text, "String", "malformed '\\u{..}' escape");
    if chars.next() != Some('{') {
        return Err(invalid());
    }
    let mut hex = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(digit) if digit.is_ascii_hexdigit() && hex.len() < 6 => hex.push(digit),
            _ => return Err(invalid()),
        }
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(invalid)
}

/// Declares a fieldless enum usable as a setting value.
///
/// Variants are written to the settings file by name and read back either by
/// name (case-insensitive) or by discriminant. Exactly one variant must carry
/// `#[default]`; it is the zero value used when a declared default cannot be
/// converted.
///
/// ```
/// config_store::setting_enum! {
///     pub enum Difficulty {
///         Easy = 0,
///         #[default]
///         Normal = 1,
///         Hard = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! setting_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $crate::SettingValue for $name {
            fn type_name() -> &'static str {
                stringify!($name)
            }

            fn to_config_string(&self) -> String {
                match self {
                    $( Self::$variant => stringify!($variant).to_string() ),+
                }
            }

            fn from_config_str(text: &str) -> Result<Self, $crate::ConversionError> {
                let trimmed = text.trim();
                $(
                    if trimmed.eq_ignore_ascii_case(stringify!($variant)) {
                        return Ok(Self::$variant);
                    }
                )+
                match trimmed.parse::<i64>() {
                    Ok(number) => <Self as $crate::SettingValue>::from_raw(&$crate::RawValue::Int(number)),
                    Err(_) => Err($crate::ConversionError::new(text, stringify!($name), "not a declared variant")),
                }
            }

            fn from_raw(raw: &$crate::RawValue) -> Result<Self, $crate::ConversionError> {
                match raw {
                    $crate::RawValue::Int(number) => {
                        $(
                            if *number == ($value as i64) {
                                return Ok(Self::$variant);
                            }
                        )+
                        Err($crate::ConversionError::new(raw, stringify!($name), "no variant has this discriminant"))
                    }
                    $crate::RawValue::Str(text) => <Self as $crate::SettingValue>::from_config_str(text),
                    other => Err($crate::ConversionError::new(
                        other,
                        stringify!($name),
                        format!("a {} does not name a variant", other.kind()),
                    )),
                }
            }

            fn variant_names() -> Option<&'static [&'static str]> {
                Some(&[$( stringify!($variant) ),+])
            }
        }

        impl From<$name> for $crate::RawValue {
            fn from(value: $name) -> Self {
                $crate::RawValue::Int(value as i64)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::setting_enum! {
        enum Mode {
            Below = -1,
            #[default]
            Zero = 0,
            One = 1,
        }
    }

    #[test]
    fn test_integer_from_float_rounds() {
        assert_eq!(i32::from_raw(&RawValue::Float(1.5)).unwrap(), 2);
        assert_eq!(i32::from_raw(&RawValue::Float(-2.2)).unwrap(), -2);
        assert!(u8::from_raw(&RawValue::Float(300.0)).is_err());
        assert!(i32::from_raw(&RawValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(u8::from_raw(&RawValue::Int(255)).unwrap(), 255);
        assert!(u8::from_raw(&RawValue::Int(-1)).is_err());
        assert_eq!(i64::from_raw(&RawValue::Str(" 42 ".into())).unwrap(), 42);
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(f32::from_raw(&RawValue::Int(10)).unwrap(), 10.0);
        assert!(f32::from_raw(&RawValue::Float(1e300)).is_err());
        assert!(f64::from_raw(&RawValue::Bool(true)).is_err());
    }

    #[test]
    fn test_bool_parsing() {
        assert!(bool::from_config_str("TRUE").unwrap());
        assert!(!bool::from_config_str(" false ").unwrap());
        assert!(bool::from_config_str("yes").is_err());
        assert!(bool::from_raw(&RawValue::Int(1)).unwrap());
        assert!(bool::from_raw(&RawValue::Int(2)).is_err());
    }

    #[test]
    fn test_string_escaping() {
        let original = "line one\nline two\t\\end".to_string();
        let text = original.to_config_string();
        assert!(!text.contains('\n'));
        assert_eq!(String::from_config_str(&text).unwrap(), original);
        assert!(String::from_config_str("bad\\q").is_err());
        assert!(String::from_config_str("dangling\\").is_err());
    }

    #[test]
    fn test_string_edge_whitespace_is_escaped() {
        let padded = "  padded value ".to_string();
        let text = padded.to_config_string();
        assert_eq!(text, "\\s\\spadded value\\s");
        assert_eq!(String::from_config_str(&text).unwrap(), padded);

        let nbsp = "\u{a0}x".to_string();
        assert_eq!(nbsp.to_config_string(), "\\u{a0}x");
        assert_eq!(String::from_config_str("\\u{a0}x").unwrap(), nbsp);
        assert_eq!(" ".to_string().to_config_string(), "\\s");
        assert!(String::from_config_str("\\u{zz}").is_err());
        assert!(String::from_config_str("\\u{110000}").is_err());
    }

    #[test]
    fn test_string_accepts_any_raw_value() {
        assert_eq!(String::from_raw(&RawValue::Int(20)).unwrap(), "20");
        assert_eq!(String::from_raw(&RawValue::Bool(false)).unwrap(), "false");
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(char::from_config_str("x").unwrap(), 'x');
        assert!(char::from_config_str("xy").is_err());
        assert!(char::from_config_str("").is_err());
    }

    #[test]
    fn test_setting_enum() {
        assert_eq!(Mode::default(), Mode::Zero);
        assert_eq!(Mode::Below.to_config_string(), "Below");
        assert_eq!(Mode::from_config_str("one").unwrap(), Mode::One);
        assert_eq!(Mode::from_config_str("-1").unwrap(), Mode::Below);
        assert_eq!(Mode::from_raw(&RawValue::Int(1)).unwrap(), Mode::One);
        assert!(Mode::from_raw(&RawValue::Int(2000)).is_err());
        assert!(Mode::from_raw(&RawValue::Float(1.0)).is_err());
        assert_eq!(Mode::variant_names(), Some(&["Below", "Zero", "One"][..]));
        assert_eq!(RawValue::from(Mode::Below), RawValue::Int(-1));
    }
}
