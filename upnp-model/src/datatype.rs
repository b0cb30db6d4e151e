use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// The UPnP state variable datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    Ui1,
    Ui2,
    Ui4,
    I1,
    I2,
    I4,
    Int,
    R4,
    R8,
    Number,
    Fixed14_4,
    Float,
    Char,
    String,
    Date,
    DateTime,
    DateTimeTz,
    Time,
    TimeTz,
    Boolean,
    BinBase64,
    BinHex,
    Uri,
    Uuid,
}

impl Datatype {
    /// The name used in service descriptors
    pub fn descriptor_name(&self) -> &'static str {
        match self {
            Datatype::Ui1 => "ui1",
            Datatype::Ui2 => "ui2",
            Datatype::Ui4 => "ui4",
            Datatype::I1 => "i1",
            Datatype::I2 => "i2",
            Datatype::I4 => "i4",
            Datatype::Int => "int",
            Datatype::R4 => "r4",
            Datatype::R8 => "r8",
            Datatype::Number => "number",
            Datatype::Fixed14_4 => "fixed.14.4",
            Datatype::Float => "float",
            Datatype::Char => "char",
            Datatype::String => "string",
            Datatype::Date => "date",
            Datatype::DateTime => "dateTime",
            Datatype::DateTimeTz => "dateTime.tz",
            Datatype::Time => "time",
            Datatype::TimeTz => "time.tz",
            Datatype::Boolean => "boolean",
            Datatype::BinBase64 => "bin.base64",
            Datatype::BinHex => "bin.hex",
            Datatype::Uri => "uri",
            Datatype::Uuid => "uuid",
        }
    }

    pub fn from_descriptor_name(name: &str) -> Option<Self> {
        let datatype = match name.trim() {
            "ui1" => Datatype::Ui1,
            "ui2" => Datatype::Ui2,
            "ui4" => Datatype::Ui4,
            "i1" => Datatype::I1,
            "i2" => Datatype::I2,
            "i4" => Datatype::I4,
            "int" => Datatype::Int,
            "r4" => Datatype::R4,
            "r8" => Datatype::R8,
            "number" => Datatype::Number,
            "fixed.14.4" => Datatype::Fixed14_4,
            "float" => Datatype::Float,
            "char" => Datatype::Char,
            "string" => Datatype::String,
            "date" => Datatype::Date,
            "dateTime" => Datatype::DateTime,
            "dateTime.tz" => Datatype::DateTimeTz,
            "time" => Datatype::Time,
            "time.tz" => Datatype::TimeTz,
            "boolean" => Datatype::Boolean,
            "bin.base64" => Datatype::BinBase64,
            "bin.hex" => Datatype::BinHex,
            "uri" => Datatype::Uri,
            "uuid" => Datatype::Uuid,
            _ => return None,
        };
        Some(datatype)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datatype::Ui1
                | Datatype::Ui2
                | Datatype::Ui4
                | Datatype::I1
                | Datatype::I2
                | Datatype::I4
                | Datatype::Int
                | Datatype::R4
                | Datatype::R8
                | Datatype::Number
                | Datatype::Fixed14_4
                | Datatype::Float
        )
    }

    /// Parse a numeric value for range checks
    pub fn numeric_value(&self, value: &str) -> Option<f64> {
        if self.is_numeric() && self.is_valid(value) {
            value.trim().parse::<f64>().ok()
        } else {
            None
        }
    }

    /// Check that a string is a valid lexical value of this datatype
    pub fn is_valid(&self, value: &str) -> bool {
        let trimmed = value.trim();
        match self {
            Datatype::Ui1 => trimmed.parse::<u8>().is_ok(),
            Datatype::Ui2 => trimmed.parse::<u16>().is_ok(),
            Datatype::Ui4 => trimmed.parse::<u32>().is_ok(),
            Datatype::I1 => trimmed.parse::<i8>().is_ok(),
            Datatype::I2 => trimmed.parse::<i16>().is_ok(),
            Datatype::I4 | Datatype::Int => trimmed.parse::<i32>().is_ok(),
            Datatype::R4 => trimmed.parse::<f32>().map(f32::is_finite).unwrap_or(false),
            Datatype::R8 | Datatype::Number | Datatype::Float | Datatype::Fixed14_4 => {
                trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false)
            }
            Datatype::Char => value.chars().count() == 1,
            Datatype::String => true,
            Datatype::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok(),
            Datatype::DateTime => {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").is_ok()
                    || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
            }
            Datatype::DateTimeTz => DateTime::parse_from_rfc3339(trimmed).is_ok(),
            Datatype::Time => NaiveTime::parse_from_str(trimmed, "%H:%M:%S").is_ok(),
            Datatype::TimeTz => {
                let time = trimmed
                    .strip_suffix('Z')
                    .or_else(|| trimmed.get(..8).filter(|_| trimmed.len() == 14))
                    .unwrap_or(trimmed);
                NaiveTime::parse_from_str(time, "%H:%M:%S").is_ok()
            }
            Datatype::Boolean => matches!(
                trimmed.to_ascii_lowercase().as_str(),
                "0" | "1" | "true" | "false" | "yes" | "no"
            ),
            Datatype::BinBase64 => trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='),
            Datatype::BinHex => trimmed.len() % 2 == 0 && trimmed.chars().all(|c| c.is_ascii_hexdigit()),
            Datatype::Uri => !trimmed.is_empty() && !trimmed.chars().any(char::is_whitespace),
            Datatype::Uuid => uuid::Uuid::parse_str(trimmed).is_ok(),
        }
    }
}
