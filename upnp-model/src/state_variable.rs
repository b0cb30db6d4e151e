use crate::action::ErrorCode;
use crate::datatype::Datatype;
use crate::error::ValidationError;

/// Inclusive numeric range a state variable may take
#[derive(Debug, Clone, PartialEq)]
pub struct AllowedValueRange {
    pub minimum: f64,
    pub maximum: f64,
    pub step: Option<f64>,
}

impl AllowedValueRange {
    pub fn new(minimum: f64, maximum: f64) -> Self {
        Self {
            minimum,
            maximum,
            step: None,
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.minimum && value <= self.maximum
    }
}

/// A typed state variable of a service
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    pub name: String,
    pub datatype: Datatype,
    pub default_value: Option<String>,
    pub allowed_values: Vec<String>,
    pub allowed_range: Option<AllowedValueRange>,
    pub send_events: bool,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            name: name.into(),
            datatype,
            default_value: None,
            allowed_values: Vec::new(),
            allowed_range: None,
            send_events: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_range(mut self, range: AllowedValueRange) -> Self {
        self.allowed_range = Some(range);
        self
    }

    pub fn evented(mut self, send_events: bool) -> Self {
        self.send_events = send_events;
        self
    }

    /// Whether `value` is acceptable for this variable: datatype, allowed list and range
    pub fn is_valid_value(&self, value: &str) -> bool {
        self.value_error(value).is_none()
    }

    /// Error code an action reports for `value` as an argument of this variable.
    ///
    /// A value of the wrong datatype is 402; one outside the allowed list or range is 601.
    pub fn value_error(&self, value: &str) -> Option<ErrorCode> {
        if !self.datatype.is_valid(value) {
            return Some(ErrorCode::InvalidArgs);
        }
        if !self.allowed_values.is_empty() && !self.allowed_values.iter().any(|allowed| allowed == value) {
            return Some(ErrorCode::ArgumentValueOutOfRange);
        }
        match (&self.allowed_range, self.datatype.numeric_value(value)) {
            (Some(range), Some(number)) if !range.contains(number) => Some(ErrorCode::ArgumentValueOutOfRange),
            (Some(_), None) => Some(ErrorCode::InvalidArgs),
            _ => None,
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("StateVariable", "name", "must not be empty"));
        }
        if !self.allowed_values.is_empty() && self.datatype != Datatype::String {
            errors.push(ValidationError::new(
                "StateVariable",
                "allowedValueList",
                format!("only allowed on string variables, '{}' is {}", self.name, self.datatype.descriptor_name()),
            ));
        }
        if let Some(range) = &self.allowed_range {
            if !self.datatype.is_numeric() {
                errors.push(ValidationError::new(
                    "StateVariable",
                    "allowedValueRange",
                    format!("only allowed on numeric variables, '{}' is {}", self.name, self.datatype.descriptor_name()),
                ));
            }
            if range.minimum > range.maximum {
                errors.push(ValidationError::new(
                    "StateVariable",
                    "allowedValueRange",
                    format!("minimum {} is greater than maximum {}", range.minimum, range.maximum),
                ));
            }
        }
        if let Some(default) = &self.default_value {
            if !self.datatype.is_valid(default) {
                errors.push(ValidationError::new(
                    "StateVariable",
                    "defaultValue",
                    format!("'{}' is not a valid {}", default, self.datatype.descriptor_name()),
                ));
            }
        }
        errors
    }
}

/// A named value of a state variable, as carried by events and action arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateVariableValue {
    pub name: String,
    pub value: String,
}

impl StateVariableValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_value_respects_allowed_list() {
        let variable = StateVariable::new("TransportState", Datatype::String)
            .with_allowed_values(["PLAYING", "STOPPED"]);
        assert!(variable.is_valid_value("PLAYING"));
        assert!(!variable.is_valid_value("PAUSED"));
    }

    #[test]
    fn test_valid_value_respects_range() {
        let variable = StateVariable::new("Volume", Datatype::Ui2).with_range(AllowedValueRange::new(0.0, 100.0));
        assert!(variable.is_valid_value("100"));
        assert!(!variable.is_valid_value("101"));
        assert!(!variable.is_valid_value("loud"));
    }

    #[test]
    fn test_value_error_codes() {
        let volume = StateVariable::new("Volume", Datatype::Ui2).with_range(AllowedValueRange::new(0.0, 100.0));
        assert_eq!(volume.value_error("50"), None);
        assert_eq!(volume.value_error("loud"), Some(ErrorCode::InvalidArgs));
        assert_eq!(volume.value_error("101"), Some(ErrorCode::ArgumentValueOutOfRange));

        let state = StateVariable::new("TransportState", Datatype::String).with_allowed_values(["PLAYING"]);
        assert_eq!(state.value_error("PAUSED"), Some(ErrorCode::ArgumentValueOutOfRange));
    }

    #[test]
    fn test_validate_rejects_range_on_string() {
        let variable = StateVariable::new("Name", Datatype::String).with_range(AllowedValueRange::new(0.0, 1.0));
        let errors = variable.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "allowedValueRange");
    }

    #[test]
    fn test_validate_rejects_inverted_range_and_bad_default() {
        let variable = StateVariable::new("Volume", Datatype::Ui1)
            .with_range(AllowedValueRange::new(10.0, 0.0))
            .with_default("-1");
        assert_eq!(variable.validate().len(), 2);
    }

    #[test]
    fn test_default_outside_allowed_list_is_tolerated() {
        let variable = StateVariable::new("PlayMode", Datatype::String)
            .with_allowed_values(["NORMAL", "SHUFFLE"])
            .with_default("REPEAT_ALL");
        assert!(variable.validate().is_empty());
    }
}
