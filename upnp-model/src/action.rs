//! Actions, their arguments, and the invocation object that carries input,
//! output and failure through both local execution and remote calls.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::ValidationError;
use crate::state_variable::StateVariable;
use crate::types::ServiceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn descriptor_name(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionArgument {
    pub name: String,
    pub related_state_variable: String,
    pub direction: Direction,
    pub return_value: bool,
}

impl ActionArgument {
    pub fn input(name: impl Into<String>, related_state_variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            related_state_variable: related_state_variable.into(),
            direction: Direction::In,
            return_value: false,
        }
    }

    pub fn output(name: impl Into<String>, related_state_variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            related_state_variable: related_state_variable.into(),
            direction: Direction::Out,
            return_value: false,
        }
    }

    pub fn as_return_value(mut self) -> Self {
        self.return_value = true;
        self
    }
}

/// An operation of a service with its ordered arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub arguments: Vec<ActionArgument>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: ActionArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn input_arguments(&self) -> impl Iterator<Item = &ActionArgument> {
        self.arguments.iter().filter(|a| a.direction == Direction::In)
    }

    pub fn output_arguments(&self) -> impl Iterator<Item = &ActionArgument> {
        self.arguments.iter().filter(|a| a.direction == Direction::Out)
    }

    pub fn input_argument(&self, name: &str) -> Option<&ActionArgument> {
        self.input_arguments().find(|a| a.name == name)
    }

    pub fn output_argument(&self, name: &str) -> Option<&ActionArgument> {
        self.output_arguments().find(|a| a.name == name)
    }

    /// Check names and that every argument links to a declared state variable
    pub fn validate(&self, state_variables: &[StateVariable]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("Action", "name", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for argument in &self.arguments {
            if argument.name.trim().is_empty() {
                errors.push(ValidationError::new(
                    "ActionArgument",
                    "name",
                    format!("argument of action '{}' has no name", self.name),
                ));
            }
            if !seen.insert((&argument.name, argument.direction)) {
                errors.push(ValidationError::new(
                    "ActionArgument",
                    "name",
                    format!("duplicate argument '{}' on action '{}'", argument.name, self.name),
                ));
            }
            if !state_variables
                .iter()
                .any(|v| v.name == argument.related_state_variable)
            {
                errors.push(ValidationError::new(
                    "ActionArgument",
                    "relatedStateVariable",
                    format!(
                        "'{}' of action '{}' refers to unknown state variable '{}'",
                        argument.name, self.name, argument.related_state_variable
                    ),
                ));
            }
        }
        errors
    }
}

/// Standard UPnP action error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidAction = 401,
    InvalidArgs = 402,
    ActionFailed = 501,
    ArgumentValueInvalid = 600,
    ArgumentValueOutOfRange = 601,
    OptionalActionNotImplemented = 602,
    OutOfMemory = 603,
    HumanInterventionRequired = 604,
    ArgumentTooLong = 605,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAction => "No action by that name at this service.",
            ErrorCode::InvalidArgs => "Not enough IN arguments, too many IN arguments, no IN argument by that name, or one or more IN arguments are of the wrong data type.",
            ErrorCode::ActionFailed => "Action failed.",
            ErrorCode::ArgumentValueInvalid => "The argument value is invalid.",
            ErrorCode::ArgumentValueOutOfRange => "An argument value is less than the minimum or more than the maximum value of the allowed value range, or is not in the allowed value list.",
            ErrorCode::OptionalActionNotImplemented => "The requested action is optional and is not implemented by the device.",
            ErrorCode::OutOfMemory => "The device does not have sufficient memory available to complete the action.",
            ErrorCode::HumanInterventionRequired => "The device has encountered an error condition which it cannot resolve itself and required human intervention such as a reset or power cycle.",
            ErrorCode::ArgumentTooLong => "A string argument is too long for the device to handle properly.",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let error_code = match code {
            401 => ErrorCode::InvalidAction,
            402 => ErrorCode::InvalidArgs,
            501 => ErrorCode::ActionFailed,
            600 => ErrorCode::ArgumentValueInvalid,
            601 => ErrorCode::ArgumentValueOutOfRange,
            602 => ErrorCode::OptionalActionNotImplemented,
            603 => ErrorCode::OutOfMemory,
            604 => ErrorCode::HumanInterventionRequired,
            605 => ErrorCode::ArgumentTooLong,
            _ => return None,
        };
        Some(error_code)
    }
}

/// Structured failure of an action, carried on the invocation and serialized
/// into a SOAP fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("UPnP error {code}: {description}")]
pub struct ActionException {
    pub code: u16,
    pub description: String,
}

impl ActionException {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            description: description.into(),
        }
    }

    /// Failure with the standard description of `code`
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.description())
    }

    /// Failure with a vendor specific numeric code
    pub fn with_code(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// A named argument value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionArgumentValue {
    pub name: String,
    pub value: String,
}

/// One execution of an action, local or remote
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    action: Action,
    service_type: ServiceType,
    input: Vec<ActionArgumentValue>,
    output: Vec<ActionArgumentValue>,
    failure: Option<ActionException>,
}

impl ActionInvocation {
    pub fn new(action: Action, service_type: ServiceType) -> Self {
        Self {
            action,
            service_type,
            input: Vec::new(),
            output: Vec::new(),
            failure: None,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    /// Set an input value; the argument must be an IN argument of the action
    pub fn set_input(&mut self, name: &str, value: impl Into<String>) -> Result<(), ActionException> {
        if self.action.input_argument(name).is_none() {
            return Err(ActionException::new(
                ErrorCode::InvalidArgs,
                format!("no input argument '{}' on action '{}'", name, self.action.name),
            ));
        }
        set_value(&mut self.input, name, value.into());
        Ok(())
    }

    pub fn input(&self, name: &str) -> Option<&str> {
        find_value(&self.input, name)
    }

    pub fn inputs(&self) -> &[ActionArgumentValue] {
        &self.input
    }

    /// Set an output value; the argument must be an OUT argument of the action
    pub fn set_output(&mut self, name: &str, value: impl Into<String>) -> Result<(), ActionException> {
        if self.action.output_argument(name).is_none() {
            return Err(ActionException::new(
                ErrorCode::ActionFailed,
                format!("no output argument '{}' on action '{}'", name, self.action.name),
            ));
        }
        set_value(&mut self.output, name, value.into());
        Ok(())
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        find_value(&self.output, name)
    }

    pub fn outputs(&self) -> &[ActionArgumentValue] {
        &self.output
    }

    /// Inputs in the order the action declares them
    pub fn ordered_inputs(&self) -> Vec<&ActionArgumentValue> {
        ordered(&self.input, self.action.input_arguments())
    }

    /// Outputs in the order the action declares them
    pub fn ordered_outputs(&self) -> Vec<&ActionArgumentValue> {
        ordered(&self.output, self.action.output_arguments())
    }

    pub fn set_failure(&mut self, failure: ActionException) {
        self.failure = Some(failure);
    }

    pub fn failure(&self) -> Option<&ActionException> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

fn set_value(values: &mut Vec<ActionArgumentValue>, name: &str, value: String) {
    match values.iter_mut().find(|v| v.name == name) {
        Some(existing) => existing.value = value,
        None => values.push(ActionArgumentValue {
            name: name.to_string(),
            value,
        }),
    }
}

fn find_value<'a>(values: &'a [ActionArgumentValue], name: &str) -> Option<&'a str> {
    values.iter().find(|v| v.name == name).map(|v| v.value.as_str())
}

fn ordered<'a>(
    values: &'a [ActionArgumentValue],
    arguments: impl Iterator<Item = &'a ActionArgument>,
) -> Vec<&'a ActionArgumentValue> {
    arguments
        .filter_map(|argument| values.iter().find(|v| v.name == argument.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Datatype;

    fn set_volume() -> Action {
        Action::new("SetVolume")
            .with_argument(ActionArgument::input("InstanceID", "A_ARG_TYPE_InstanceID"))
            .with_argument(ActionArgument::input("DesiredVolume", "Volume"))
    }

    fn variables() -> Vec<StateVariable> {
        vec![
            StateVariable::new("A_ARG_TYPE_InstanceID", Datatype::Ui4),
            StateVariable::new("Volume", Datatype::Ui2),
        ]
    }

    #[test]
    fn test_validate_links_to_state_variables() {
        assert!(set_volume().validate(&variables()).is_empty());

        let broken = set_volume().with_argument(ActionArgument::output("Missing", "Nope"));
        let errors = broken.validate(&variables());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "relatedStateVariable");
    }

    #[test]
    fn test_validate_rejects_duplicate_arguments() {
        let action = set_volume().with_argument(ActionArgument::input("DesiredVolume", "Volume"));
        assert_eq!(action.validate(&variables()).len(), 1);
    }

    #[test]
    fn test_invocation_rejects_unknown_input() {
        let mut invocation = ActionInvocation::new(set_volume(), ServiceType::uda("RenderingControl", 1));
        let err = invocation.set_input("Volume", "10").unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InvalidArgs));
    }

    #[test]
    fn test_invocation_orders_inputs_by_declaration() {
        let mut invocation = ActionInvocation::new(set_volume(), ServiceType::uda("RenderingControl", 1));
        invocation.set_input("DesiredVolume", "30").unwrap();
        invocation.set_input("InstanceID", "0").unwrap();
        invocation.set_input("DesiredVolume", "35").unwrap();

        let names: Vec<_> = invocation.ordered_inputs().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["InstanceID", "DesiredVolume"]);
        assert_eq!(invocation.input("DesiredVolume"), Some("35"));
    }

    #[test]
    fn test_action_exception_codes() {
        let failure = ActionException::from_code(ErrorCode::InvalidAction);
        assert_eq!(failure.code, 401);
        assert_eq!(failure.to_string(), "UPnP error 401: No action by that name at this service.");
        assert_eq!(ActionException::with_code(714, "No such object").error_code(), None);
        assert_eq!(ErrorCode::from_code(402), Some(ErrorCode::InvalidArgs));
        assert_eq!(ErrorCode::from_code(600), Some(ErrorCode::ArgumentValueInvalid));
    }
}
