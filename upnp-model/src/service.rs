use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::action::{Action, ActionInvocation};
use crate::error::ValidationError;
use crate::state_variable::{StateVariable, StateVariableValue};
use crate::types::{ServiceId, ServiceType};

/// Executes actions and reports evented state for a service hosted locally
pub trait ServiceManager: Send + Sync {
    /// Run the action; outputs or a failure are recorded on the invocation
    fn execute(&self, invocation: &mut ActionInvocation);

    /// Current values of the evented state variables
    fn current_values(&self) -> Vec<StateVariableValue>;
}

/// Shared handle to a local service implementation
#[derive(Clone)]
pub struct ServiceManagerHandle(Arc<dyn ServiceManager>);

impl ServiceManagerHandle {
    pub fn new(manager: Arc<dyn ServiceManager>) -> Self {
        Self(manager)
    }

    pub fn get(&self) -> &Arc<dyn ServiceManager> {
        &self.0
    }
}

impl fmt::Debug for ServiceManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceManagerHandle(..)")
    }
}

impl PartialEq for ServiceManagerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A service of a device: its type, endpoints, actions and state variables
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub service_type: ServiceType,
    pub service_id: ServiceId,
    /// SCPD location, relative to the device base URL for remote services
    pub descriptor_uri: String,
    pub control_uri: String,
    pub event_subscription_uri: String,
    pub actions: Vec<Action>,
    pub state_variables: Vec<StateVariable>,
    manager: Option<ServiceManagerHandle>,
}

impl Service {
    pub fn new(service_type: ServiceType, service_id: ServiceId) -> Self {
        Self {
            service_type,
            service_id,
            descriptor_uri: String::new(),
            control_uri: String::new(),
            event_subscription_uri: String::new(),
            actions: Vec::new(),
            state_variables: Vec::new(),
            manager: None,
        }
    }

    pub fn with_uris(
        mut self,
        descriptor_uri: impl Into<String>,
        control_uri: impl Into<String>,
        event_subscription_uri: impl Into<String>,
    ) -> Self {
        self.descriptor_uri = descriptor_uri.into();
        self.control_uri = control_uri.into();
        self.event_subscription_uri = event_subscription_uri.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_state_variable(mut self, variable: StateVariable) -> Self {
        self.state_variables.push(variable);
        self
    }

    /// Attach the implementation that executes this service's actions locally
    pub fn with_manager(mut self, manager: Arc<dyn ServiceManager>) -> Self {
        self.manager = Some(ServiceManagerHandle::new(manager));
        self
    }

    pub fn manager(&self) -> Option<&Arc<dyn ServiceManager>> {
        self.manager.as_ref().map(ServiceManagerHandle::get)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    pub fn evented_state_variables(&self) -> impl Iterator<Item = &StateVariable> {
        self.state_variables.iter().filter(|v| v.send_events)
    }

    /// A copy with the given descriptor content, keeping identity, endpoints and manager
    pub fn hydrated(&self, actions: Vec<Action>, state_variables: Vec<StateVariable>) -> Self {
        Self {
            actions,
            state_variables,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut action_names = HashSet::new();
        for action in &self.actions {
            if !action_names.insert(action.name.as_str()) {
                errors.push(ValidationError::new(
                    "Service",
                    "actionList",
                    format!("duplicate action '{}' in {}", action.name, self.service_id),
                ));
            }
            errors.extend(action.validate(&self.state_variables));
        }
        let mut variable_names = HashSet::new();
        for variable in &self.state_variables {
            if !variable_names.insert(variable.name.as_str()) {
                errors.push(ValidationError::new(
                    "Service",
                    "serviceStateTable",
                    format!("duplicate state variable '{}' in {}", variable.name, self.service_id),
                ));
            }
            errors.extend(variable.validate());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionArgument;
    use crate::datatype::Datatype;

    struct Silent;

    impl ServiceManager for Silent {
        fn execute(&self, _invocation: &mut ActionInvocation) {}

        fn current_values(&self) -> Vec<StateVariableValue> {
            Vec::new()
        }
    }

    fn switch_power() -> Service {
        Service::new(ServiceType::uda("SwitchPower", 1), ServiceId::uda("SwitchPower"))
            .with_action(
                Action::new("SetTarget").with_argument(ActionArgument::input("newTargetValue", "Target")),
            )
            .with_state_variable(StateVariable::new("Target", Datatype::Boolean))
            .with_state_variable(StateVariable::new("Status", Datatype::Boolean).evented(true))
    }

    #[test]
    fn test_lookup_and_evented_variables() {
        let service = switch_power();
        assert!(service.action("SetTarget").is_some());
        assert!(service.action("GetStatus").is_none());
        let evented: Vec<_> = service.evented_state_variables().map(|v| v.name.as_str()).collect();
        assert_eq!(evented, vec!["Status"]);
    }

    #[test]
    fn test_validate_reports_duplicates() {
        let service = switch_power()
            .with_action(Action::new("SetTarget"))
            .with_state_variable(StateVariable::new("Status", Datatype::Boolean));
        assert_eq!(service.validate().len(), 2);
    }

    #[test]
    fn test_manager_handle_equality_is_by_pointer() {
        let manager: Arc<dyn ServiceManager> = Arc::new(Silent);
        let a = switch_power().with_manager(manager.clone());
        let b = switch_power().with_manager(manager);
        let c = switch_power().with_manager(Arc::new(Silent));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.manager().is_some());
    }
}
