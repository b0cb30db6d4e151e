use std::collections::HashMap;

use crate::action::{ActionException, ActionInvocation, ErrorCode};
use crate::service::ServiceManager;
use crate::state_variable::StateVariableValue;

type ActionHandler = Box<dyn Fn(&mut ActionInvocation) -> Result<(), ActionException> + Send + Sync>;
type StateAccessor = Box<dyn Fn() -> String + Send + Sync>;

/// Declarative binding of a local service: action name to handler closure and
/// state variable name to accessor closure.
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use upnp_model::ActionTable;
///
/// let power = Arc::new(AtomicBool::new(false));
/// let target = power.clone();
/// let status = power.clone();
///
/// let table = ActionTable::new()
///     .action("SetTarget", move |invocation| {
///         let on = invocation.input("newTargetValue") == Some("1");
///         target.store(on, Ordering::SeqCst);
///         Ok(())
///     })
///     .state_variable("Status", move || {
///         if status.load(Ordering::SeqCst) { "1".into() } else { "0".into() }
///     });
/// # let _ = table;
/// ```
#[derive(Default)]
pub struct ActionTable {
    actions: HashMap<String, ActionHandler>,
    accessors: Vec<(String, StateAccessor)>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ActionInvocation) -> Result<(), ActionException> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Box::new(handler));
        self
    }

    pub fn state_variable<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.accessors.push((name.into(), Box::new(accessor)));
        self
    }

    pub fn handles(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }
}

impl ServiceManager for ActionTable {
    fn execute(&self, invocation: &mut ActionInvocation) {
        let name = invocation.action().name.clone();
        match self.actions.get(&name) {
            Some(handler) => {
                if let Err(failure) = handler(invocation) {
                    tracing::debug!("Action {} failed: {}", name, failure);
                    invocation.set_failure(failure);
                }
            }
            None => invocation.set_failure(ActionException::new(
                ErrorCode::OptionalActionNotImplemented,
                format!("no handler registered for action '{}'", name),
            )),
        }
    }

    fn current_values(&self) -> Vec<StateVariableValue> {
        self.accessors
            .iter()
            .map(|(name, accessor)| StateVariableValue::new(name.clone(), accessor()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionArgument};
    use crate::types::ServiceType;

    fn invocation(name: &str) -> ActionInvocation {
        let action = Action::new(name)
            .with_argument(ActionArgument::input("newTargetValue", "Target"))
            .with_argument(ActionArgument::output("RetTargetValue", "Target"));
        ActionInvocation::new(action, ServiceType::uda("SwitchPower", 1))
    }

    #[test]
    fn test_execute_dispatches_by_name() {
        let table = ActionTable::new().action("GetTarget", |invocation| {
            invocation.set_output("RetTargetValue", "1")
        });

        let mut call = invocation("GetTarget");
        table.execute(&mut call);
        assert!(!call.is_failed());
        assert_eq!(call.output("RetTargetValue"), Some("1"));
    }

    #[test]
    fn test_handler_failure_is_recorded() {
        let table = ActionTable::new().action("SetTarget", |_| {
            Err(ActionException::with_code(701, "Transition not available"))
        });

        let mut call = invocation("SetTarget");
        table.execute(&mut call);
        assert_eq!(call.failure().map(|f| f.code), Some(701));
    }

    #[test]
    fn test_missing_handler_is_not_implemented() {
        let table = ActionTable::new();
        let mut call = invocation("SetTarget");
        table.execute(&mut call);
        assert_eq!(
            call.failure().and_then(|f| f.error_code()),
            Some(ErrorCode::OptionalActionNotImplemented)
        );
        assert!(!table.handles("SetTarget"));
    }

    #[test]
    fn test_current_values_in_registration_order() {
        let table = ActionTable::new()
            .state_variable("Status", || "0".to_string())
            .state_variable("Target", || "1".to_string());
        let values = table.current_values();
        assert_eq!(values[0], StateVariableValue::new("Status", "0"));
        assert_eq!(values[1], StateVariableValue::new("Target", "1"));
    }
}
