//! Service descriptor (SCPD) binding.

use serde::{Deserialize, Serialize};
use upnp_model::{Action, ActionArgument, AllowedValueRange, Datatype, InvalidValueError, Service, StateVariable};

use crate::descriptor::SpecVersionXml;
use crate::error::DescriptorBindingError;
use crate::xml::{parse_document, write_document};

const SERVICE_NAMESPACE: &str = "urn:schemas-upnp-org:service-1-0";

/// Converts between SCPD XML and the actions and state variables of a service
pub trait ServiceDescriptorBinder: Send + Sync {
    /// A copy of `service` with the actions and state variables described by `xml`
    fn describe(&self, service: &Service, xml: &str) -> Result<Service, DescriptorBindingError>;

    /// SCPD XML for a local service
    fn generate(&self, service: &Service) -> Result<String, DescriptorBindingError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "scpd")]
struct ScpdXml {
    #[serde(rename = "@xmlns", default)]
    xmlns: String,
    #[serde(rename = "specVersion", default)]
    spec_version: SpecVersionXml,
    #[serde(rename = "actionList", default, skip_serializing_if = "Option::is_none")]
    action_list: Option<ActionListXml>,
    #[serde(rename = "serviceStateTable", default)]
    state_table: StateTableXml,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ActionListXml {
    #[serde(rename = "action", default)]
    actions: Vec<ActionXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ActionXml {
    name: String,
    #[serde(rename = "argumentList", default, skip_serializing_if = "Option::is_none")]
    argument_list: Option<ArgumentListXml>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ArgumentListXml {
    #[serde(rename = "argument", default)]
    arguments: Vec<ArgumentXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArgumentXml {
    name: String,
    direction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retval: Option<ReturnValueXml>,
    #[serde(rename = "relatedStateVariable")]
    related_state_variable: String,
}

/// The empty `<retval/>` marker
#[derive(Debug, Default, Serialize, Deserialize)]
struct ReturnValueXml {}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateTableXml {
    #[serde(rename = "stateVariable", default)]
    variables: Vec<StateVariableXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateVariableXml {
    #[serde(rename = "@sendEvents", default, skip_serializing_if = "Option::is_none")]
    send_events: Option<String>,
    name: String,
    #[serde(rename = "dataType")]
    data_type: String,
    #[serde(rename = "defaultValue", default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(rename = "allowedValueList", default, skip_serializing_if = "Option::is_none")]
    allowed_values: Option<AllowedValueListXml>,
    #[serde(rename = "allowedValueRange", default, skip_serializing_if = "Option::is_none")]
    allowed_range: Option<AllowedValueRangeXml>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AllowedValueListXml {
    #[serde(rename = "allowedValue", default)]
    values: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AllowedValueRangeXml {
    minimum: String,
    maximum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<String>,
}

/// quick-xml backed [`ServiceDescriptorBinder`]
#[derive(Debug, Clone, Default)]
pub struct XmlServiceDescriptorBinder;

impl XmlServiceDescriptorBinder {
    pub fn new() -> Self {
        Self
    }
}

fn hydrate_action(xml: ActionXml) -> Result<Action, DescriptorBindingError> {
    let mut action = Action::new(xml.name);
    for argument in xml.argument_list.unwrap_or_default().arguments {
        let direction = argument.direction.trim();
        let mut hydrated = if direction.eq_ignore_ascii_case("in") {
            ActionArgument::input(argument.name, argument.related_state_variable)
        } else if direction.eq_ignore_ascii_case("out") {
            ActionArgument::output(argument.name, argument.related_state_variable)
        } else {
            return Err(InvalidValueError::new("argument direction", direction).into());
        };
        if argument.retval.is_some() {
            hydrated = hydrated.as_return_value();
        }
        action = action.with_argument(hydrated);
    }
    Ok(action)
}

fn hydrate_state_variable(xml: StateVariableXml) -> StateVariable {
    let datatype = Datatype::from_descriptor_name(&xml.data_type).unwrap_or_else(|| {
        tracing::warn!(
            "State variable {} has unknown datatype '{}', treating it as string",
            xml.name,
            xml.data_type
        );
        Datatype::String
    });

    let send_events = xml
        .send_events
        .as_deref()
        .map_or(true, |value| !value.trim().eq_ignore_ascii_case("no"));

    let mut variable = StateVariable::new(xml.name, datatype).evented(send_events);
    if let Some(default_value) = xml.default_value {
        variable = variable.with_default(default_value);
    }
    if let Some(allowed) = xml.allowed_values {
        variable = variable.with_allowed_values(allowed.values);
    }
    if let Some(range) = xml.allowed_range {
        match (range.minimum.trim().parse::<f64>(), range.maximum.trim().parse::<f64>()) {
            (Ok(minimum), Ok(maximum)) => {
                let mut allowed_range = AllowedValueRange::new(minimum, maximum);
                if let Some(step) = range.step.and_then(|s| s.trim().parse::<f64>().ok()) {
                    allowed_range = allowed_range.with_step(step);
                }
                variable = variable.with_range(allowed_range);
            }
            _ => tracing::warn!("Ignoring unparseable allowed range of {}", variable.name),
        }
    }
    variable
}

fn state_variable_xml(variable: &StateVariable) -> StateVariableXml {
    StateVariableXml {
        send_events: Some(if variable.send_events { "yes" } else { "no" }.to_string()),
        name: variable.name.clone(),
        data_type: variable.datatype.descriptor_name().to_string(),
        default_value: variable.default_value.clone(),
        allowed_values: (!variable.allowed_values.is_empty()).then(|| AllowedValueListXml {
            values: variable.allowed_values.clone(),
        }),
        allowed_range: variable.allowed_range.as_ref().map(|range| AllowedValueRangeXml {
            minimum: range.minimum.to_string(),
            maximum: range.maximum.to_string(),
            step: range.step.map(|step| step.to_string()),
        }),
    }
}

impl ServiceDescriptorBinder for XmlServiceDescriptorBinder {
    fn describe(&self, service: &Service, xml: &str) -> Result<Service, DescriptorBindingError> {
        let scpd: ScpdXml = parse_document(xml)?;

        let actions = scpd
            .action_list
            .unwrap_or_default()
            .actions
            .into_iter()
            .map(hydrate_action)
            .collect::<Result<Vec<_>, _>>()?;
        let state_variables = scpd
            .state_table
            .variables
            .into_iter()
            .map(hydrate_state_variable)
            .collect();

        Ok(service.hydrated(actions, state_variables))
    }

    fn generate(&self, service: &Service) -> Result<String, DescriptorBindingError> {
        let actions = service
            .actions
            .iter()
            .map(|action| ActionXml {
                name: action.name.clone(),
                argument_list: (!action.arguments.is_empty()).then(|| ArgumentListXml {
                    arguments: action
                        .arguments
                        .iter()
                        .map(|argument| ArgumentXml {
                            name: argument.name.clone(),
                            direction: argument.direction.descriptor_name().to_string(),
                            retval: argument.return_value.then(ReturnValueXml::default),
                            related_state_variable: argument.related_state_variable.clone(),
                        })
                        .collect(),
                }),
            })
            .collect::<Vec<_>>();

        let scpd = ScpdXml {
            xmlns: SERVICE_NAMESPACE.to_string(),
            spec_version: SpecVersionXml::default(),
            action_list: (!actions.is_empty()).then(|| ActionListXml { actions }),
            state_table: StateTableXml {
                variables: service.state_variables.iter().map(state_variable_xml).collect(),
            },
        };
        write_document(&scpd)
    }
}
