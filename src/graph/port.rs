//! Port types, literal controls, and port-level contracts
//!
//! A port carries one of three semantic types. `Color` and `Float` ports form
//! the numeric compile graph; `Action` ports are event hooks and never carry
//! compiled data. Input ports may carry an inline literal control used when the
//! port is unconnected, and declare what happens when a non-literal input is
//! left unconnected (hard error or an explicit fallback constant).

use serde::{Deserialize, Serialize};

/// Index of a port within a node's input or output list.
pub type PortId = usize;

/// Semantic type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// 4-component color value.
    Color,
    /// Scalar value.
    Float,
    /// Event trigger; excluded from the numeric compile graph.
    Action,
}

impl PortKind {
    /// Check whether an output of this kind can feed an input of `other`.
    pub fn can_connect_to(&self, other: &PortKind) -> bool {
        self == other && *self != PortKind::Action
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            PortKind::Color => "Color",
            PortKind::Float => "Float",
            PortKind::Action => "Action",
        }
    }

    /// The WGSL type generated functions use for this kind.
    pub fn wgsl_type(&self) -> &'static str {
        match self {
            PortKind::Color => "vec4<f32>",
            PortKind::Float => "f32",
            PortKind::Action => "",
        }
    }
}

/// A concrete literal value held by an inline control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    Float(f32),
    Color([f32; 4]),
}

impl ControlValue {
    /// The port kind this value satisfies.
    pub fn kind(&self) -> PortKind {
        match self {
            ControlValue::Float(_) => PortKind::Float,
            ControlValue::Color(_) => PortKind::Color,
        }
    }

    /// Format the value as a WGSL literal expression.
    ///
    /// Uses `{:?}` formatting so whole floats keep their decimal point and the
    /// same value always produces the same text (recompile determinism).
    pub fn wgsl_literal(&self) -> String {
        match self {
            ControlValue::Float(v) => format!("{:?}", v),
            ControlValue::Color([r, g, b, a]) => {
                format!("vec4<f32>({:?}, {:?}, {:?}, {:?})", r, g, b, a)
            }
        }
    }
}

/// Inline literal control attached to an input port, used when unconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralControl {
    pub default: ControlValue,
    pub min: f32,
    pub max: f32,
}

impl LiteralControl {
    pub fn float(default: f32, min: f32, max: f32) -> Self {
        Self {
            default: ControlValue::Float(default),
            min,
            max,
        }
    }

    pub fn color(default: [f32; 4]) -> Self {
        Self {
            default: ControlValue::Color(default),
            min: 0.0,
            max: 1.0,
        }
    }
}

/// Declared behavior for a non-literal input left unconnected.
///
/// The assembler surfaces whichever policy the input declares; it never
/// substitutes a value of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPolicy {
    /// Compiling without a connection is a hard error naming node and port.
    Require,
    /// Compiling without a connection formats this declared constant.
    Fallback(ControlValue),
}

/// Definition of one input port.
#[derive(Debug, Clone)]
pub struct InputDef {
    pub name: String,
    pub kind: PortKind,
    /// Inline literal control used when unconnected, if the input has one.
    pub control: Option<LiteralControl>,
    /// What happens when there is no connection and no control.
    pub policy: InputPolicy,
    /// Feedback inputs read the frame history instead of a live upstream
    /// value; their incoming connections are excluded from dependency
    /// traversal and the cycle check.
    pub feedback: bool,
}

impl InputDef {
    /// An input that must be connected at compile time.
    pub fn required(name: &str, kind: PortKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            control: None,
            policy: InputPolicy::Require,
            feedback: false,
        }
    }

    /// An input with an inline literal control for the unconnected case.
    pub fn with_control(name: &str, control: LiteralControl) -> Self {
        let kind = control.default.kind();
        Self {
            name: name.to_string(),
            kind,
            control: Some(control),
            policy: InputPolicy::Require,
            feedback: false,
        }
    }

    /// Declare an explicit fallback constant for the unconnected case.
    pub fn with_fallback(mut self, value: ControlValue) -> Self {
        self.policy = InputPolicy::Fallback(value);
        self
    }

    /// Mark this input as a feedback port (see [`InputDef::feedback`]).
    pub fn feedback(mut self) -> Self {
        self.feedback = true;
        self
    }
}

/// Definition of one output port.
#[derive(Debug, Clone)]
pub struct OutputDef {
    pub name: String,
    pub kind: PortKind,
}

impl OutputDef {
    pub fn new(name: &str, kind: PortKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Definition of a named, enumerated node option.
///
/// Options select between generated branches; changing one requires a
/// recompile, unlike controls which flow through literals or uniforms.
#[derive(Debug, Clone)]
pub struct OptionDef {
    pub name: String,
    pub choices: Vec<String>,
    pub default: usize,
}

impl OptionDef {
    pub fn new(name: &str, choices: &[&str], default: usize) -> Self {
        Self {
            name: name.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_connectivity() {
        assert!(PortKind::Color.can_connect_to(&PortKind::Color));
        assert!(PortKind::Float.can_connect_to(&PortKind::Float));
        assert!(!PortKind::Color.can_connect_to(&PortKind::Float));
        assert!(!PortKind::Action.can_connect_to(&PortKind::Action));
    }

    #[test]
    fn test_wgsl_literal_formatting() {
        assert_eq!(ControlValue::Float(1.0).wgsl_literal(), "1.0");
        assert_eq!(ControlValue::Float(0.25).wgsl_literal(), "0.25");
        assert_eq!(
            ControlValue::Color([1.0, 0.0, 0.0, 1.0]).wgsl_literal(),
            "vec4<f32>(1.0, 0.0, 0.0, 1.0)"
        );
    }

    #[test]
    fn test_input_builders() {
        let input = InputDef::with_control("mix", LiteralControl::float(1.0, 0.0, 1.0));
        assert_eq!(input.kind, PortKind::Float);
        assert!(input.control.is_some());
        assert_eq!(input.policy, InputPolicy::Require);

        let input = InputDef::required("color", PortKind::Color)
            .with_fallback(ControlValue::Color([1.0, 1.0, 1.0, 1.0]));
        assert!(matches!(input.policy, InputPolicy::Fallback(_)));
    }
}
