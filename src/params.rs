// Parameter schema codec: parses job definition parameter schemas into typed
// descriptors and serializes current values back into a job request payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::adapters::{InputSource, TransformSpace};

/// Parameters injected by the service itself. Never copied between
/// definitions and not meant for direct editing.
const SYSTEM_PARAMETERS: &[&str] = &["format", "record_profile"];

pub fn is_system_parameter(name: &str) -> bool {
    SYSTEM_PARAMETERS.contains(&name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntParameter {
    pub values: Vec<i64>,
    pub defaults: Vec<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntParameter {
    pub fn is_default(&self) -> bool {
        self.values == self.defaults
    }

    pub fn validate(&self, values: &[i64]) -> bool {
        if values.len() != self.defaults.len() {
            return false;
        }
        values.iter().all(|v| {
            self.min.map_or(true, |min| *v >= min) && self.max.map_or(true, |max| *v <= max)
        })
    }

    pub fn copy_from(&mut self, source: &IntParameter) {
        if !source.is_default() && self.validate(&source.values) {
            self.values = source.values.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatParameter {
    pub values: Vec<f64>,
    pub defaults: Vec<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FloatParameter {
    pub fn is_default(&self) -> bool {
        self.values == self.defaults
    }

    pub fn validate(&self, values: &[f64]) -> bool {
        if values.len() != self.defaults.len() {
            return false;
        }
        values.iter().all(|v| {
            self.min.map_or(true, |min| *v >= min) && self.max.map_or(true, |max| *v <= max)
        })
    }

    pub fn copy_from(&mut self, source: &FloatParameter) {
        if !source.is_default() && self.validate(&source.values) {
            self.values = source.values.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolParameter {
    pub value: bool,
    pub default: bool,
}

impl BoolParameter {
    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    pub fn copy_from(&mut self, source: &BoolParameter) {
        if !source.is_default() {
            self.value = source.value;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringParameter {
    pub value: String,
    pub default: String,
}

impl StringParameter {
    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    pub fn copy_from(&mut self, source: &StringParameter) {
        if !source.is_default() {
            self.value = source.value.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumChoice {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumParameter {
    pub value: String,
    pub default: String,
    pub choices: Vec<EnumChoice>,
}

impl EnumParameter {
    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    pub fn validate(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c.name == value)
    }

    pub fn copy_from(&mut self, source: &EnumParameter) {
        if !source.is_default() && self.validate(&source.value) {
            self.value = source.value.clone();
        }
    }
}

/// File inputs carry an input-source descriptor instead of a value. The
/// source is resolved to an uploaded file id at job execution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileParameter {
    pub source: Option<InputSource>,
    pub transform: TransformSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    Float,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveInterpolation {
    Constant,
    Linear,
    CatmullRom,
    MonotoneCubic,
    Bezier,
    BSpline,
    Hermite,
}

impl CurveInterpolation {
    fn parse(s: &str) -> Self {
        match s {
            "Constant" => CurveInterpolation::Constant,
            "CatmullRom" => CurveInterpolation::CatmullRom,
            "MonotoneCubic" => CurveInterpolation::MonotoneCubic,
            "Bezier" => CurveInterpolation::Bezier,
            "BSpline" => CurveInterpolation::BSpline,
            "Hermite" => CurveInterpolation::Hermite,
            _ => CurveInterpolation::Linear,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            CurveInterpolation::Constant => "Constant",
            CurveInterpolation::Linear => "Linear",
            CurveInterpolation::CatmullRom => "CatmullRom",
            CurveInterpolation::MonotoneCubic => "MonotoneCubic",
            CurveInterpolation::Bezier => "Bezier",
            CurveInterpolation::BSpline => "BSpline",
            CurveInterpolation::Hermite => "Hermite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub pos: f64,
    /// Float ramps only.
    pub value: f64,
    /// Color ramps only, RGB.
    pub color: [f64; 3],
    pub interp: CurveInterpolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveParameter {
    pub kind: CurveKind,
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(IntParameter),
    Float(FloatParameter),
    Bool(BoolParameter),
    String(StringParameter),
    Enum(EnumParameter),
    File(FileParameter),
    Curve(CurveParameter),
}

impl ParameterValue {
    /// Same kind of payload, used to match parameters across definitions.
    pub fn same_kind(&self, other: &ParameterValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub label: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }
}

fn read_i64_defaults(object: &Map<String, Value>) -> Option<Vec<i64>> {
    match object.get("default")? {
        Value::Array(array) => array.iter().map(Value::as_i64).collect(),
        value => Some(vec![value.as_i64()?]),
    }
}

fn read_f64_defaults(object: &Map<String, Value>) -> Option<Vec<f64>> {
    match object.get("default")? {
        Value::Array(array) => array.iter().map(Value::as_f64).collect(),
        value => Some(vec![value.as_f64()?]),
    }
}

fn read_curve_points(object: &Map<String, Value>, kind: CurveKind) -> Option<Vec<CurvePoint>> {
    let array = object.get("default")?.as_array()?;
    let mut points = Vec::with_capacity(array.len());
    for point in array {
        let point = point.as_object()?;
        let pos = point.get("pos")?.as_f64()?;
        let interp = CurveInterpolation::parse(point.get("interp")?.as_str()?);
        match kind {
            CurveKind::Float => {
                let value = point.get("value")?.as_f64()?;
                points.push(CurvePoint {
                    pos,
                    value,
                    color: [0.0; 3],
                    interp,
                });
            }
            CurveKind::Color => {
                let c = point.get("c")?.as_array()?;
                if c.len() != 3 {
                    return None;
                }
                let color = [c[0].as_f64()?, c[1].as_f64()?, c[2].as_f64()?];
                points.push(CurvePoint {
                    pos,
                    value: 0.0,
                    color,
                    interp,
                });
            }
        }
    }
    Some(points)
}

/// Parses a parameter schema into typed descriptors, in document order.
/// Fields marked `constant` and fields of unknown type are skipped; so are
/// fields missing their required pieces (forward compatibility, not an
/// error).
pub fn read_parameters(schema: &Map<String, Value>) -> ParameterSet {
    let mut parameters = Vec::new();

    for (name, field) in schema {
        let Some(object) = field.as_object() else {
            continue;
        };

        if object
            .get("constant")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }

        let label = object
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(param_type) = object.get("param_type").and_then(Value::as_str) else {
            continue;
        };

        let value = match param_type {
            "int" => {
                let Some(defaults) = read_i64_defaults(object) else {
                    warn!(parameter = %name, "Skipping int parameter with missing default");
                    continue;
                };
                ParameterValue::Int(IntParameter {
                    values: defaults.clone(),
                    defaults,
                    min: object.get("min").and_then(Value::as_i64),
                    max: object.get("max").and_then(Value::as_i64),
                })
            }
            "float" => {
                let Some(defaults) = read_f64_defaults(object) else {
                    warn!(parameter = %name, "Skipping float parameter with missing default");
                    continue;
                };
                ParameterValue::Float(FloatParameter {
                    values: defaults.clone(),
                    defaults,
                    min: object.get("min").and_then(Value::as_f64),
                    max: object.get("max").and_then(Value::as_f64),
                })
            }
            "bool" => {
                let Some(default) = object.get("default").and_then(Value::as_bool) else {
                    warn!(parameter = %name, "Skipping bool parameter with missing default");
                    continue;
                };
                ParameterValue::Bool(BoolParameter {
                    value: default,
                    default,
                })
            }
            "string" => {
                let Some(default) = object.get("default").and_then(Value::as_str) else {
                    warn!(parameter = %name, "Skipping string parameter with missing default");
                    continue;
                };
                ParameterValue::String(StringParameter {
                    value: default.to_string(),
                    default: default.to_string(),
                })
            }
            "enum" => {
                let Some(default) = object.get("default").and_then(Value::as_str) else {
                    warn!(parameter = %name, "Skipping enum parameter with missing default");
                    continue;
                };
                let choices = object
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| {
                                let v = v.as_object()?;
                                Some(EnumChoice {
                                    name: v.get("name")?.as_str()?.to_string(),
                                    label: v.get("label")?.as_str()?.to_string(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ParameterValue::Enum(EnumParameter {
                    value: default.to_string(),
                    default: default.to_string(),
                    choices,
                })
            }
            "file" => ParameterValue::File(FileParameter::default()),
            "ramp" => {
                let ramp_type = object
                    .get("ramp_parm_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let kind = if ramp_type.contains("Float") {
                    CurveKind::Float
                } else if ramp_type.contains("Color") {
                    CurveKind::Color
                } else {
                    warn!(parameter = %name, ramp_type, "Skipping ramp parameter of unsupported kind");
                    continue;
                };
                let Some(points) = read_curve_points(object, kind) else {
                    warn!(parameter = %name, "Skipping ramp parameter with malformed points");
                    continue;
                };
                ParameterValue::Curve(CurveParameter { kind, points })
            }
            _ => continue,
        };

        parameters.push(Parameter {
            name: name.clone(),
            label,
            value,
        });
    }

    ParameterSet { parameters }
}

fn write_curve(curve: &CurveParameter) -> Value {
    let points: Vec<Value> = curve
        .points
        .iter()
        .map(|p| {
            let mut point = Map::new();
            point.insert("pos".to_string(), p.pos.into());
            match curve.kind {
                CurveKind::Float => {
                    point.insert("value".to_string(), p.value.into());
                }
                CurveKind::Color => {
                    point.insert("c".to_string(), Value::from(p.color.to_vec()));
                }
            }
            point.insert("interp".to_string(), p.interp.as_str().into());
            Value::Object(point)
        })
        .collect();
    Value::Array(points)
}

/// Serializes current values into a job request payload. Single-component
/// numeric values are written as scalars, multi-component as arrays. File
/// parameters are written as `{"file_id": ...}` carrying the uploaded id
/// for that parameter slot, or an empty string when the slot has none.
pub fn write_parameters(input_file_ids: &[String], params: &ParameterSet) -> Map<String, Value> {
    let mut doc = Map::new();
    let mut file_slot = 0;

    for param in &params.parameters {
        let value = match &param.value {
            ParameterValue::Int(p) => {
                if p.values.len() == 1 {
                    p.values[0].into()
                } else {
                    Value::from(p.values.clone())
                }
            }
            ParameterValue::Float(p) => {
                if p.values.len() == 1 {
                    p.values[0].into()
                } else {
                    Value::from(p.values.clone())
                }
            }
            ParameterValue::Bool(p) => p.value.into(),
            ParameterValue::String(p) => p.value.clone().into(),
            ParameterValue::Enum(p) => p.value.clone().into(),
            ParameterValue::File(_) => {
                let file_id = input_file_ids.get(file_slot).cloned().unwrap_or_default();
                file_slot += 1;
                let mut object = Map::new();
                object.insert("file_id".to_string(), file_id.into());
                Value::Object(object)
            }
            ParameterValue::Curve(p) => write_curve(p),
        };
        doc.insert(param.name.clone(), value);
    }

    doc
}

/// Carries edited values from one definition's parameters to another, used
/// when a job definition is updated in place. Matches by name and kind,
/// skips system parameters, and only copies values that are non-default in
/// the source and valid against the target's bounds or enum choices. File
/// references are never copied; curves copy wholesale.
pub fn copy_parameter_values(source: &ParameterSet, target: &mut ParameterSet) {
    for source_param in &source.parameters {
        if is_system_parameter(&source_param.name) {
            continue;
        }

        let Some(target_param) = target
            .parameters
            .iter_mut()
            .find(|p| p.name == source_param.name && p.value.same_kind(&source_param.value))
        else {
            continue;
        };

        match (&source_param.value, &mut target_param.value) {
            (ParameterValue::Int(s), ParameterValue::Int(t)) => t.copy_from(s),
            (ParameterValue::Float(s), ParameterValue::Float(t)) => t.copy_from(s),
            (ParameterValue::Bool(s), ParameterValue::Bool(t)) => t.copy_from(s),
            (ParameterValue::String(s), ParameterValue::String(t)) => t.copy_from(s),
            (ParameterValue::Enum(s), ParameterValue::Enum(t)) => t.copy_from(s),
            (ParameterValue::File(_), ParameterValue::File(_)) => {}
            (ParameterValue::Curve(s), ParameterValue::Curve(t)) => *t = s.clone(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_read_basic_kinds() {
        let doc = schema(json!({
            "iterations": {"label": "Iterations", "param_type": "int", "default": 4, "min": 1, "max": 10},
            "scale": {"label": "Scale", "param_type": "float", "default": [1.0, 2.0, 3.0]},
            "enabled": {"label": "Enabled", "param_type": "bool", "default": true},
            "prefix": {"label": "Prefix", "param_type": "string", "default": "rock"},
            "quality": {"label": "Quality", "param_type": "enum", "default": "low",
                        "values": [{"name": "low", "label": "Low"}, {"name": "high", "label": "High"}]},
            "terrain": {"label": "Terrain", "param_type": "file"},
        }));

        let params = read_parameters(&doc);
        assert_eq!(params.parameters.len(), 6);
        assert_eq!(params.parameters[0].name, "iterations");
        assert_eq!(params.parameters[0].label, "Iterations");

        match &params.parameters[0].value {
            ParameterValue::Int(p) => {
                assert_eq!(p.values, vec![4]);
                assert_eq!(p.defaults, vec![4]);
                assert_eq!(p.min, Some(1));
                assert_eq!(p.max, Some(10));
            }
            other => panic!("unexpected value: {:?}", other),
        }
        match &params.parameters[1].value {
            ParameterValue::Float(p) => assert_eq!(p.values, vec![1.0, 2.0, 3.0]),
            other => panic!("unexpected value: {:?}", other),
        }
        match &params.parameters[4].value {
            ParameterValue::Enum(p) => {
                assert_eq!(p.value, "low");
                assert_eq!(p.choices.len(), 2);
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_read_preserves_document_order() {
        let doc = schema(json!({
            "zeta": {"label": "Z", "param_type": "int", "default": 1},
            "alpha": {"label": "A", "param_type": "int", "default": 2},
            "mid": {"label": "M", "param_type": "int", "default": 3},
        }));
        let params = read_parameters(&doc);
        let names: Vec<&str> = params.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_read_skips_constant_and_unknown() {
        let doc = schema(json!({
            "hidden": {"label": "Hidden", "param_type": "int", "default": 1, "constant": true},
            "mystery": {"label": "Mystery", "param_type": "matrix", "default": 0},
            "kept": {"label": "Kept", "param_type": "int", "default": 7},
        }));
        let params = read_parameters(&doc);
        assert_eq!(params.parameters.len(), 1);
        assert_eq!(params.parameters[0].name, "kept");
    }

    #[test]
    fn test_read_ramp_parameters() {
        let doc = schema(json!({
            "falloff": {"label": "Falloff", "param_type": "ramp", "ramp_parm_type": "rampFloat",
                        "default": [
                            {"pos": 0.0, "value": 0.0, "interp": "Linear"},
                            {"pos": 1.0, "value": 1.0, "interp": "Bezier"},
                        ]},
            "tint": {"label": "Tint", "param_type": "ramp", "ramp_parm_type": "rampColor",
                     "default": [{"pos": 0.5, "c": [1.0, 0.5, 0.0], "interp": "Constant"}]},
        }));
        let params = read_parameters(&doc);
        assert_eq!(params.parameters.len(), 2);

        match &params.parameters[0].value {
            ParameterValue::Curve(p) => {
                assert_eq!(p.kind, CurveKind::Float);
                assert_eq!(p.points.len(), 2);
                assert_eq!(p.points[1].interp, CurveInterpolation::Bezier);
            }
            other => panic!("unexpected value: {:?}", other),
        }
        match &params.parameters[1].value {
            ParameterValue::Curve(p) => {
                assert_eq!(p.kind, CurveKind::Color);
                assert_eq!(p.points[0].color, [1.0, 0.5, 0.0]);
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_write_round_trips_defaults() {
        let doc = schema(json!({
            "iterations": {"label": "I", "param_type": "int", "default": 4},
            "scale": {"label": "S", "param_type": "float", "default": [1.0, 2.0]},
            "enabled": {"label": "E", "param_type": "bool", "default": false},
            "prefix": {"label": "P", "param_type": "string", "default": "rock"},
        }));
        let params = read_parameters(&doc);
        let written = write_parameters(&[], &params);

        assert_eq!(written.get("iterations"), Some(&json!(4)));
        assert_eq!(written.get("scale"), Some(&json!([1.0, 2.0])));
        assert_eq!(written.get("enabled"), Some(&json!(false)));
        assert_eq!(written.get("prefix"), Some(&json!("rock")));
    }

    #[test]
    fn test_write_file_slots() {
        let doc = schema(json!({
            "iterations": {"label": "I", "param_type": "int", "default": 1},
            "terrain": {"label": "T", "param_type": "file"},
            "mask": {"label": "M", "param_type": "file"},
        }));
        let params = read_parameters(&doc);

        // terrain is file slot 0, mask is slot 1; only terrain has an upload
        let file_ids = vec!["file_abc".to_string(), String::new()];
        let written = write_parameters(&file_ids, &params);

        assert_eq!(written.get("terrain"), Some(&json!({"file_id": "file_abc"})));
        assert_eq!(written.get("mask"), Some(&json!({"file_id": ""})));
    }

    #[test]
    fn test_copy_respects_bounds() {
        let mut source = ParameterSet {
            parameters: vec![Parameter {
                name: "iterations".into(),
                label: "I".into(),
                value: ParameterValue::Int(IntParameter {
                    values: vec![50],
                    defaults: vec![4],
                    min: None,
                    max: None,
                }),
            }],
        };
        let mut target = ParameterSet {
            parameters: vec![Parameter {
                name: "iterations".into(),
                label: "I".into(),
                value: ParameterValue::Int(IntParameter {
                    values: vec![4],
                    defaults: vec![4],
                    min: Some(1),
                    max: Some(10),
                }),
            }],
        };

        // out of bounds, must not copy
        copy_parameter_values(&source, &mut target);
        match &target.parameters[0].value {
            ParameterValue::Int(p) => assert_eq!(p.values, vec![4]),
            other => panic!("unexpected value: {:?}", other),
        }

        // in bounds, copies
        if let ParameterValue::Int(p) = &mut source.parameters[0].value {
            p.values = vec![8];
        }
        copy_parameter_values(&source, &mut target);
        match &target.parameters[0].value {
            ParameterValue::Int(p) => assert_eq!(p.values, vec![8]),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_copy_skips_default_values() {
        let source = ParameterSet {
            parameters: vec![Parameter {
                name: "prefix".into(),
                label: "P".into(),
                value: ParameterValue::String(StringParameter {
                    value: "rock".into(),
                    default: "rock".into(),
                }),
            }],
        };
        let mut target = ParameterSet {
            parameters: vec![Parameter {
                name: "prefix".into(),
                label: "P".into(),
                value: ParameterValue::String(StringParameter {
                    value: "boulder".into(),
                    default: "boulder".into(),
                }),
            }],
        };

        copy_parameter_values(&source, &mut target);
        match &target.parameters[0].value {
            ParameterValue::String(p) => assert_eq!(p.value, "boulder"),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_copy_skips_system_and_mismatched() {
        let source = ParameterSet {
            parameters: vec![
                Parameter {
                    name: "format".into(),
                    label: "F".into(),
                    value: ParameterValue::String(StringParameter {
                        value: "usdz".into(),
                        default: "usd".into(),
                    }),
                },
                Parameter {
                    name: "size".into(),
                    label: "S".into(),
                    value: ParameterValue::Int(IntParameter {
                        values: vec![9],
                        defaults: vec![1],
                        min: None,
                        max: None,
                    }),
                },
            ],
        };
        let mut target = ParameterSet {
            parameters: vec![
                Parameter {
                    name: "format".into(),
                    label: "F".into(),
                    value: ParameterValue::String(StringParameter {
                        value: "usd".into(),
                        default: "usd".into(),
                    }),
                },
                // same name, different kind
                Parameter {
                    name: "size".into(),
                    label: "S".into(),
                    value: ParameterValue::Float(FloatParameter {
                        values: vec![1.0],
                        defaults: vec![1.0],
                        min: None,
                        max: None,
                    }),
                },
            ],
        };

        copy_parameter_values(&source, &mut target);
        match &target.parameters[0].value {
            ParameterValue::String(p) => assert_eq!(p.value, "usd"),
            other => panic!("unexpected value: {:?}", other),
        }
        match &target.parameters[1].value {
            ParameterValue::Float(p) => assert_eq!(p.values, vec![1.0]),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_copy_never_copies_file_sources() {
        let source = ParameterSet {
            parameters: vec![Parameter {
                name: "terrain".into(),
                label: "T".into(),
                value: ParameterValue::File(FileParameter {
                    source: Some(InputSource::Mesh {
                        asset_path: "/Game/Terrain".into(),
                    }),
                    transform: TransformSpace::Relative,
                }),
            }],
        };
        let mut target = ParameterSet {
            parameters: vec![Parameter {
                name: "terrain".into(),
                label: "T".into(),
                value: ParameterValue::File(FileParameter::default()),
            }],
        };

        copy_parameter_values(&source, &mut target);
        match &target.parameters[0].value {
            ParameterValue::File(p) => assert!(p.source.is_none()),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_system_parameter_names() {
        assert!(is_system_parameter("format"));
        assert!(is_system_parameter("record_profile"));
        assert!(!is_system_parameter("iterations"));
    }
}
