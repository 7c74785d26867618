//! Live variable registry
//!
//! Holds every recorded variable together with its most recent reading and
//! presentation style. The ingestion driver samples it once per tick with
//! [`VariableRegistry::snapshot`].

use crate::config::VariableSpec;
use crate::error::{EngineError, Result};
use crate::metrics::LIVE_UPDATES_TOTAL;
use std::collections::HashMap;
use std::sync::Mutex;
use timestrata_shared::{Point, ScalarValue, Series, VariableDescriptor};
use tracing::debug;

/// Chart colours, assigned round-robin in registration order.
pub const PALETTE: [&str; 7] = [
    "rgb(255, 99, 132)",
    "rgb(255, 159, 64)",
    "rgb(255, 205, 86)",
    "rgb(75, 192, 192)",
    "rgb(54, 162, 235)",
    "rgb(153, 102, 255)",
    "rgb(201, 203, 207)",
];

pub const NO_VALUE: &str = "No value";

/// Anything that contributes variables to the registry (configuration,
/// sensor drivers).
pub trait VariableSource {
    fn append_variables(&self, out: &mut Vec<VariableSpec>);
}

/// How a current value is rendered for humans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueFormat {
    /// Fixed decimal places for numeric values
    pub precision: Option<usize>,
    /// Appended verbatim after the value
    pub unit: Option<String>,
}

/// Render `value` with `format`.
pub fn format_value(value: &ScalarValue, format: &ValueFormat) -> String {
    let mut out = match (format.precision, value) {
        (Some(p), ScalarValue::Real(r)) => format!("{:.*}", p, r),
        (Some(p), ScalarValue::Integer(i)) if p > 0 => format!("{:.*}", p, *i as f64),
        _ => value.to_string(),
    };
    if let Some(unit) = &format.unit {
        out.push_str(unit);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentValue {
    pub value: ScalarValue,
    /// Unix seconds of the update
    pub updated_at: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableStyle {
    pub display_name: String,
    pub colour: &'static str,
    pub format: ValueFormat,
}

/// One variable plus its latest reading.
#[derive(Debug)]
pub struct LiveVariable {
    descriptor: VariableDescriptor,
    style: VariableStyle,
    current: Mutex<Option<CurrentValue>>,
}

impl LiveVariable {
    pub fn new(descriptor: VariableDescriptor, style: VariableStyle) -> Self {
        Self {
            descriptor,
            style,
            current: Mutex::new(None),
        }
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.descriptor
    }

    pub fn style(&self) -> &VariableStyle {
        &self.style
    }

    pub fn has_value(&self) -> bool {
        self.current().map(|c| c.is_some()).unwrap_or(false)
    }

    pub fn update(&self, value: ScalarValue, at: f64) -> Result<()> {
        let mut current = self.current.lock().map_err(EngineError::poisoned)?;
        *current = Some(CurrentValue {
            value,
            updated_at: at,
        });
        Ok(())
    }

    pub fn current(&self) -> Result<Option<CurrentValue>> {
        let current = self.current.lock().map_err(EngineError::poisoned)?;
        Ok(current.clone())
    }

    pub fn value(&self) -> Result<Option<ScalarValue>> {
        Ok(self.current()?.map(|c| c.value))
    }

    /// Current value rendered with this variable's format, or `"No value"`.
    pub fn formatted(&self) -> Result<String> {
        Ok(match self.current()? {
            Some(c) => format_value(&c.value, &self.style.format),
            None => NO_VALUE.to_string(),
        })
    }
}

/// Ordered set of live variables; order defines the snapshot layout.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    variables: Vec<LiveVariable>,
    index: HashMap<String, usize>,
    next_colour: usize,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every source, in order.
    pub fn from_sources(sources: &[&dyn VariableSource]) -> Result<Self> {
        let mut specs = Vec::new();
        for source in sources {
            source.append_variables(&mut specs);
        }
        let mut registry = Self::new();
        for spec in &specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, spec: &VariableSpec) -> Result<&LiveVariable> {
        if self.index.contains_key(&spec.name) {
            return Err(EngineError::DuplicateVariable(spec.name.clone()));
        }
        let descriptor = spec.to_descriptor()?;
        let style = VariableStyle {
            display_name: spec.display_name.clone().unwrap_or_else(|| spec.name.clone()),
            colour: PALETTE[self.next_colour],
            format: spec.format(),
        };
        self.next_colour = (self.next_colour + 1) % PALETTE.len();

        debug!("Registered variable {} ({})", spec.name, descriptor.domain().kind());
        let slot = self.variables.len();
        self.index.insert(spec.name.clone(), slot);
        self.variables.push(LiveVariable::new(descriptor, style));
        Ok(&self.variables[slot])
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[LiveVariable] {
        &self.variables
    }

    pub fn descriptors(&self) -> Vec<VariableDescriptor> {
        self.variables.iter().map(|v| v.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&LiveVariable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    /// Record a reading for `name`.
    pub fn update(&self, name: &str, value: ScalarValue, at: f64) -> Result<()> {
        let Some(variable) = self.get(name) else {
            LIVE_UPDATES_TOTAL.with_label_values(&["unknown"]).inc();
            return Err(EngineError::UnknownVariable(name.to_string()));
        };
        variable.update(value, at)?;
        LIVE_UPDATES_TOTAL.with_label_values(&["accepted"]).inc();
        Ok(())
    }

    /// Current values aligned with registration order; unset variables are
    /// `None`.
    pub fn snapshot(&self) -> Result<Vec<Option<ScalarValue>>> {
        self.variables.iter().map(|v| v.value()).collect()
    }

    /// Latest value of each set variable as a one-point series.
    pub fn current_points(&self) -> Result<Vec<Series>> {
        let mut out = Vec::new();
        for variable in &self.variables {
            if let Some(current) = variable.current()? {
                let mut series = Series::new(variable.descriptor.name());
                series.points.push(Point::new(
                    current.updated_at,
                    variable.descriptor.presentation_value(&current.value),
                ));
                out.push(series);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestrata_shared::Domain;

    fn pump() -> VariableSpec {
        VariableSpec::new(
            "pump_mode",
            Domain::Enumerated {
                labels: vec!["off".into(), "on".into()],
            },
        )
    }

    #[test]
    fn test_snapshot_aligned_with_registration() {
        let mut registry = VariableRegistry::new();
        registry.register(&VariableSpec::new("temp", Domain::Real)).unwrap();
        registry.register(&pump()).unwrap();

        registry.update("pump_mode", "on".into(), 10.0).unwrap();
        assert_eq!(
            registry.snapshot().unwrap(),
            vec![None, Some(ScalarValue::from("on"))]
        );
        assert!(!registry.get("temp").unwrap().has_value());
    }

    #[test]
    fn test_unknown_and_duplicate() {
        let mut registry = VariableRegistry::new();
        registry.register(&pump()).unwrap();
        assert!(matches!(
            registry.register(&pump()),
            Err(EngineError::DuplicateVariable(_))
        ));
        assert!(matches!(
            registry.update("nope", 1.0.into(), 0.0),
            Err(EngineError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_colours_cycle() {
        let mut registry = VariableRegistry::new();
        for i in 0..8 {
            registry
                .register(&VariableSpec::new(format!("v{}", i), Domain::Real))
                .unwrap();
        }
        assert_eq!(registry.get("v0").unwrap().style().colour, PALETTE[0]);
        assert_eq!(registry.get("v6").unwrap().style().colour, PALETTE[6]);
        assert_eq!(registry.get("v7").unwrap().style().colour, PALETTE[0]);
    }

    #[test]
    fn test_formatting() {
        let mut spec = VariableSpec::new("temp", Domain::Real);
        spec.precision = Some(1);
        spec.unit = Some("°C".into());
        let mut registry = VariableRegistry::new();
        let var = registry.register(&spec).unwrap();
        assert_eq!(var.formatted().unwrap(), NO_VALUE);
        var.update(ScalarValue::Real(21.46), 1.0).unwrap();
        assert_eq!(var.formatted().unwrap(), "21.5°C");

        assert_eq!(
            format_value(&ScalarValue::from("on"), &ValueFormat::default()),
            "on"
        );
    }

    #[test]
    fn test_current_points_use_ordinals() {
        let mut registry = VariableRegistry::new();
        registry.register(&pump()).unwrap();
        registry.register(&VariableSpec::new("temp", Domain::Real)).unwrap();
        registry.update("pump_mode", "on".into(), 5.0).unwrap();

        let points = registry.current_points().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].variable, "pump_mode");
        assert_eq!(points[0].points, vec![Point::new(5.0, 1_i64)]);
    }

    struct Fixed(Vec<VariableSpec>);

    impl VariableSource for Fixed {
        fn append_variables(&self, out: &mut Vec<VariableSpec>) {
            out.extend(self.0.iter().cloned());
        }
    }

    #[test]
    fn test_from_sources_concatenates() {
        let a = Fixed(vec![VariableSpec::new("a", Domain::Real)]);
        let b = Fixed(vec![pump()]);
        let registry = VariableRegistry::from_sources(&[&a, &b]).unwrap();
        let names: Vec<_> = registry
            .descriptors()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "pump_mode"]);
    }
}
