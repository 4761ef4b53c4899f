use serde_yaml::{Mapping, Value};

use super::{ExdirError, Result};
use crate::units::{Quantity, Unit};

/// The `attributes.yaml` mapping of one object.
///
/// Quantities are stored the way the Exdir `quantities` plugin writes them:
/// `{value: 30000.0, unit: Hz}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    object: String,
    map: Mapping,
}

impl Attributes {
    /// An empty mapping owned by `object` (used in error messages).
    pub fn empty(object: &str) -> Self {
        Attributes {
            object: object.to_string(),
            map: Mapping::new(),
        }
    }

    pub fn from_yaml(object: &str, text: &str) -> Result<Self> {
        let map = match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ExdirError::InvalidAttribute {
                    object: object.to_string(),
                    attr: "<root>".to_string(),
                    reason: "attributes.yaml is not a mapping".to_string(),
                })
            }
        };
        Ok(Attributes {
            object: object.to_string(),
            map,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.map)?)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Like [`get`](Self::get), but a missing key is a lookup failure.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.map.get(key).ok_or_else(|| ExdirError::MissingAttribute {
            object: self.object.clone(),
            attr: key.to_string(),
        })
    }

    /// String-keyed entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| self.invalid(key, "expected a string"))
    }

    pub fn i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 => Ok(f as i64),
            _ => Err(self.invalid(key, "expected an integer")),
        }
    }

    /// A plain number, or the magnitude of a stored quantity.
    pub fn f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        match value {
            Value::Mapping(m) => m
                .get("value")
                .and_then(Value::as_f64)
                .ok_or_else(|| self.invalid(key, "quantity without numeric 'value'")),
            other => other
                .as_f64()
                .ok_or_else(|| self.invalid(key, "expected a number")),
        }
    }

    /// A stored quantity. Bare numbers are taken to be in `default_unit`.
    pub fn quantity(&self, key: &str, default_unit: Unit) -> Result<Quantity> {
        let value = self.require(key)?;
        match value {
            Value::Mapping(m) => {
                let magnitude = m
                    .get("value")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| self.invalid(key, "quantity without numeric 'value'"))?;
                let unit = match m.get("unit").and_then(Value::as_str) {
                    Some(symbol) => Unit::parse(symbol)?,
                    None => default_unit,
                };
                Ok(Quantity::new(magnitude, unit))
            }
            other => other
                .as_f64()
                .map(|v| Quantity::new(v, default_unit))
                .ok_or_else(|| self.invalid(key, "expected a quantity")),
        }
    }

    /// The `unit` attribute of a dataset, if present.
    pub fn unit(&self) -> Result<Option<Unit>> {
        match self.map.get("unit") {
            None => Ok(None),
            Some(value) => {
                let symbol = value
                    .as_str()
                    .ok_or_else(|| self.invalid("unit", "expected a unit symbol"))?;
                Ok(Some(Unit::parse(symbol)?))
            }
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.map.insert(Value::from(key), value.into());
    }

    pub fn insert_quantity(&mut self, key: &str, quantity: Quantity) {
        let mut m = Mapping::new();
        m.insert(Value::from("value"), Value::from(quantity.value));
        m.insert(Value::from("unit"), Value::from(quantity.unit.symbol()));
        self.map.insert(Value::from(key), Value::Mapping(m));
    }

    fn invalid(&self, key: &str, reason: &str) -> ExdirError {
        ExdirError::InvalidAttribute {
            object: self.object.clone(),
            attr: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
electrode_idx: 3
sample_rate:
  value: 30.0
  unit: kHz
cluster_group: noise
start_time: 0.5
";

    #[test]
    fn reads_typed_values() {
        let attrs = Attributes::from_yaml("/LFP/ch3", SAMPLE).unwrap();
        assert_eq!(attrs.i64("electrode_idx").unwrap(), 3);
        assert_eq!(attrs.str("cluster_group").unwrap(), "noise");
        assert_eq!(attrs.f64("start_time").unwrap(), 0.5);

        let rate = attrs.quantity("sample_rate", Unit::HERTZ).unwrap();
        assert_eq!(rate.unit, Unit::KILOHERTZ);
        assert!((rate.value_in(Unit::HERTZ).unwrap() - 30000.0).abs() < 1e-9);
    }

    #[test]
    fn missing_key_names_the_object() {
        let attrs = Attributes::from_yaml("/LFP/ch3", SAMPLE).unwrap();
        let err = attrs.require("electrode_group").unwrap_err();
        assert_eq!(
            err.to_string(),
            "attribute 'electrode_group' missing on '/LFP/ch3'"
        );
    }

    #[test]
    fn quantities_survive_a_write() {
        let mut attrs = Attributes::empty("/");
        attrs.insert_quantity("session_duration", Quantity::new(12.0, Unit::SECOND));
        attrs.insert("name", "unit 1");
        let back = Attributes::from_yaml("/", &attrs.to_yaml().unwrap()).unwrap();
        assert_eq!(
            back.quantity("session_duration", Unit::MILLISECOND).unwrap(),
            Quantity::new(12.0, Unit::SECOND)
        );
        assert_eq!(back.str("name").unwrap(), "unit 1");
    }

    #[test]
    fn malformed_unit_symbol_propagates() {
        let attrs = Attributes::from_yaml("/data", "unit: parsec-ish").unwrap();
        assert!(matches!(attrs.unit(), Err(ExdirError::Unit(_))));
    }
}
