use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unknown unit symbol '{0}'")]
    Unknown(String),
    #[error("cannot rescale {from} to {to}: incompatible dimensions")]
    Incompatible { from: String, to: String },
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// Physical dimension of a unit. Rescaling is only defined within one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Voltage,
    Time,
    Frequency,
    Angle,
    Dimensionless,
}

/// A unit of measure: a symbol plus its scale relative to the base unit of
/// its dimension (V, s, Hz, rad).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    symbol: &'static str,
    dimension: Dimension,
    scale: f64,
}

impl Unit {
    pub const VOLT: Unit = Unit::new("V", Dimension::Voltage, 1.0);
    pub const MILLIVOLT: Unit = Unit::new("mV", Dimension::Voltage, 1e-3);
    pub const MICROVOLT: Unit = Unit::new("uV", Dimension::Voltage, 1e-6);
    pub const NANOVOLT: Unit = Unit::new("nV", Dimension::Voltage, 1e-9);
    pub const SECOND: Unit = Unit::new("s", Dimension::Time, 1.0);
    pub const MILLISECOND: Unit = Unit::new("ms", Dimension::Time, 1e-3);
    pub const MICROSECOND: Unit = Unit::new("us", Dimension::Time, 1e-6);
    pub const HERTZ: Unit = Unit::new("Hz", Dimension::Frequency, 1.0);
    pub const KILOHERTZ: Unit = Unit::new("kHz", Dimension::Frequency, 1e3);
    pub const RADIAN: Unit = Unit::new("rad", Dimension::Angle, 1.0);
    pub const DEGREE: Unit = Unit::new("deg", Dimension::Angle, std::f64::consts::PI / 180.0);
    pub const DIMENSIONLESS: Unit = Unit::new("dimensionless", Dimension::Dimensionless, 1.0);

    const fn new(symbol: &'static str, dimension: Dimension, scale: f64) -> Self {
        Unit {
            symbol,
            dimension,
            scale,
        }
    }

    /// Parse a unit symbol as written by the Python `quantities` package.
    pub fn parse(symbol: &str) -> Result<Unit, UnitError> {
        let unit = match symbol.trim() {
            "V" | "volt" => Unit::VOLT,
            "mV" | "millivolt" => Unit::MILLIVOLT,
            "uV" | "µV" | "μV" | "microvolt" => Unit::MICROVOLT,
            "nV" | "nanovolt" => Unit::NANOVOLT,
            "s" | "sec" | "second" => Unit::SECOND,
            "ms" | "millisecond" => Unit::MILLISECOND,
            "us" | "µs" | "μs" | "microsecond" => Unit::MICROSECOND,
            "Hz" | "hertz" => Unit::HERTZ,
            "kHz" | "kilohertz" => Unit::KILOHERTZ,
            "rad" | "radian" | "radians" => Unit::RADIAN,
            "deg" | "degree" | "degrees" | "arcdeg" => Unit::DEGREE,
            "" | "dimensionless" => Unit::DIMENSIONLESS,
            other => return Err(UnitError::Unknown(other.to_string())),
        };
        Ok(unit)
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Multiplicative factor converting a value in `self` into `target`.
    pub fn factor_to(&self, target: Unit) -> Result<f64, UnitError> {
        if self.dimension != target.dimension {
            return Err(UnitError::Incompatible {
                from: self.symbol.to_string(),
                to: target.symbol.to_string(),
            });
        }
        Ok(self.scale / target.scale)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// A scalar with a unit attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    pub fn rescale(&self, target: Unit) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value * self.unit.factor_to(target)?, target))
    }

    /// Value expressed in `target`.
    pub fn value_in(&self, target: Unit) -> Result<f64, UnitError> {
        Ok(self.rescale(target)?.value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quantities_symbols() {
        assert_eq!(Unit::parse("uV").unwrap(), Unit::MICROVOLT);
        assert_eq!(Unit::parse("µV").unwrap(), Unit::MICROVOLT);
        assert_eq!(Unit::parse("degree").unwrap(), Unit::DEGREE);
        assert_eq!(Unit::parse("").unwrap(), Unit::DIMENSIONLESS);
        assert_eq!(
            Unit::parse("furlong"),
            Err(UnitError::Unknown("furlong".to_string()))
        );
    }

    #[test]
    fn rescales_within_dimension() {
        let q = Quantity::new(1500.0, Unit::MICROVOLT);
        let mv = q.rescale(Unit::MILLIVOLT).unwrap();
        assert!((mv.value - 1.5).abs() < 1e-12);

        let khz = Quantity::new(30.0, Unit::KILOHERTZ);
        assert!((khz.value_in(Unit::HERTZ).unwrap() - 30000.0).abs() < 1e-9);

        let deg = Quantity::new(std::f64::consts::PI, Unit::RADIAN);
        assert!((deg.value_in(Unit::DEGREE).unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn refuses_cross_dimension_rescale() {
        let q = Quantity::new(1.0, Unit::SECOND);
        assert!(matches!(
            q.rescale(Unit::MILLIVOLT),
            Err(UnitError::Incompatible { .. })
        ));
    }
}
