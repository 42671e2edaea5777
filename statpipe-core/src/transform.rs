use statpipe_common::{Record, Result, StatPipeError};

pub type ProjectFn = Box<dyn Fn(&Record) -> Result<f64> + Send + Sync>;
pub type AcceptFn = Box<dyn Fn(f64) -> bool + Send + Sync>;

/// Pure per-record projection plus filter predicate, captured at pipeline
/// construction. No I/O, no side effects; a failed projection is a
/// per-record rejection, not a fatal error.
pub struct Transform {
    project: ProjectFn,
    accept: AcceptFn,
}

impl Transform {
    pub fn new(
        project: impl Fn(&Record) -> Result<f64> + Send + Sync + 'static,
        accept: impl Fn(f64) -> bool + Send + Sync + 'static,
    ) -> Self {
        Transform {
            project: Box::new(project),
            accept: Box::new(accept),
        }
    }

    /// Extract the numeric field as-is and accept everything.
    pub fn identity() -> Self {
        Transform::new(|r| Ok(r.value.numeric), |_| true)
    }

    /// Identity projection with a filter on the projected value.
    pub fn filtered(accept: impl Fn(f64) -> bool + Send + Sync + 'static) -> Self {
        Transform::new(|r| Ok(r.value.numeric), accept)
    }

    pub fn project(&self, record: &Record) -> Result<f64> {
        let v = (self.project)(record)?;
        if !v.is_finite() {
            return Err(StatPipeError::Projection(format!(
                "projection of key {} produced a non-finite value ({v})",
                record.key
            )));
        }
        Ok(v)
    }

    pub fn accept(&self, value: f64) -> bool {
        (self.accept)(value)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_conversion() {
        assert!((celsius_to_fahrenheit(21.0) - 69.8).abs() < 1e-12);
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-12);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-12);
    }

    #[test]
    fn identity_projects_numeric_field() {
        let t = Transform::identity();
        let r = Record::new(1, 21.0, "London");
        assert_eq!(t.project(&r).unwrap(), 21.0);
        assert!(t.accept(1e12));
    }

    #[test]
    fn non_finite_projections_are_rejected() {
        let r = Record::new(9, 0.0, "x");
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let t = Transform::new(move |_| Ok(bad), |_| true);
            assert!(matches!(
                t.project(&r),
                Err(StatPipeError::Projection(_))
            ));
        }
    }

    #[test]
    fn filter_gates_values() {
        let t = Transform::new(
            |r| Ok(celsius_to_fahrenheit(r.value.numeric)),
            |f| f > 50.0,
        );
        let oslo = Record::new(4, 8.0, "Oslo");
        let v = t.project(&oslo).unwrap();
        assert!((v - 46.4).abs() < 1e-12);
        assert!(!t.accept(v));
        assert!(t.accept(69.8));
    }
}
