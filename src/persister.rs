use crate::error::PageError;
use formatter::{LosFormatter, Value};
use state::StateError;

pub const VIEW_STATE_FIELD: &str = "__VIEWSTATE";

/// Stores page state in the `__VIEWSTATE` hidden form field as
/// `Pair(control_state, view_state)`.
#[derive(Clone, Copy, Debug)]
pub struct HiddenFieldPersister<'f> {
    formatter: &'f LosFormatter,
}

impl<'f> HiddenFieldPersister<'f> {
    pub fn new(formatter: &'f LosFormatter) -> Self {
        Self { formatter }
    }

    pub fn save(&self, control_state: Value, view_state: Value) -> Result<String, PageError> {
        if control_state.is_null() && view_state.is_null() {
            return Ok(String::new());
        }
        let field = self
            .formatter
            .serialize(&Value::pair(control_state, view_state))?;
        log::debug!(target: "page.state", "{VIEW_STATE_FIELD}: {} bytes", field.len());
        Ok(field)
    }

    /// Returns `(control_state, view_state)`; a missing or empty field
    /// loads as two nulls.
    pub fn load(&self, field: Option<&str>) -> Result<(Value, Value), PageError> {
        let Some(field) = field.filter(|field| !field.is_empty()) else {
            return Ok((Value::Null, Value::Null));
        };
        let value = self.formatter.deserialize(field).inspect_err(|err| {
            log::warn!(target: "page.state", "{VIEW_STATE_FIELD} rejected: {err}");
        })?;
        match value {
            Value::Null => Ok((Value::Null, Value::Null)),
            Value::Pair(control_state, view_state) => Ok((*control_state, *view_state)),
            other => Err(StateError::MalformedState(format!(
                "page state must be a pair, found {}",
                other.kind()
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_is_an_empty_field() {
        let formatter = LosFormatter::default();
        let persister = HiddenFieldPersister::new(&formatter);
        assert_eq!(persister.save(Value::Null, Value::Null).unwrap(), "");
        assert_eq!(persister.load(Some("")).unwrap(), (Value::Null, Value::Null));
        assert_eq!(persister.load(None).unwrap(), (Value::Null, Value::Null));
    }

    #[test]
    fn round_trip_and_shape_check() {
        let formatter = LosFormatter::default();
        let persister = HiddenFieldPersister::new(&formatter);
        let field = persister.save(Value::Null, Value::from("tree")).unwrap();
        assert_eq!(
            persister.load(Some(&field)).unwrap(),
            (Value::Null, Value::from("tree"))
        );

        let not_a_pair = formatter.serialize(&Value::Int(4)).unwrap();
        assert!(matches!(
            persister.load(Some(&not_a_pair)),
            Err(PageError::State(StateError::MalformedState(_)))
        ));
    }
}
