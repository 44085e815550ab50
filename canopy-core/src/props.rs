//! Declared props defaults.
//!
//! Component properties have exactly one defaults mechanism: the props
//! struct implements [`Default`] and is marked `#[serde(default)]`. A props
//! payload from the host may then omit any field, and the omitted fields
//! come from `Default`.
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! #[serde(default)]
//! struct PersonProps { name: String, age: u32, city: String }
//!
//! impl Default for PersonProps {
//!     fn default() -> Self {
//!         Self { name: "Unknown".into(), age: 0, city: "Unknown".into() }
//!     }
//! }
//!
//! let props: PersonProps = props::resolve_str(r#"{"name": "Jane Doe"}"#)?;
//! assert_eq!(props.city, "Unknown");
//! ```

use serde::de::DeserializeOwned;

use crate::error::{CoreError, Result};

/// Resolve a JSON props payload against the declared defaults of `P`.
///
/// `null` is treated as "no props given" and yields `P::default()`.
pub fn resolve<P>(payload: serde_json::Value) -> Result<P>
where
    P: DeserializeOwned + Default,
{
    if payload.is_null() {
        return Ok(P::default());
    }
    serde_json::from_value(payload).map_err(CoreError::InvalidProps)
}

/// Like [`resolve`], from a JSON string.
pub fn resolve_str<P>(payload: &str) -> Result<P>
where
    P: DeserializeOwned + Default,
{
    let value: serde_json::Value = serde_json::from_str(payload).map_err(CoreError::InvalidProps)?;
    resolve(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(default)]
    struct PersonProps {
        name: String,
        age: u32,
        city: String,
    }

    impl Default for PersonProps {
        fn default() -> Self {
            Self {
                name: "Unknown".into(),
                age: 0,
                city: "Unknown".into(),
            }
        }
    }

    #[test]
    fn missing_fields_come_from_defaults() {
        let props: PersonProps = resolve_str(r#"{"name": "Jane Doe", "age": 25}"#).unwrap();
        assert_eq!(props.name, "Jane Doe");
        assert_eq!(props.age, 25);
        assert_eq!(props.city, "Unknown");
    }

    #[test]
    fn null_and_empty_payloads_are_all_defaults() {
        let from_null: PersonProps = resolve(serde_json::Value::Null).unwrap();
        let from_empty: PersonProps = resolve_str("{}").unwrap();
        assert_eq!(from_null, PersonProps::default());
        assert_eq!(from_empty, PersonProps::default());
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = resolve_str::<PersonProps>(r#"{"age": "thirty"}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidProps(_)));
    }
}
