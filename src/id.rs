//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::IndexSet;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `FeatureID`, `BuildingType`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

/// Look up an ID in a set by its string representation.
///
/// # Returns
///
/// A copy of the ID stored in `ids`, or an error if not found.
pub fn get_id_by_str<ID>(ids: &IndexSet<ID>, id: &str) -> Result<ID>
where
    ID: Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone,
{
    let found = ids.get(id).with_context(|| format!("Unknown ID {id} found"))?;
    Ok(found.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    define_id_type!(GenericID);

    #[test]
    fn test_get_id_by_str() {
        let ids: IndexSet<GenericID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(get_id_by_str(&ids, "b").unwrap(), GenericID::new("b"));
        assert!(get_id_by_str(&ids, "c").is_err());
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![GenericID::new("school"), GenericID::new("house")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "house");
    }
}
