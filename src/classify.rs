//! Classification of exposure features into building types from their attributes.
//!
//! Candidate attribute keys are tried in priority order. For each key, the value is run through
//! an ordered list of [`Resolver`]s; the first resolver to give a definite answer wins. If no key
//! gives a definite answer the feature is classified as [`BuildingType::other`].
use crate::feature::Attributes;
use crate::vulnerability::BuildingType;
use indexmap::IndexMap;
use log::debug;

/// The attribute keys tried by default, in priority order
pub const DEFAULT_CANDIDATE_KEYS: [&str; 7] = [
    "type",
    "amenity",
    "building_t",
    "office",
    "tourism",
    "leisure",
    "building",
];

/// The aliases applied by default, as `(usage, building type)` pairs
pub const DEFAULT_ALIASES: [(&str, &str); 1] = [("supermarket", "commercial")];

/// Normalise a usage string for matching: lower-case, strip underscores and trim
pub fn normalise(value: &str) -> String {
    value.to_lowercase().replace('_', "").trim().to_string()
}

/// The set of building types a feature can be classified into
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vocabulary(IndexMap<String, BuildingType>);

impl Vocabulary {
    /// Whether the vocabulary has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The building type whose normalised form equals `normalised`
    fn get(&self, normalised: &str) -> Option<&BuildingType> {
        self.0.get(normalised)
    }

    /// The building types whose normalised form is contained in `normalised`
    fn contained_in<'a>(&'a self, normalised: &'a str) -> impl Iterator<Item = &'a BuildingType> {
        self.0
            .iter()
            .filter(move |(key, _)| normalised.contains(key.as_str()))
            .map(|(_, building_type)| building_type)
    }
}

impl<'a> FromIterator<&'a BuildingType> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = &'a BuildingType>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|building_type| (normalise(building_type.as_str()), building_type.clone()))
                .filter(|(key, _)| !key.is_empty())
                .collect(),
        )
    }
}

/// The outcome of applying a resolver to a usage value
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The value maps to a single building type
    Resolved(BuildingType),
    /// The value matches more than one building type
    Ambiguous,
    /// The value matches nothing
    NoMatch,
}

/// A rule for mapping a normalised usage value onto the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// The value equals a vocabulary entry
    Exact,
    /// The value is a configured alias of a vocabulary entry
    Alias,
    /// Exactly one vocabulary entry is contained in the value
    Substring,
}

/// The resolvers applied to each value, in order
pub const RESOLVERS: [Resolver; 3] = [Resolver::Exact, Resolver::Alias, Resolver::Substring];

/// Maps feature attributes onto building types
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    keys: Vec<String>,
    aliases: IndexMap<String, String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_CANDIDATE_KEYS.iter().copied(),
            DEFAULT_ALIASES.iter().copied(),
        )
    }
}

impl Classifier {
    /// Create a new classifier.
    ///
    /// # Arguments
    ///
    /// * `keys` - Attribute keys to try, in priority order
    /// * `aliases` - Pairs of `(usage, building type)`
    pub fn new<K, A, S, T, U>(keys: K, aliases: A) -> Self
    where
        K: IntoIterator<Item = S>,
        A: IntoIterator<Item = (T, U)>,
        S: Into<String>,
        T: AsRef<str>,
        U: AsRef<str>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            aliases: aliases
                .into_iter()
                .map(|(from, to)| (normalise(from.as_ref()), normalise(to.as_ref())))
                .collect(),
        }
    }

    /// The candidate keys, in priority order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Classify a feature from its attributes.
    ///
    /// Returns [`BuildingType::other`] if no candidate key yields a definite match.
    pub fn classify(&self, attributes: &Attributes, vocabulary: &Vocabulary) -> BuildingType {
        for key in &self.keys {
            let Some(value) = attributes.get(key).filter(|value| !value.is_empty()) else {
                continue;
            };

            let usage = normalise(&value.to_string());
            for resolver in RESOLVERS {
                match self.resolve(resolver, &usage, vocabulary) {
                    Resolution::Resolved(building_type) => return building_type,
                    Resolution::Ambiguous => {
                        debug!("Usage '{usage}' from key '{key}' is ambiguous");
                        break;
                    }
                    Resolution::NoMatch => {}
                }
            }
        }

        BuildingType::other()
    }

    /// Apply a single resolver to a normalised usage value
    pub fn resolve(&self, resolver: Resolver, usage: &str, vocabulary: &Vocabulary) -> Resolution {
        let found = match resolver {
            Resolver::Exact => vocabulary.get(usage).cloned(),
            Resolver::Alias => self
                .aliases
                .get(usage)
                .and_then(|target| vocabulary.get(target))
                .cloned(),
            Resolver::Substring => {
                let mut matches = vocabulary.contained_in(usage);
                match (matches.next(), matches.next()) {
                    (Some(building_type), None) => Some(building_type.clone()),
                    (Some(_), Some(_)) => return Resolution::Ambiguous,
                    (None, _) => None,
                }
            }
        };

        found.map_or(Resolution::NoMatch, Resolution::Resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::AttributeValue;
    use rstest::{fixture, rstest};

    #[fixture]
    fn vocabulary() -> Vocabulary {
        ["residential", "commercial", "school", "place_of_worship", "hospital"]
            .map(BuildingType::new)
            .iter()
            .collect()
    }

    fn attributes(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(key, value)| (*key, AttributeValue::from(*value)))
            .collect()
    }

    #[rstest]
    #[case("Commercial_Building")]
    #[case("commercial_building")]
    #[case("COMMERCIAL")]
    #[case("supermarket")]
    fn test_classify_commercial(vocabulary: Vocabulary, #[case] value: &str) {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&attributes(&[("type", value)]), &vocabulary),
            BuildingType::new("commercial")
        );
    }

    #[rstest]
    fn test_classify_empty(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&Attributes::new(), &vocabulary),
            BuildingType::other()
        );
    }

    #[rstest]
    fn test_classify_key_case_insensitive(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&attributes(&[("TYPE", "School")]), &vocabulary),
            BuildingType::new("school")
        );
    }

    #[rstest]
    fn test_classify_key_priority(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        let attrs = attributes(&[("building", "hospital"), ("amenity", "school")]);
        assert_eq!(
            classifier.classify(&attrs, &vocabulary),
            BuildingType::new("school")
        );
    }

    #[rstest]
    fn test_classify_key_case_with_null_spelling(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        let mut attrs = attributes(&[("TYPE", "School")]);
        attrs.insert("type", AttributeValue::Null);
        assert_eq!(
            classifier.classify(&attrs, &vocabulary),
            BuildingType::new("school")
        );
    }

    #[rstest]
    fn test_classify_skips_empty_values(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        let mut attrs = attributes(&[("building", "hospital")]);
        attrs.insert("type", AttributeValue::Int(0));
        attrs.insert("amenity", AttributeValue::Null);
        attrs.insert("office", "  ".into());
        assert_eq!(
            classifier.classify(&attrs, &vocabulary),
            BuildingType::new("hospital")
        );
    }

    #[rstest]
    fn test_classify_ambiguous_falls_through(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        let attrs = attributes(&[("type", "school_hospital"), ("building", "residential")]);
        assert_eq!(
            classifier.classify(&attrs, &vocabulary),
            BuildingType::new("residential")
        );
    }

    #[rstest]
    fn test_classify_no_match(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&attributes(&[("type", "yes")]), &vocabulary),
            BuildingType::other()
        );
    }

    #[rstest]
    fn test_classify_normalised_vocabulary(vocabulary: Vocabulary) {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&attributes(&[("amenity", "Place_Of_Worship")]), &vocabulary),
            BuildingType::new("place_of_worship")
        );
    }

    #[rstest]
    fn test_alias_requires_target_in_vocabulary() {
        let vocabulary: Vocabulary = [BuildingType::new("residential")].iter().collect();
        let classifier = Classifier::default();
        assert_eq!(
            classifier.resolve(Resolver::Alias, "supermarket", &vocabulary),
            Resolution::NoMatch
        );
    }

    #[rstest]
    #[case(Resolver::Exact, "school", Resolution::Resolved(BuildingType::new("school")))]
    #[case(Resolver::Exact, "primaryschool", Resolution::NoMatch)]
    #[case(
        Resolver::Substring,
        "primaryschool",
        Resolution::Resolved(BuildingType::new("school"))
    )]
    #[case(Resolver::Substring, "schoolhospital", Resolution::Ambiguous)]
    #[case(
        Resolver::Alias,
        "supermarket",
        Resolution::Resolved(BuildingType::new("commercial"))
    )]
    fn test_resolve(
        vocabulary: Vocabulary,
        #[case] resolver: Resolver,
        #[case] usage: &str,
        #[case] expected: Resolution,
    ) {
        let classifier = Classifier::default();
        assert_eq!(classifier.resolve(resolver, usage, &vocabulary), expected);
    }

    #[rstest]
    fn test_custom_keys_and_aliases(vocabulary: Vocabulary) {
        let classifier = Classifier::new(["usage"], [("Shop", "commercial")]);
        assert_eq!(classifier.keys(), ["usage"]);
        assert_eq!(
            classifier.classify(&attributes(&[("usage", "shop")]), &vocabulary),
            BuildingType::new("commercial")
        );
        assert_eq!(
            classifier.classify(&attributes(&[("type", "school")]), &vocabulary),
            BuildingType::other()
        );
    }
}
