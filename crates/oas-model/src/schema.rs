//! Schema tree: the [`RefOr`] reference-or-inline wrapper, [`Reference`],
//! [`Schema`], and [`Discriminator`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::Any;

/// Prefix of every in-document component schema reference.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// A node that is either a `$ref` to a component or an inline value.
///
/// The `Ref` variant is listed first: under `#[serde(untagged)]` variants are
/// tried in order, and a `{"$ref": …}` map must resolve to a reference even
/// when `T` would also accept it (e.g. [`Schema`], whose fields are all
/// optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    /// A reference to a component defined elsewhere in the document.
    Ref(Reference),
    /// An inline value.
    Item(T),
}

impl<T> RefOr<T> {
    /// Wrap a raw reference string.
    pub fn reference(reference: impl Into<String>) -> Self {
        Self::Ref(Reference::new(reference))
    }

    /// Build a `#/components/schemas/<name>` reference.
    pub fn schema_ref(name: &str) -> Self {
        Self::Ref(Reference::schema(name))
    }

    /// The inline value, if any.
    pub fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Ref(_) => None,
        }
    }

    /// Mutable access to the inline value, if any.
    pub fn as_item_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Ref(_) => None,
        }
    }

    /// The reference, if any.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Ref(reference) => Some(reference),
            Self::Item(_) => None,
        }
    }

    /// Whether this node is a `$ref`.
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// The component schema name this node points at, if it is a
    /// `#/components/schemas/…` reference.
    pub fn referenced_schema(&self) -> Option<&str> {
        self.as_reference().and_then(Reference::schema_name)
    }
}

/// A `$ref` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// The reference string, e.g. `#/components/schemas/User`.
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl Reference {
    /// Wrap a raw reference string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Build a `#/components/schemas/<name>` reference.
    pub fn schema(name: &str) -> Self {
        Self::new(format!("{SCHEMA_REF_PREFIX}{name}"))
    }

    /// The component schema name, if this points into `components.schemas`.
    pub fn schema_name(&self) -> Option<&str> {
        self.reference.strip_prefix(SCHEMA_REF_PREFIX)
    }

    /// Whether this reference points into the path model (`#/paths/…`).
    ///
    /// Such references leak out of example payloads and never resolve to a
    /// schema; the reference engine retargets them.
    pub fn is_path_ref(&self) -> bool {
        self.reference.starts_with("#/paths/")
    }
}

/// An inline schema.
///
/// Carries exactly the fields the rewrite passes read and write. Defaults,
/// examples, and enum elements are arbitrary JSON values.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// `string`, `integer`, `number`, `boolean`, `array`, `object`, or `null`.
    #[serde(rename = "type")]
    pub schema_type: Option<String>,
    /// Format qualifier (`date-time`, `uuid`, `int64`, …).
    pub format: Option<String>,
    /// Human-readable schema title.
    pub title: Option<String>,
    /// Human-readable schema description.
    pub description: Option<String>,
    /// Default value; any JSON kind.
    pub default: Option<Any>,
    /// Example value; any JSON kind.
    pub example: Option<Any>,
    /// Enum elements, in document order.
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Any>>,
    /// Named properties, in document order.
    pub properties: Option<IndexMap<String, RefOr<Schema>>>,
    /// Names of required properties.
    pub required: Option<Vec<String>>,
    /// Array element schema.
    pub items: Option<Box<RefOr<Schema>>>,
    /// Map-value schema or boolean toggle.
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<AdditionalProperties>,
    /// Conjunction of subschemas.
    #[serde(rename = "allOf")]
    pub all_of: Option<Vec<RefOr<Schema>>>,
    /// Exclusive disjunction of subschemas.
    #[serde(rename = "oneOf")]
    pub one_of: Option<Vec<RefOr<Schema>>>,
    /// Inclusive disjunction of subschemas.
    #[serde(rename = "anyOf")]
    pub any_of: Option<Vec<RefOr<Schema>>>,
    /// Polymorphic branch selector.
    pub discriminator: Option<Discriminator>,
    /// Whether `null` is an accepted value.
    pub nullable: Option<bool>,
    /// Minimum string length.
    #[serde(rename = "minLength")]
    pub min_length: Option<u64>,
    /// Maximum string length.
    #[serde(rename = "maxLength")]
    pub max_length: Option<u64>,
    /// Regular expression constraint for strings.
    pub pattern: Option<String>,
    /// Inclusive numeric lower bound.
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound.
    pub maximum: Option<f64>,
}

impl Schema {
    /// A schema with only `type` set.
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    /// `type: string`.
    pub fn string() -> Self {
        Self::typed("string")
    }

    /// `type: object`.
    pub fn object() -> Self {
        Self::typed("object")
    }

    /// Whether `type` matches the given name.
    pub fn is_type(&self, name: &str) -> bool {
        self.schema_type.as_deref() == Some(name)
    }

    /// Whether any composition list (`allOf`/`oneOf`/`anyOf`) is non-empty.
    pub fn has_composition(&self) -> bool {
        [&self.all_of, &self.one_of, &self.any_of]
            .into_iter()
            .any(|list| list.as_ref().is_some_and(|branches| !branches.is_empty()))
    }

    /// Whether the `properties` map is present and non-empty.
    pub fn has_properties(&self) -> bool {
        self.properties.as_ref().is_some_and(|props| !props.is_empty())
    }

    /// Whether the `enum` list is present and non-empty.
    pub fn has_enum(&self) -> bool {
        self.enum_values.as_ref().is_some_and(|vals| !vals.is_empty())
    }

    /// An empty schema carries no semantic content at all: no type, no
    /// properties, no composition, no enum, no items, and no additional
    /// properties beyond an explicit `false`.
    pub fn is_empty(&self) -> bool {
        self.schema_type.is_none()
            && !self.has_properties()
            && !self.has_composition()
            && !self.has_enum()
            && self.items.is_none()
            && matches!(
                &self.additional_properties,
                None | Some(AdditionalProperties::Allowed(false))
            )
    }

    /// A pure primitive is a scalar `type` plus formatting facets — nothing a
    /// generator would emit a named type for.
    pub fn is_pure_primitive(&self) -> bool {
        matches!(
            self.schema_type.as_deref(),
            Some("string" | "integer" | "number" | "boolean")
        ) && !self.has_enum()
            && !self.has_composition()
            && !self.has_properties()
            && self.items.is_none()
    }

    /// An enum-only schema: its enum values are its whole definition.
    pub fn is_enum_only(&self) -> bool {
        self.has_enum() && !self.has_properties() && !self.has_composition()
    }

    /// Whether a typeless schema is clearly object-shaped: it declares
    /// properties, additional properties, or an inline object composition
    /// branch.
    pub fn looks_object_like(&self) -> bool {
        if self.has_properties() || self.additional_properties.is_some() {
            return true;
        }
        [&self.all_of, &self.one_of, &self.any_of]
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(RefOr::as_item)
            .any(|branch| branch.is_type("object") || branch.has_properties())
    }

    /// All composition lists, mutable, in `allOf`, `oneOf`, `anyOf` order.
    pub fn compositions_mut(&mut self) -> impl Iterator<Item = &mut Vec<RefOr<Schema>>> + '_ {
        [&mut self.all_of, &mut self.one_of, &mut self.any_of]
            .into_iter()
            .flatten()
    }

    /// Add `name` to `required` unless already present.
    pub fn require(&mut self, name: &str) {
        let required = self.required.get_or_insert_with(Vec::new);
        if !required.iter().any(|entry| entry == name) {
            required.push(name.to_string());
        }
    }
}

/// The `additionalProperties` keyword: a boolean toggle or a value schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    /// `additionalProperties: true` / `false`.
    Allowed(bool),
    /// A schema for map values.
    Schema(Box<RefOr<Schema>>),
}

/// Selects a polymorphic branch by property value.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    /// The payload property holding the discriminator value.
    #[serde(rename = "propertyName")]
    pub property_name: String,
    /// Maps discriminator values to schema references.
    pub mapping: Option<IndexMap<String, String>>,
}

impl Discriminator {
    /// A discriminator on `property_name` with an empty mapping.
    pub fn new(property_name: &str) -> Self {
        Self {
            property_name: property_name.to_string(),
            mapping: Some(IndexMap::new()),
        }
    }
}
