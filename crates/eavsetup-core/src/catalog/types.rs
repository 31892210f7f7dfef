//! Identifier and metadata enums for the attribute catalog.

use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;

/// Identifier of an attribute definition, unique across the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
pub struct AttributeId(pub u32);

/// Identifier of an attribute set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
pub struct SetId(pub u32);

/// Identifier of an attribute group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
pub struct GroupId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage type of an attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ValueType {
    /// Stored on the entity row itself.
    Static,
    /// Short string.
    Varchar,
    /// Long text.
    Text,
    /// Integer (also used for booleans and option ids).
    Int,
    /// Fixed-point decimal.
    Decimal,
    /// Date and time.
    Datetime,
    /// Calendar date.
    Date,
}

/// Form widget used to edit an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum InputWidget {
    /// Single-line text.
    Text,
    /// Multi-line text.
    Textarea,
    /// Dropdown.
    Select,
    /// Multiple selection list.
    Multiselect,
    /// Yes/no toggle.
    Boolean,
    /// Currency amount.
    Price,
    /// Date picker.
    Date,
}

/// Scope at which attribute values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum Scope {
    /// One value for the whole installation.
    Global,
    /// One value per website.
    Website,
    /// One value per store view.
    Store,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Static => "static",
            ValueType::Varchar => "varchar",
            ValueType::Text => "text",
            ValueType::Int => "int",
            ValueType::Decimal => "decimal",
            ValueType::Datetime => "datetime",
            ValueType::Date => "date",
        };
        f.write_str(name)
    }
}

impl fmt::Display for InputWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputWidget::Text => "text",
            InputWidget::Textarea => "textarea",
            InputWidget::Select => "select",
            InputWidget::Multiselect => "multiselect",
            InputWidget::Boolean => "boolean",
            InputWidget::Price => "price",
            InputWidget::Date => "date",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Website => write!(f, "website"),
            Scope::Store => write!(f, "store"),
        }
    }
}
