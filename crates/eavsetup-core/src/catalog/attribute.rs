//! Attribute definitions and partial updates.

use super::types::{AttributeId, InputWidget, Scope, ValueType};
use rkyv::{Archive, Deserialize, Serialize};

/// Behavioural flags of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct AttributeFlags {
    /// Shown in the admin edit form.
    pub visible: bool,
    /// A value must be supplied.
    pub required: bool,
    /// Included in quick search.
    pub searchable: bool,
    /// Usable in layered navigation.
    pub filterable: bool,
    /// Shown on comparison pages.
    pub comparable: bool,
    /// Usable to build configurable entities.
    pub configurable: bool,
    /// Values must be unique across entities.
    pub unique_per_entity: bool,
    /// Created by an extension rather than the platform.
    pub user_defined: bool,
    /// Loaded in listing collections.
    pub used_in_listing: bool,
    /// Shown on the storefront.
    pub visible_on_front: bool,
    /// HTML allowed in storefront output.
    pub html_allowed_on_front: bool,
}

impl Default for AttributeFlags {
    fn default() -> Self {
        Self {
            visible: true,
            required: false,
            searchable: false,
            filterable: false,
            comparable: false,
            configurable: false,
            unique_per_entity: false,
            user_defined: true,
            used_in_listing: false,
            visible_on_front: false,
            html_allowed_on_front: false,
        }
    }
}

impl AttributeFlags {
    /// Flags for an attribute hidden from every form.
    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Default::default()
        }
    }
}

/// Declared metadata for an attribute, keyed by its code.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Attribute code, unique per entity type.
    pub code: String,
    /// Value storage type.
    pub value_type: ValueType,
    /// Edit widget.
    pub input_widget: InputWidget,
    /// Admin label.
    pub label: Option<String>,
    /// Value scope.
    pub scope: Scope,
    /// Behaviour flags.
    pub flags: AttributeFlags,
    /// Help text shown under the input.
    pub note: Option<String>,
    /// Backend model identifier.
    pub backend_model: Option<String>,
    /// Option source model identifier.
    pub source_model: Option<String>,
    /// Position in the entity's edit form.
    pub position: Option<i32>,
    /// Owned by the platform itself.
    pub system: bool,
    /// Form codes the attribute is rendered in.
    pub used_in_forms: Vec<String>,
}

impl AttributeSpec {
    /// Create a visible, user-defined, store-scoped attribute.
    pub fn new(code: impl Into<String>, value_type: ValueType, input_widget: InputWidget) -> Self {
        Self {
            code: code.into(),
            value_type,
            input_widget,
            label: None,
            scope: Scope::Store,
            flags: AttributeFlags::default(),
            note: None,
            backend_model: None,
            source_model: None,
            position: None,
            system: false,
            used_in_forms: Vec::new(),
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the backend model.
    pub fn with_backend(mut self, model: impl Into<String>) -> Self {
        self.backend_model = Some(model.into());
        self
    }

    /// Set the option source model.
    pub fn with_source(mut self, model: impl Into<String>) -> Self {
        self.source_model = Some(model.into());
        self
    }

    /// Set the form position.
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Mark the attribute as required.
    pub fn required(mut self) -> Self {
        self.flags.required = true;
        self
    }

    /// Hide the attribute from every form.
    pub fn hidden(mut self) -> Self {
        self.flags.visible = false;
        self
    }
}

/// A stored attribute: its identity plus declared metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Store-assigned identifier.
    pub id: AttributeId,
    /// Metadata.
    pub spec: AttributeSpec,
}

impl AttributeDefinition {
    /// Attribute code.
    pub fn code(&self) -> &str {
        &self.spec.code
    }
}

/// A partial update of an existing attribute.
///
/// Only fields that are `Some` are written; the code is never updatable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdate {
    /// New label.
    pub label: Option<String>,
    /// New input widget.
    pub input_widget: Option<InputWidget>,
    /// New note.
    pub note: Option<String>,
    /// New backend model.
    pub backend_model: Option<String>,
    /// New source model.
    pub source_model: Option<String>,
    /// New form position.
    pub position: Option<i32>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New required flag.
    pub required: Option<bool>,
    /// New form list.
    pub used_in_forms: Option<Vec<String>>,
}

impl AttributeUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the input widget.
    pub fn input_widget(mut self, widget: InputWidget) -> Self {
        self.input_widget = Some(widget);
        self
    }

    /// Set the note.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the backend model.
    pub fn backend_model(mut self, model: impl Into<String>) -> Self {
        self.backend_model = Some(model.into());
        self
    }

    /// Set the source model.
    pub fn source_model(mut self, model: impl Into<String>) -> Self {
        self.source_model = Some(model.into());
        self
    }

    /// Set the form position.
    pub fn position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Set visibility.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Set the required flag.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Set the forms the attribute is rendered in.
    pub fn used_in_forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used_in_forms = Some(forms.into_iter().map(Into::into).collect());
        self
    }

    /// Check if the update carries no fields.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check if applying this update would change `spec`.
    pub fn changes(&self, spec: &AttributeSpec) -> bool {
        let mut probe = spec.clone();
        self.apply_to(&mut probe);
        &probe != spec
    }

    /// Write the provided fields into `spec`, leaving the rest untouched.
    pub fn apply_to(&self, spec: &mut AttributeSpec) {
        if let Some(label) = &self.label {
            spec.label = Some(label.clone());
        }
        if let Some(widget) = self.input_widget {
            spec.input_widget = widget;
        }
        if let Some(note) = &self.note {
            spec.note = Some(note.clone());
        }
        if let Some(model) = &self.backend_model {
            spec.backend_model = Some(model.clone());
        }
        if let Some(model) = &self.source_model {
            spec.source_model = Some(model.clone());
        }
        if let Some(position) = self.position {
            spec.position = Some(position);
        }
        if let Some(visible) = self.visible {
            spec.flags.visible = visible;
        }
        if let Some(required) = self.required {
            spec.flags.required = required;
        }
        if let Some(forms) = &self.used_in_forms {
            spec.used_in_forms = forms.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee() -> AttributeSpec {
        AttributeSpec::new("shipping_fee", ValueType::Decimal, InputWidget::Price)
            .with_label("Shipping Fee")
            .with_backend("catalog/backend/price")
    }

    #[test]
    fn test_spec_defaults() {
        let spec = fee();
        assert_eq!(spec.scope, Scope::Store);
        assert!(spec.flags.visible);
        assert!(spec.flags.user_defined);
        assert!(!spec.flags.required);
        assert!(spec.note.is_none());
        assert!(spec.used_in_forms.is_empty());
    }

    #[test]
    fn test_hidden_flags() {
        let spec = AttributeSpec::new("destination_type", ValueType::Text, InputWidget::Text)
            .with_flags(AttributeFlags::hidden());
        assert!(!spec.flags.visible);
        assert!(spec.flags.user_defined);
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let mut spec = fee();
        let update = AttributeUpdate::new().note("Overridable per carrier");
        update.apply_to(&mut spec);

        assert_eq!(spec.note.as_deref(), Some("Overridable per carrier"));
        assert_eq!(spec.label.as_deref(), Some("Shipping Fee"));
        assert_eq!(spec.input_widget, InputWidget::Price);
        assert_eq!(spec.backend_model.as_deref(), Some("catalog/backend/price"));
    }

    #[test]
    fn test_update_changes_detection() {
        let spec = fee();
        assert!(AttributeUpdate::new().note("x").changes(&spec));
        assert!(!AttributeUpdate::new().label("Shipping Fee").changes(&spec));
        assert!(!AttributeUpdate::new().changes(&spec));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(AttributeUpdate::new().is_empty());
        assert!(!AttributeUpdate::new().visible(false).is_empty());
        assert!(!AttributeUpdate::new()
            .used_in_forms(["adminhtml_customer_address"])
            .is_empty());
    }
}
