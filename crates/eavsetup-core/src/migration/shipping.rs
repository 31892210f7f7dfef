//! Upgrade steps of the shipping component.
//!
//! Declares the product, address and rate attributes the shipping module
//! relies on, the product attribute groups they are shown in, and the
//! version history that installs them.

use super::context::UpgradeContext;
use super::error::MigrationError;
use super::installer::AttributeInstaller;
use super::reconciler::{GroupPlan, GroupReconciler};
use super::sequencer::{UpgradeSequencer, UpgradeStep};
use crate::catalog::{
    AttributeFlags, AttributeSpec, AttributeStore, AttributeUpdate, InputWidget, ValueType,
};

/// Component name under which the installed version is tracked.
pub const COMPONENT: &str = "shipping";
/// Version reached once every step has run.
pub const CODE_VERSION: &str = "1.1.21";

/// Catalog product entity type.
pub const PRODUCT: &str = "catalog_product";
/// Quote address entity type.
pub const QUOTE_ADDRESS: &str = "quote_address";
/// Quote address shipping rate entity type.
pub const QUOTE_ADDRESS_RATE: &str = "quote_address_rate";
/// Sales order entity type.
pub const ORDER: &str = "order";
/// Customer address entity type.
pub const CUSTOMER_ADDRESS: &str = "customer_address";

/// Config key recording the hosting platform version.
pub const PLATFORM_VERSION_KEY: &str = "carriers/shipper/platform_version";

/// Admin form in which address attributes are editable.
pub const ADDRESS_FORM: &str = "admin_customer_address";

/// Group holding the dimensional packing attributes.
pub const DIMENSIONAL_GROUP: &str = "Dimensional Shipping";
/// Group holding the freight attributes.
pub const FREIGHT_GROUP: &str = "Freight Shipping";
/// Group holding general shipping attributes.
pub const SHIPPING_GROUP: &str = "Shipping";

/// Legacy name of [`DIMENSIONAL_GROUP`] left behind by catalog imports.
pub const LEGACY_DIMENSIONAL_GROUP: &str = "migration-dimensional-shipping";
/// Legacy name of [`FREIGHT_GROUP`] left behind by catalog imports.
pub const LEGACY_FREIGHT_GROUP: &str = "migration-freight-shipping";

fn product(code: &str, value_type: ValueType, widget: InputWidget, label: &str) -> AttributeSpec {
    AttributeSpec::new(code, value_type, widget).with_label(label)
}

fn price(code: &str, label: &str) -> AttributeSpec {
    product(code, ValueType::Decimal, InputWidget::Price, label).with_backend("price")
}

fn dimension(code: &str, label: &str) -> AttributeSpec {
    product(code, ValueType::Decimal, InputWidget::Text, label)
}

fn boxes(code: &str, label: &str) -> AttributeSpec {
    product(code, ValueType::Text, InputWidget::Multiselect, label).with_backend("array")
}

fn hidden_text(code: &str, note: &str) -> AttributeSpec {
    AttributeSpec::new(code, ValueType::Text, InputWidget::Text)
        .with_flags(AttributeFlags::hidden())
        .with_note(note)
}

fn hidden_date(code: &str, note: &str) -> AttributeSpec {
    AttributeSpec::new(code, ValueType::Date, InputWidget::Date)
        .with_flags(AttributeFlags::hidden())
        .with_note(note)
}

/// Product attributes installed by the first release.
pub fn base_product_attributes() -> Vec<AttributeSpec> {
    vec![
        price("shipperhq_shipping_fee", "Shipping Fee"),
        price("shipperhq_handling_fee", "Handling Fee"),
        product(
            "shipperhq_volume_weight",
            ValueType::Varchar,
            InputWidget::Text,
            "Volume Weight",
        )
        .with_note("This value is only used in conjunction with shipping filters"),
        price("shipperhq_declared_value", "Declared Value")
            .with_note("The deemed cost of this product for customs & insurance purposes"),
        product("ship_separately", ValueType::Int, InputWidget::Boolean, "Ship Separately"),
        product(
            "shipperhq_dim_group",
            ValueType::Int,
            InputWidget::Select,
            "Dimensional Rule Group",
        )
        .with_backend("array"),
        dimension("ship_length", "Dimension Length"),
        dimension("ship_width", "Dimension Width"),
        dimension("ship_height", "Dimension Height"),
        boxes("shipperhq_poss_boxes", "Possible Packing Boxes"),
        product(
            "shipperhq_malleable_product",
            ValueType::Int,
            InputWidget::Boolean,
            "Malleable Product",
        )
        .with_note("Ignore if unsure. Indicates the product dimensions can be adjusted to fit box"),
        boxes("shipperhq_master_boxes", "Master Packing Boxes"),
    ]
}

/// Availability date attribute.
pub fn availability_date() -> AttributeSpec {
    product(
        "shipperhq_availability_date",
        ValueType::Datetime,
        InputWidget::Date,
        "Availability Date",
    )
    .with_backend("datetime")
}

/// Freight product attributes.
pub fn freight_attributes() -> Vec<AttributeSpec> {
    vec![
        product("freight_class", ValueType::Int, InputWidget::Select, "Freight Class")
            .with_source("freight_class"),
        product("shipperhq_nmfc_class", ValueType::Text, InputWidget::Text, "NMFC"),
        product("must_ship_freight", ValueType::Int, InputWidget::Boolean, "Must Ship Freight")
            .with_note("Can be overridden per carrier"),
        product("shipperhq_nmfc_sub", ValueType::Text, InputWidget::Text, "NMFC Sub")
            .with_note("Only required to support ABF Freight"),
    ]
}

/// Cross-border product attributes.
pub fn cross_border_attributes() -> Vec<AttributeSpec> {
    vec![product("shipperhq_hs_code", ValueType::Text, InputWidget::Text, "HS Code")]
}

/// Layout of the dimensional shipping group.
pub fn dimensional_plan() -> GroupPlan {
    GroupPlan::new(DIMENSIONAL_GROUP, 100)
        .member("ship_separately", 2)
        .member("shipperhq_dim_group", 1)
        .member("ship_length", 10)
        .member("ship_width", 11)
        .member("ship_height", 12)
        .member("shipperhq_poss_boxes", 20)
        .replacing(LEGACY_DIMENSIONAL_GROUP)
}

/// Layout of the freight shipping group.
pub fn freight_plan() -> GroupPlan {
    GroupPlan::new(FREIGHT_GROUP, 101)
        .member("freight_class", 1)
        .member("must_ship_freight", 10)
        .replacing(LEGACY_FREIGHT_GROUP)
}

/// Layout of the general shipping group.
pub fn cross_border_plan() -> GroupPlan {
    GroupPlan::new(SHIPPING_GROUP, 99).member("shipperhq_hs_code", 25)
}

/// Install the base product attributes and the dimensional group.
pub fn install_attributes(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    AttributeInstaller::ensure_attributes(ctx.attributes, PRODUCT, &base_product_attributes())?;
    GroupReconciler::reconcile(ctx.attributes, PRODUCT, &dimensional_plan())?;
    Ok(())
}

/// Install the availability date attribute.
pub fn install_availability_date(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    AttributeInstaller::ensure_attribute(ctx.attributes, PRODUCT, &availability_date())?;
    Ok(())
}

/// Install address type and validation status on quotes, orders and
/// customer addresses.
pub fn install_address_attributes(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    let destination_type = hidden_text("destination_type", "Address Type");
    let validation_status = hidden_text("validation_status", "Address Validation Status");

    for entity_type in [QUOTE_ADDRESS, ORDER] {
        AttributeInstaller::ensure_attribute(ctx.attributes, entity_type, &destination_type)?;
        AttributeInstaller::ensure_attribute(ctx.attributes, entity_type, &validation_status)?;
    }

    let customer_attributes = [
        AttributeSpec::new("destination_type", ValueType::Text, InputWidget::Select)
            .with_label("Address Type")
            .with_source("address_type")
            .with_position(100)
            .with_note("Address Type"),
        AttributeSpec::new("validation_status", ValueType::Text, InputWidget::Text)
            .with_label("Address Validation")
            .with_position(101)
            .with_note("Address Validation Status"),
    ];
    AttributeInstaller::ensure_attributes(ctx.attributes, CUSTOMER_ADDRESS, &customer_attributes)?;

    let in_form = AttributeUpdate::new().used_in_forms([ADDRESS_FORM]);
    for spec in &customer_attributes {
        AttributeInstaller::update_attribute(ctx.attributes, CUSTOMER_ADDRESS, &spec.code, &in_form)?;
    }
    Ok(())
}

/// Force probe: the customer address type attribute is missing.
pub fn destination_type_missing(store: &dyn AttributeStore) -> Result<bool, MigrationError> {
    Ok(store.get_attribute(CUSTOMER_ADDRESS, "destination_type")?.is_none())
}

/// Install dispatch and delivery dates on quote rates.
pub fn install_rate_dates(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    let dates = [
        hidden_date("shq_dispatch_date", "Dispatch Date"),
        hidden_date("shq_delivery_date", "Delivery Date"),
    ];
    AttributeInstaller::ensure_attributes(ctx.attributes, QUOTE_ADDRESS_RATE, &dates)?;
    Ok(())
}

/// Install the freight attributes and the freight group.
pub fn install_freight_attributes(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    AttributeInstaller::ensure_attributes(ctx.attributes, PRODUCT, &freight_attributes())?;
    GroupReconciler::reconcile(ctx.attributes, PRODUCT, &freight_plan())?;
    Ok(())
}

/// Turn the customer address type into a select backed by its source.
pub fn address_type_as_select(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    let update = AttributeUpdate::new()
        .source_model("address_type")
        .input_widget(InputWidget::Select);
    AttributeInstaller::update_attribute(ctx.attributes, CUSTOMER_ADDRESS, "destination_type", &update)?;
    Ok(())
}

/// Refresh the must-ship-freight help text.
pub fn update_freight_note(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    let update = AttributeUpdate::new().note("Can be overridden per carrier in the rate engine");
    AttributeInstaller::update_attribute(ctx.attributes, PRODUCT, "must_ship_freight", &update)?;
    Ok(())
}

/// Record the platform version the module was installed on.
pub fn record_platform_version(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    ctx.config.save(PLATFORM_VERSION_KEY, ctx.platform_version)?;
    Ok(())
}

/// Install the cross-border attributes into the shipping group.
pub fn install_cross_border_attributes(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
    AttributeInstaller::ensure_attributes(ctx.attributes, PRODUCT, &cross_border_attributes())?;
    GroupReconciler::reconcile(ctx.attributes, PRODUCT, &cross_border_plan())?;
    Ok(())
}

/// The full upgrade history of the shipping component.
pub fn sequencer() -> Result<UpgradeSequencer, MigrationError> {
    UpgradeSequencer::new(COMPONENT, CODE_VERSION)?
        .with_step(UpgradeStep::new("1.0.1", "install product attributes", install_attributes)?)?
        .with_step(UpgradeStep::new(
            "1.0.3",
            "install availability date",
            install_availability_date,
        )?)?
        .with_step(
            UpgradeStep::new("1.0.5", "install address attributes", install_address_attributes)?
                .force_when(destination_type_missing),
        )?
        .with_step(UpgradeStep::new("1.0.7", "install rate dates", install_rate_dates)?)?
        .with_step(UpgradeStep::new(
            "1.0.12",
            "install freight attributes",
            install_freight_attributes,
        )?)?
        .with_step(UpgradeStep::new(
            "1.0.16",
            "address type as select",
            address_type_as_select,
        )?)?
        .with_step(UpgradeStep::new("1.1.17", "update freight note", update_freight_note)?)?
        .with_step(UpgradeStep::new(
            "1.1.19",
            "record platform version",
            record_platform_version,
        )?)?
        .with_step(UpgradeStep::new(
            "1.1.21",
            "install cross-border attributes",
            install_cross_border_attributes,
        )?)
}
