use anyhow::Result;
use log::info;
use serde_json::json;

use crate::api::routes::ServerState;
use crate::model::{Attribute, AttributeType, Behavior, Entity, Module};

/// Fill the reference server with a small demo scene.
pub fn load_seed_data(state: &ServerState) -> Result<()> {
    for module in demo_modules() {
        state.modules.insert(module)?;
    }
    for entity in demo_entities() {
        state.entities.insert(entity)?;
    }
    for behavior in demo_behaviors() {
        state.behaviors.insert(behavior)?;
    }

    state.modules.clear_calls();
    state.entities.clear_calls();
    state.behaviors.clear_calls();

    info!(
        "Seeded {} modules, {} entities and {} behaviors",
        state.modules.len(),
        state.entities.len(),
        state.behaviors.len()
    );
    Ok(())
}

pub fn demo_modules() -> Vec<Module> {
    vec![
        Module::new("transform", "Transform")
            .with_attribute(Attribute::new("position", AttributeType::Vec3).with_default(json!([0.0, 0.0, 0.0])))
            .with_attribute(Attribute::new("rotation", AttributeType::Vec4).with_default(json!([0.0, 0.0, 0.0, 1.0])))
            .with_attribute(Attribute::new("scale", AttributeType::Vec3).with_default(json!([1.0, 1.0, 1.0]))),
        Module::new("physics", "Physics")
            .with_attribute(
                Attribute::new("mass", AttributeType::Float)
                    .with_default(json!(1.0))
                    .with_description("Kilograms"),
            )
            .with_attribute(Attribute::new("velocity", AttributeType::Vec3))
            .with_requires(["transform"]),
        Module::new("render", "Render")
            .with_attribute(Attribute::new("mesh", AttributeType::String))
            .with_attribute(Attribute::new("tint", AttributeType::Color).with_default(json!("#ffffff")))
            .with_requires(["transform"]),
    ]
}

pub fn demo_entities() -> Vec<Entity> {
    vec![
        Entity::new("vehicle", "Vehicle")
            .with_attribute(
                Attribute::new("max_speed", AttributeType::Float)
                    .with_default(json!(30.0))
                    .with_description("Metres per second"),
            )
            .with_modules(["transform", "physics", "render"]),
        Entity::new("slope", "Slope")
            .with_attribute(Attribute::new("angle", AttributeType::Float).with_default(json!(15.0)))
            .with_modules(["transform", "render"]),
    ]
}

pub fn demo_behaviors() -> Vec<Behavior> {
    vec![
        Behavior::new("drive", "Drive")
            .with_parameter(Attribute::new("acceleration", AttributeType::Float).with_default(json!(2.5)))
            .with_modules(["physics"]),
        Behavior::new("slide", "Slide")
            .with_parameter(Attribute::new("friction", AttributeType::Float).with_default(json!(0.3)))
            .with_modules(["physics", "transform"]),
    ]
}
