use crate::types::{Breakpoints, HumidityBand, ThresholdConfig};

/// Built-in cargo profile. A container's `threshold_overrides` are layered over the
/// profile named by its `selected_food_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodType {
    pub id: &'static str,
    pub display_name: &'static str,
    pub thresholds: ThresholdConfig,
    pub notes: &'static str,
}

pub const BUILTIN_FOOD_TYPES: &[FoodType] = &[
    FoodType {
        id: "bananas",
        display_name: "Bananas",
        thresholds: ThresholdConfig {
            temperature: Some(Breakpoints { warn: Some(13.0), critical: Some(20.0) }),
            humidity: Some(HumidityBand { warn_low: Some(50.0), warn_high: Some(95.0) }),
            mq4: None,
        },
        notes: "Example thresholds for bananas",
    },
    FoodType {
        id: "chicken",
        display_name: "Chicken (raw)",
        thresholds: ThresholdConfig {
            temperature: Some(Breakpoints { warn: Some(2.0), critical: Some(4.0) }),
            humidity: Some(HumidityBand { warn_low: Some(60.0), warn_high: Some(95.0) }),
            mq4: None,
        },
        notes: "Perishable meat",
    },
];

pub fn find_food_type(id: &str) -> Option<&'static FoodType> {
    let id = id.trim();
    BUILTIN_FOOD_TYPES
        .iter()
        .find(|f| f.id.eq_ignore_ascii_case(id))
}
