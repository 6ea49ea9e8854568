//! Static, read-only plant knowledge table (C1). Deterministic and
//! offline — no environmental data store needed, see §4.1 rationale.

use crate::models::PlantProfile;
use std::collections::HashMap;
use std::sync::OnceLock;

const DEFAULT_KEY: &str = "default";

fn table() -> &'static HashMap<&'static str, PlantProfile> {
    static TABLE: OnceLock<HashMap<&'static str, PlantProfile>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            (
                DEFAULT_KEY,
                PlantProfile {
                    min: 40.0,
                    ideal: 60.0,
                    max: 80.0,
                },
            ),
            (
                "tomato",
                PlantProfile {
                    min: 50.0,
                    ideal: 70.0,
                    max: 85.0,
                },
            ),
            (
                "lettuce",
                PlantProfile {
                    min: 60.0,
                    ideal: 75.0,
                    max: 90.0,
                },
            ),
            (
                "pepper",
                PlantProfile {
                    min: 45.0,
                    ideal: 65.0,
                    max: 80.0,
                },
            ),
            (
                "basil",
                PlantProfile {
                    min: 40.0,
                    ideal: 60.0,
                    max: 75.0,
                },
            ),
            (
                "strawberry",
                PlantProfile {
                    min: 55.0,
                    ideal: 70.0,
                    max: 85.0,
                },
            ),
            (
                "cucumber",
                PlantProfile {
                    min: 60.0,
                    ideal: 75.0,
                    max: 90.0,
                },
            ),
            (
                "herbs",
                PlantProfile {
                    min: 35.0,
                    ideal: 55.0,
                    max: 70.0,
                },
            ),
        ])
    })
}

/// Case-insensitive lookup, falling back to `default` on miss.
pub fn profile(plant_type: &str) -> PlantProfile {
    let key = plant_type.trim().to_lowercase();
    table()
        .get(key.as_str())
        .copied()
        .unwrap_or_else(|| table()[DEFAULT_KEY])
}

/// Every `(tag, profile)` pair in the table, for the `listPlants` Lifecycle
/// operation.
pub fn all_profiles() -> Vec<(String, PlantProfile)> {
    table()
        .iter()
        .map(|(tag, profile)| (tag.to_string(), *profile))
        .collect()
}

/// Target moisture for `plant_type` at `hour_of_day` (0-23) and
/// `air_temp_c`, per the §4.1 algorithm: start from `ideal`, apply a night
/// penalty, apply a temperature adjustment, clamp into `[min, max]`.
pub fn target_moisture(plant_type: &str, hour_of_day: u32, air_temp_c: f64) -> f64 {
    let profile = profile(plant_type);

    let time_factor = if (6..=18).contains(&hour_of_day) {
        1.0
    } else {
        0.9
    };

    let temp_factor = if air_temp_c > 30.0 {
        1.1
    } else if air_temp_c < 20.0 {
        0.9
    } else {
        1.0
    };

    let target = profile.ideal * time_factor * temp_factor;
    target.clamp(profile.min, profile.max)
}
