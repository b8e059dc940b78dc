//! Static building-use taxonomy.
//!
//! Maps a `building` tag value to an occupancy density: square feet of floor
//! area per resident for residential uses, or per job for workplaces. The two
//! tables are mutually exclusive; a tag appears in at most one of them.

/// Square feet of floor area per resident for a residential building tag.
pub(crate) fn sqft_per_resident(tag: &str) -> Option<f64> {
    match tag {
        "yes" => Some(600.0),
        "apartments" => Some(240.0),
        "barracks" => Some(100.0),
        "bungalow" => Some(600.0),
        "cabin" => Some(600.0),
        "detached" => Some(600.0),
        "annexe" => Some(240.0),
        "dormitory" => Some(125.0),
        "farm" => Some(600.0),
        "ger" => Some(240.0),
        "hotel" => Some(240.0),
        "house" => Some(600.0),
        "houseboat" => Some(600.0),
        "residential" => Some(600.0),
        "semidetached_house" => Some(400.0),
        "static_caravan" => Some(500.0),
        "stilt_house" => Some(600.0),
        "terrace" => Some(500.0),
        "tree_house" => Some(240.0),
        "trullo" => Some(240.0),
        _ => None,
    }
}

/// Square feet of floor area per job for a workplace building tag.
pub(crate) fn sqft_per_job(tag: &str) -> Option<f64> {
    match tag {
        "commercial" => Some(150.0),
        "industrial" => Some(500.0),
        "kiosk" => Some(50.0),
        "office" => Some(150.0),
        "retail" => Some(300.0),
        "supermarket" => Some(300.0),
        "warehouse" => Some(500.0),
        "religious" => Some(100.0),
        "cathedral" => Some(100.0),
        "chapel" => Some(100.0),
        "church" => Some(100.0),
        "kingdom_hall" => Some(100.0),
        "monastery" => Some(100.0),
        "mosque" => Some(100.0),
        "presbytery" => Some(100.0),
        "shrine" => Some(100.0),
        "synagogue" => Some(100.0),
        "temple" => Some(100.0),
        "bakehouse" => Some(300.0),
        "college" => Some(250.0),
        "fire_station" => Some(500.0),
        "government" => Some(150.0),
        "gatehouse" => Some(150.0),
        "hospital" => Some(150.0),
        "kindergarten" => Some(100.0),
        "museum" => Some(300.0),
        "public" => Some(300.0),
        "school" => Some(100.0),
        "train_station" => Some(1000.0),
        "transportation" => Some(1000.0),
        "university" => Some(250.0),
        "grandstand" => Some(150.0),
        "pavilion" => Some(150.0),
        "riding_hall" => Some(150.0),
        "sports_hall" => Some(150.0),
        "sports_centre" => Some(150.0),
        "stadium" => Some(150.0),
        _ => None,
    }
}
