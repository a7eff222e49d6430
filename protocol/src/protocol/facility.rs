use serde::{Deserialize, Serialize};

/// Kind of care a facility offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareType {
  IndependentLiving,
  AssistedLiving,
  MemoryCare,
  NursingHome,
  HomeCare,
  RespiteCare,
}

impl CareType {
  pub const ALL: [CareType; 6] = [
    CareType::IndependentLiving,
    CareType::AssistedLiving,
    CareType::MemoryCare,
    CareType::NursingHome,
    CareType::HomeCare,
    CareType::RespiteCare,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      CareType::IndependentLiving => "independent_living",
      CareType::AssistedLiving => "assisted_living",
      CareType::MemoryCare => "memory_care",
      CareType::NursingHome => "nursing_home",
      CareType::HomeCare => "home_care",
      CareType::RespiteCare => "respite_care",
    }
  }
}

/// A facility as shown on the directory map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
  pub id: String,
  pub name: String,
  pub city: String,
  pub state: String,
  #[serde(default)]
  pub care_types: Vec<CareType>,
  /// Starting monthly price in USD.
  pub monthly_price: Option<u32>,
  pub rating: Option<f32>,
  #[serde(default)]
  pub amenities: Vec<String>,
  /// Distance from the searched location, when known.
  pub distance_miles: Option<f32>,
}

/// Arguments of the `update_map_filters` tool.
///
/// Every field is optional; an unset field does not constrain the results.
/// Facilities with missing data for a constrained field are kept, so a
/// filter never hides a listing just because it is incomplete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapFilters {
  pub location: Option<String>,
  pub care_types: Vec<CareType>,
  pub max_price: Option<u32>,
  pub min_rating: Option<f32>,
  pub amenities: Vec<String>,
  pub radius_miles: Option<f32>,
}

impl MapFilters {
  /// Parse the JSON arguments string of a function call.
  pub fn from_arguments(arguments: &str) -> serde_json::Result<Self> {
    serde_json::from_str(arguments)
  }

  pub fn is_empty(&self) -> bool {
    *self == MapFilters::default()
  }

  pub fn matches(&self, facility: &Facility) -> bool {
    if let Some(location) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
      let needle = location.to_lowercase();
      let place = format!("{}, {}", facility.city, facility.state).to_lowercase();
      if !place.contains(&needle) {
        return false;
      }
    }

    if !self.care_types.is_empty()
      && !self
        .care_types
        .iter()
        .any(|wanted| facility.care_types.contains(wanted))
    {
      return false;
    }

    if let (Some(max), Some(price)) = (self.max_price, facility.monthly_price) {
      if price > max {
        return false;
      }
    }

    if let (Some(min), Some(rating)) = (self.min_rating, facility.rating) {
      if rating < min {
        return false;
      }
    }

    if let (Some(radius), Some(distance)) = (self.radius_miles, facility.distance_miles) {
      if distance > radius {
        return false;
      }
    }

    self.amenities.iter().all(|wanted| {
      facility
        .amenities
        .iter()
        .any(|have| have.eq_ignore_ascii_case(wanted))
    })
  }
}

/// Facilities matching `filters`, in their original order.
pub fn filter_facilities<'a>(
  facilities: &'a [Facility],
  filters: &MapFilters,
) -> Vec<&'a Facility> {
  facilities.iter().filter(|f| filters.matches(f)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn facility(id: &str, city: &str, price: Option<u32>, rating: Option<f32>) -> Facility {
    Facility {
      id: id.to_string(),
      name: format!("Facility {id}"),
      city: city.to_string(),
      state: "OR".to_string(),
      care_types: vec![CareType::AssistedLiving],
      monthly_price: price,
      rating,
      amenities: vec!["Garden".to_string(), "Pet friendly".to_string()],
      distance_miles: Some(4.0),
    }
  }

  #[test]
  fn empty_filters_match_everything() {
    let filters = MapFilters::default();
    assert!(filters.is_empty());
    assert!(filters.matches(&facility("a", "Portland", None, None)));
  }

  #[test]
  fn parses_tool_arguments() {
    let filters = MapFilters::from_arguments(
      r#"{"location":"Portland","care_types":["memory_care"],"max_price":6000}"#,
    )
    .expect("parse arguments");
    assert_eq!(filters.location.as_deref(), Some("Portland"));
    assert_eq!(filters.care_types, vec![CareType::MemoryCare]);
    assert_eq!(filters.max_price, Some(6000));
    assert!(filters.amenities.is_empty());
  }

  #[test]
  fn location_is_case_insensitive_against_city_and_state() {
    let f = facility("a", "Portland", None, None);
    let by_city = MapFilters {
      location: Some("portland".to_string()),
      ..Default::default()
    };
    let by_state = MapFilters {
      location: Some("or".to_string()),
      ..Default::default()
    };
    let elsewhere = MapFilters {
      location: Some("Seattle".to_string()),
      ..Default::default()
    };
    assert!(by_city.matches(&f));
    assert!(by_state.matches(&f));
    assert!(!elsewhere.matches(&f));
  }

  #[test]
  fn price_and_rating_bounds_keep_incomplete_listings() {
    let facilities = vec![
      facility("cheap", "Salem", Some(3000), Some(4.5)),
      facility("pricey", "Salem", Some(9000), Some(4.8)),
      facility("unrated", "Salem", Some(2500), None),
      facility("low", "Salem", Some(2000), Some(2.0)),
    ];
    let filters = MapFilters {
      max_price: Some(5000),
      min_rating: Some(4.0),
      ..Default::default()
    };
    let ids: Vec<&str> = filter_facilities(&facilities, &filters)
      .into_iter()
      .map(|f| f.id.as_str())
      .collect();
    assert_eq!(ids, vec!["cheap", "unrated"]);
  }

  #[test]
  fn care_types_match_any_and_amenities_match_all() {
    let f = facility("a", "Bend", None, None);
    let any_care = MapFilters {
      care_types: vec![CareType::MemoryCare, CareType::AssistedLiving],
      ..Default::default()
    };
    let missing_care = MapFilters {
      care_types: vec![CareType::NursingHome],
      ..Default::default()
    };
    let amenities = MapFilters {
      amenities: vec!["garden".to_string(), "PET FRIENDLY".to_string()],
      ..Default::default()
    };
    let missing_amenity = MapFilters {
      amenities: vec!["garden".to_string(), "pool".to_string()],
      ..Default::default()
    };
    assert!(any_care.matches(&f));
    assert!(!missing_care.matches(&f));
    assert!(amenities.matches(&f));
    assert!(!missing_amenity.matches(&f));
  }

  #[test]
  fn radius_excludes_distant_facilities() {
    let f = facility("a", "Bend", None, None);
    let near = MapFilters {
      radius_miles: Some(5.0),
      ..Default::default()
    };
    let tight = MapFilters {
      radius_miles: Some(2.5),
      ..Default::default()
    };
    assert!(near.matches(&f));
    assert!(!tight.matches(&f));
  }
}
