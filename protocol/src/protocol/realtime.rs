use serde::Deserialize;
use serde_json::{Value, json};

use super::facility::{CareType, MapFilters};

pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_UPDATE: &str = "session.update";
pub const FUNCTION_CALL_ARGUMENTS_DONE: &str = "response.function_call_arguments.done";

/// Name of the tool the realtime model calls to change the facility map.
pub const UPDATE_MAP_FILTERS: &str = "update_map_filters";

/// `type` field of a realtime JSON frame, if the frame is a JSON object.
pub fn event_type(raw: &str) -> Option<String> {
  let value: Value = serde_json::from_str(raw).ok()?;
  value.get("type")?.as_str().map(str::to_string)
}

pub fn is_session_created(raw: &str) -> bool {
  event_type(raw).as_deref() == Some(SESSION_CREATED)
}

/// JSON schema of the `update_map_filters` function tool.
pub fn update_map_filters_tool() -> Value {
  let care_types: Vec<&str> = CareType::ALL.iter().map(CareType::as_str).collect();
  json!({
    "type": "function",
    "name": UPDATE_MAP_FILTERS,
    "description": "Update the senior care facility map filters based on what the user is looking for.",
    "parameters": {
      "type": "object",
      "properties": {
        "location": {
          "type": "string",
          "description": "City, state or area to search around"
        },
        "care_types": {
          "type": "array",
          "items": { "type": "string", "enum": care_types },
          "description": "Kinds of care the facility must offer"
        },
        "max_price": {
          "type": "integer",
          "description": "Maximum monthly price in USD"
        },
        "min_rating": {
          "type": "number",
          "description": "Minimum average rating from 1 to 5"
        },
        "amenities": {
          "type": "array",
          "items": { "type": "string" },
          "description": "Amenities the facility must have"
        },
        "radius_miles": {
          "type": "number",
          "description": "Search radius around the location in miles"
        }
      }
    }
  })
}

/// The configuration frame injected after `session.created`.
pub fn session_update(instructions: &str) -> Value {
  json!({
    "type": SESSION_UPDATE,
    "session": {
      "instructions": instructions,
      "tools": [update_map_filters_tool()],
      "tool_choice": "auto"
    }
  })
}

/// A completed function call observed on the realtime stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionCallDone {
  pub call_id: String,
  #[serde(default)]
  pub name: Option<String>,
  pub arguments: String,
}

impl FunctionCallDone {
  pub fn parse(raw: &str) -> Option<Self> {
    let value: Value = serde_json::from_str(raw).ok()?;
    if value.get("type")?.as_str()? != FUNCTION_CALL_ARGUMENTS_DONE {
      return None;
    }
    serde_json::from_value(value).ok()
  }

  /// Filters carried by an `update_map_filters` call, if this is one.
  pub fn map_filters(&self) -> Option<MapFilters> {
    if self.name.as_deref() != Some(UPDATE_MAP_FILTERS) {
      return None;
    }
    MapFilters::from_arguments(&self.arguments).ok()
  }
}
