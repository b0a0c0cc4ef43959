use crate::utils::error::LoadError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "Outbound",
            Direction::Inbound => "Inbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an open-schema table. Field order follows the source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// 將欄位值轉成顯示用字串：字串不加引號，null 為空白，巢狀結構輸出精簡 JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Records that may be present for either direction of the trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByDirection {
    outbound: Vec<Record>,
    inbound: Vec<Record>,
}

impl ByDirection {
    pub fn new(outbound: Vec<Record>, inbound: Vec<Record>) -> Self {
        Self { outbound, inbound }
    }

    pub fn get(&self, direction: Direction) -> &[Record] {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    /// Anything other than an object keyed by direction degrades to empty.
    /// Keys outside {Outbound, Inbound} are ignored.
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self {
                outbound: records_from_value(map.get(Direction::Outbound.as_str())),
                inbound: records_from_value(map.get(Direction::Inbound.as_str())),
            },
            Some(Value::Null) | None => Self::default(),
            Some(other) => {
                tracing::debug!("Ignoring direction map of unexpected type: {}", type_name(other));
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassengerPenalty {
    pub passenger_type: String,
    pub penalties_by_direction: ByDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    pub itinerary_id: String,
    pub segments: ByDirection,
    pub baggage: ByDirection,
    pub segment_details: ByDirection,
    pub fare_info: Vec<Record>,
    pub taxes: Vec<Record>,
    pub penalties: Vec<PassengerPenalty>,
}

impl Itinerary {
    /// Display label used by selection lists.
    pub fn label(&self) -> String {
        format!("Itinerary {}", self.itinerary_id)
    }

    /// `"{first origin} → {last destination}"` over the outbound segments.
    pub fn route(&self) -> Option<String> {
        let segments = self.segments.get(Direction::Outbound);
        let origin = segments.first()?.get("origin")?;
        let destination = segments.last()?.get("destination")?;
        Some(format!(
            "{} → {}",
            display_value(origin),
            display_value(destination)
        ))
    }

    pub fn departure_date(&self) -> Option<String> {
        self.segments
            .get(Direction::Outbound)
            .first()?
            .get("departureDate")
            .map(display_value)
    }

    pub fn passenger_types(&self) -> impl Iterator<Item = &str> {
        self.penalties.iter().map(|p| p.passenger_type.as_str())
    }

    /// Build an itinerary from one element of the source array.
    ///
    /// Only the identifier is mandatory; every sub-collection that is missing
    /// or of the wrong shape becomes empty.
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        let obj = value.as_object().ok_or_else(|| {
            LoadError::malformed(format!(
                "expected itinerary object, found {}",
                type_name(value)
            ))
        })?;

        let itinerary_id = match obj.get("itineraryId") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(LoadError::malformed(format!(
                    "itineraryId must be a string or number, found {}",
                    type_name(other)
                )))
            }
            None => return Err(LoadError::malformed("itinerary without itineraryId")),
        };

        let penalties = match obj.get("penalties") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_object)
                .map(|entry| PassengerPenalty {
                    passenger_type: entry
                        .get("passengerType")
                        .map(display_value)
                        .unwrap_or_default(),
                    penalties_by_direction: ByDirection::from_value(
                        entry.get("penaltiesByDirection"),
                    ),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            itinerary_id,
            segments: ByDirection::from_value(obj.get("segments")),
            baggage: ByDirection::from_value(obj.get("baggage")),
            segment_details: ByDirection::from_value(obj.get("segmentDetails")),
            fare_info: records_from_value(obj.get("fareInfo")),
            taxes: records_from_value(obj.get("taxes")),
            penalties,
        })
    }
}

fn records_from_value(value: Option<&Value>) -> Vec<Record> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned().map(Record::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Distinct filterable values derived from a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub passenger_types: BTreeSet<String>,
    pub routes: BTreeSet<String>,
    pub departure_dates: BTreeSet<String>,
}

/// 篩選條件：欄位之間為 AND，同一欄位內為 OR，空集合代表不限制
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub passenger_types: BTreeSet<String>,
    #[serde(default)]
    pub routes: BTreeSet<String>,
    #[serde(default)]
    pub departure_dates: BTreeSet<String>,
}

impl FilterSelection {
    pub fn is_empty(&self) -> bool {
        self.passenger_types.is_empty() && self.routes.is_empty() && self.departure_dates.is_empty()
    }

    pub fn matches(&self, itinerary: &Itinerary) -> bool {
        let passengers_ok = self.passenger_types.is_empty()
            || itinerary
                .passenger_types()
                .any(|pt| self.passenger_types.contains(pt));

        let route_ok = self.routes.is_empty()
            || itinerary
                .route()
                .is_some_and(|route| self.routes.contains(&route));

        let date_ok = self.departure_dates.is_empty()
            || itinerary
                .departure_date()
                .is_some_and(|date| self.departure_dates.contains(&date));

        passengers_ok && route_ok && date_ok
    }
}

/// How name collisions in projected tables and spreadsheet sheets are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    /// Later tables overwrite earlier ones with the same name.
    #[default]
    Lenient,
    /// Any collision is an export error.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn file_name(&self, itinerary_id: &str) -> String {
        let itinerary_id = file_safe_id(itinerary_id);
        match self {
            ExportFormat::Xlsx => format!("itinerary_{}_details.xlsx", itinerary_id),
            ExportFormat::Pdf => format!("itinerary_{}.pdf", itinerary_id),
            ExportFormat::Csv => format!("itinerary_{}_tables.zip", itinerary_id),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Csv => "application/zip",
        }
    }
}

/// 行程編號來自輸入檔，做為檔名前需移除路徑分隔符號與 `..`
fn file_safe_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    cleaned.replace("..", "__")
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}
