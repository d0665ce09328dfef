use std::fmt;

use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use serde_json::Value;

use crate::domain::{lenient_string, string_or_empty, DeviceId, DeviceRecord, LogLevel};

/// Events pushed by the hub over the realtime channel.
///
/// Frames look like `{"event": "log", "data": {...}}`. The hub historically
/// used Spanish event and field names, which are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Log(LogPayload),
    #[serde(alias = "dispositivos_actualizados")]
    DevicesUpdated(DevicesPayload),
    #[serde(alias = "respuesta_recibida")]
    AnswerReceived(AnswerPayload),
    Countdown(CountdownPayload),
    #[serde(alias = "pregunta_nueva")]
    NewQuestion(QuestionPayload),
    #[serde(alias = "config_cargada")]
    ConfigLoaded(ConfigLoadedPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::DevicesUpdated(_) => "devices_updated",
            Self::AnswerReceived(_) => "answer_received",
            Self::Countdown(_) => "countdown",
            Self::NewQuestion(_) => "new_question",
            Self::ConfigLoaded(_) => "config_loaded",
        }
    }
}

pub fn decode_server_frame(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Events emitted by the dashboard towards the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEmit {
    FinalizeVote,
    UpdateName { device_id: DeviceId, name: String },
}

impl ClientEmit {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FinalizeVote => "finalize_vote",
            Self::UpdateName { .. } => "update_name",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogPayload {
    #[serde(default, alias = "nivel")]
    pub level: LogLevel,
    #[serde(default, alias = "message", deserialize_with = "string_or_empty")]
    pub msg: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevicesPayload {
    #[serde(default, alias = "dispositivos")]
    pub devices: Roster,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerPayload {
    pub device_id: DeviceId,
    #[serde(
        default,
        rename = "nombre",
        alias = "name",
        deserialize_with = "string_or_empty"
    )]
    pub name: String,
    #[serde(
        default,
        rename = "respuesta",
        alias = "answer",
        deserialize_with = "lenient_string"
    )]
    pub answer: Option<String>,
    #[serde(
        default,
        rename = "grupo",
        alias = "group",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<String>,
    #[serde(
        default,
        alias = "rol",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownPayload {
    #[serde(default, alias = "segundos", deserialize_with = "lenient_seconds")]
    pub seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionPayload {
    #[serde(default, deserialize_with = "u32_or_zero")]
    pub index: u32,
    #[serde(
        default,
        rename = "type",
        alias = "tipo",
        deserialize_with = "string_or_empty"
    )]
    pub kind: String,
    #[serde(default, alias = "num_opciones", deserialize_with = "u32_or_zero")]
    pub num_options: u32,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfigLoadedPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pin: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub timeout: Option<u32>,
    #[serde(default, alias = "alumnos")]
    pub students: Option<Vec<DeviceRecord>>,
}

/// Full roster snapshot, in the order the hub sent it.
///
/// Accepts either an array of records or an object keyed by device id. In
/// the object form the key is authoritative. Records without an id are
/// dropped, and a repeated id keeps its first position with the last record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Roster(pub Vec<DeviceRecord>);

impl Roster {
    pub fn into_records(self) -> Vec<DeviceRecord> {
        self.0
    }

    fn push_unique(&mut self, record: DeviceRecord) {
        if record.id.is_empty() {
            return;
        }
        match self.0.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => self.0.push(record),
        }
    }
}

impl From<Vec<DeviceRecord>> for Roster {
    fn from(records: Vec<DeviceRecord>) -> Self {
        let mut roster = Roster::default();
        for record in records {
            roster.push_unique(record);
        }
        roster
    }
}

struct RosterVisitor;

impl<'de> Visitor<'de> for RosterVisitor {
    type Value = Roster;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of device records or a map keyed by device id")
    }

    fn visit_unit<E>(self) -> Result<Roster, E> {
        Ok(Roster::default())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Roster, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut roster = Roster::default();
        while let Some(record) = seq.next_element::<DeviceRecord>()? {
            roster.push_unique(record);
        }
        Ok(roster)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Roster, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut roster = Roster::default();
        while let Some((key, mut record)) = map.next_entry::<String, DeviceRecord>()? {
            record.id = DeviceId(key);
            roster.push_unique(record);
        }
        Ok(roster)
    }
}

impl<'de> Deserialize<'de> for Roster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RosterVisitor)
    }
}

// HTTP bodies.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentEntry {
    pub id: DeviceId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveAllRequest {
    pub url: String,
    pub pin: String,
    pub timeout: u32,
    pub filename: String,
    pub students: Vec<StudentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadConfigRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SaveResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "archivo")]
    pub file: Option<String>,
    #[serde(default, alias = "alumnos_guardados")]
    pub students_saved: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoadConfigResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "archivo")]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pin: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub timeout: Option<u32>,
    #[serde(default, alias = "alumnos_cargados")]
    pub students_loaded: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RemoteConfig {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pin: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub timeout: Option<u32>,
}

/// The hub sends timeouts as numbers or as CSV-sourced strings.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn u32_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u32(deserializer)?.unwrap_or_default())
}

/// Countdown ticks arrive as integers, floats or strings; negatives clamp to zero.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v.ceil() as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|v| v.ceil() as i64)
            .unwrap_or_default(),
        _ => 0,
    };
    Ok(seconds.max(0))
}
