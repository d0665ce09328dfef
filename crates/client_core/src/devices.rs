//! Table projection of the roster and the inline rename flow.

use shared::{
    domain::{DeviceId, DeviceRecord, DeviceStatus},
    protocol::ClientEmit,
};

use crate::store::DashboardState;

pub const EMPTY_ROSTER_PLACEHOLDER: &str = "No devices registered";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Online,
    Registered,
    Disconnected,
    Offline,
}

impl StatusCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Online => "🟢 Online",
            Self::Registered => "🟡 Registered",
            Self::Disconnected => "🔴 Disconnected",
            Self::Offline => "⚪ Offline",
        }
    }
}

impl From<DeviceStatus> for StatusCategory {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Online => Self::Online,
            DeviceStatus::Registered => Self::Registered,
            DeviceStatus::Disconnected => Self::Disconnected,
            DeviceStatus::Offline => Self::Offline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub device_id: DeviceId,
    /// Current value of the editable name input; empty is valid.
    pub name_input: String,
    pub status: StatusCategory,
    pub group: Option<String>,
    pub role: Option<String>,
    pub activity: Option<String>,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            device_id: record.id.clone(),
            name_input: record.name.clone(),
            status: record.status.into(),
            group: record.group.clone(),
            role: record.role.clone(),
            activity: record.activity.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RosterStats {
    pub total: usize,
    pub online: usize,
}

impl RosterStats {
    pub fn summary(&self) -> String {
        format!(
            "Total: {} students / {} connected",
            self.total, self.online
        )
    }
}

/// Rows in the order the hub sent the roster.
pub fn project_rows(devices: &[DeviceRecord]) -> Vec<DeviceRow> {
    devices.iter().map(DeviceRow::from).collect()
}

pub fn roster_stats(devices: &[DeviceRecord]) -> RosterStats {
    RosterStats {
        total: devices.len(),
        online: devices
            .iter()
            .filter(|device| device.status == DeviceStatus::Online)
            .count(),
    }
}

/// Commits an edited name: updates the store optimistically and returns the
/// notification for the hub. Blank input, an unchanged name and unknown
/// devices produce nothing.
pub fn commit_name_edit(
    state: &mut DashboardState,
    device_id: &DeviceId,
    raw_input: &str,
) -> Option<ClientEmit> {
    let name = raw_input.trim();
    if name.is_empty() {
        return None;
    }
    if state.device(device_id).is_some_and(|device| device.name == name) {
        return None;
    }
    if !state.update_device_name(device_id, name) {
        return None;
    }
    Some(ClientEmit::UpdateName {
        device_id: device_id.clone(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::{DevicesPayload, ServerEvent};

    #[test]
    fn blank_name_from_hub_renders_online_row() {
        let payload: DevicesPayload =
            serde_json::from_str(r#"{"devices":{"id1":{"nombre":"","estado":"online"}}}"#)
                .expect("payload");
        let mut state = DashboardState::new();
        state.apply_server_event(ServerEvent::DevicesUpdated(payload));

        let rows = project_rows(state.devices());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_id.as_str(), "id1");
        assert_eq!(rows[0].name_input, "");
        assert_eq!(rows[0].status.label(), "🟢 Online");
    }

    #[test]
    fn rows_follow_roster_order_not_sorted() {
        let devices = vec![
            DeviceRecord::new("zz", "Zoe", DeviceStatus::Registered),
            DeviceRecord::new("aa", "Al", DeviceStatus::Disconnected),
        ];
        let rows = project_rows(&devices);
        let ids: Vec<_> = rows.iter().map(|row| row.device_id.as_str()).collect();
        assert_eq!(ids, vec!["zz", "aa"]);
        assert_eq!(rows[1].status, StatusCategory::Disconnected);
    }

    #[test]
    fn stats_count_only_online_devices() {
        let devices = vec![
            DeviceRecord::new("a", "", DeviceStatus::Online),
            DeviceRecord::new("b", "", DeviceStatus::Registered),
            DeviceRecord::new("c", "", DeviceStatus::Online),
        ];
        assert_eq!(
            roster_stats(&devices).summary(),
            "Total: 3 students / 2 connected"
        );
    }

    #[test]
    fn committing_trimmed_name_updates_store_and_emits() {
        let mut state = DashboardState::new();
        state.replace_devices(vec![DeviceRecord::new("a", "old", DeviceStatus::Online)]);

        let emit = commit_name_edit(&mut state, &DeviceId::from("a"), "  Ana  ");
        assert_eq!(
            emit,
            Some(ClientEmit::UpdateName {
                device_id: DeviceId::from("a"),
                name: "Ana".into(),
            })
        );
        assert_eq!(state.devices()[0].name, "Ana");
    }

    #[test]
    fn blank_edit_keeps_previous_name() {
        let mut state = DashboardState::new();
        state.replace_devices(vec![DeviceRecord::new("a", "old", DeviceStatus::Online)]);
        let revision = state.revision();
        let id = DeviceId::from("a");

        assert_eq!(commit_name_edit(&mut state, &id, "   "), None);
        assert_eq!(state.devices()[0].name, "old");
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn unchanged_name_is_not_sent_again() {
        let mut state = DashboardState::new();
        state.replace_devices(vec![DeviceRecord::new("a", "Ana", DeviceStatus::Online)]);
        let revision = state.revision();
        let id = DeviceId::from("a");

        assert_eq!(commit_name_edit(&mut state, &id, " Ana "), None);
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn edit_for_vanished_device_is_dropped() {
        let mut state = DashboardState::new();
        state.replace_devices(vec![DeviceRecord::new("a", "old", DeviceStatus::Online)]);
        let vanished = DeviceId::from("b");
        assert_eq!(commit_name_edit(&mut state, &vanished, "Bea"), None);
    }
}
