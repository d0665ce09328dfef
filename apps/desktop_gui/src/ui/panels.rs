//! Panel renderers. Each one projects from the store and reports what the
//! user did as [`PanelAction`]s; none of them mutate dashboard state.

use std::{collections::HashMap, path::PathBuf, time::Instant};

use client_core::{
    devices::{project_rows, roster_stats, StatusCategory, EMPTY_ROSTER_PLACEHOLDER},
    dispatcher::{ConfigForm, ValidationError},
    logs::LogReconciler,
    question::QuestionPanel,
    store::{Alert, ConnectBanner, ConnectionStatus, Severity},
    Command,
};
use eframe::egui;
use shared::domain::{DeviceId, DeviceRecord, LogLevel};

pub enum PanelAction {
    FormEdited(ConfigForm),
    Dispatch(Command),
    UploadConfig(PathBuf),
    Invalid(ValidationError),
    CommitName { device_id: DeviceId, input: String },
    RequestFinalize,
    ConfirmFinalize,
    CancelFinalize,
    HideQuestion,
    SetDebugVisible(bool),
    SearchChanged(String),
    ClearLogs,
    ExportLogs,
    PauseAutoScroll,
    DismissAlert,
}

fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Info => egui::Color32::from_rgb(120, 160, 220),
        Severity::Success => egui::Color32::from_rgb(90, 180, 110),
        Severity::Error => egui::Color32::from_rgb(220, 90, 90),
    }
}

fn level_color(level: LogLevel) -> egui::Color32 {
    match level {
        LogLevel::Debug => egui::Color32::GRAY,
        LogLevel::Info => egui::Color32::LIGHT_GRAY,
        LogLevel::Warning => egui::Color32::from_rgb(230, 180, 60),
        LogLevel::Error => egui::Color32::from_rgb(230, 90, 90),
    }
}

pub fn connection_badge(ui: &mut egui::Ui, status: ConnectionStatus) {
    let color = match status {
        ConnectionStatus::Connected => egui::Color32::from_rgb(90, 180, 110),
        ConnectionStatus::Disconnected => egui::Color32::from_rgb(220, 90, 90),
    };
    ui.colored_label(color, status.badge());
}

/// Command buttons are disabled while `backend_available` is false.
pub fn config_panel(
    ui: &mut egui::Ui,
    form: &ConfigForm,
    devices: &[DeviceRecord],
    banner: Option<&ConnectBanner>,
    backend_available: bool,
    actions: &mut Vec<PanelAction>,
) {
    let mut draft = form.clone();
    let mut edited = false;
    egui::Grid::new("config_form")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui| {
            ui.label("ClassQuiz URL");
            edited |= ui
                .add(
                    egui::TextEdit::singleline(&mut draft.url)
                        .hint_text("https://classquiz.example")
                        .desired_width(260.0),
                )
                .changed();
            ui.end_row();

            ui.label("Game PIN");
            let pin = egui::TextEdit::singleline(&mut draft.pin).desired_width(120.0);
            edited |= ui.add(pin).changed();
            ui.end_row();

            ui.label("Timeout (s)");
            edited |= ui
                .add(
                    egui::TextEdit::singleline(&mut draft.timeout)
                        .hint_text("5-300")
                        .desired_width(60.0),
                )
                .changed();
            ui.end_row();

            ui.label("File name");
            edited |= ui
                .add(
                    egui::TextEdit::singleline(&mut draft.filename)
                        .hint_text("without .csv")
                        .desired_width(180.0),
                )
                .changed();
            ui.end_row();
        });
    if edited {
        actions.push(PanelAction::FormEdited(draft.clone()));
    }

    ui.add_enabled_ui(backend_available, |ui| {
        ui.horizontal_wrapped(|ui| {
            if ui.button("🔍 Discover devices").clicked() {
                actions.push(PanelAction::Dispatch(Command::Discover));
            }
            if ui.button("🔗 Connect to ClassQuiz").clicked() {
                actions.push(match draft.connect_request() {
                    Ok(request) => PanelAction::Dispatch(Command::ConnectClassQuiz(request)),
                    Err(err) => PanelAction::Invalid(err),
                });
            }
            if ui.button("💾 Save all").clicked() {
                actions.push(match draft.save_request(devices) {
                    Ok(request) => PanelAction::Dispatch(Command::SaveAll(request)),
                    Err(err) => PanelAction::Invalid(err),
                });
            }
            if ui.button("📂 Load").clicked() {
                actions.push(match draft.load_request() {
                    Ok(source) => PanelAction::Dispatch(Command::LoadConfig(source)),
                    Err(err) => PanelAction::Invalid(err),
                });
            }
            if ui.button("📁 Load file...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    actions.push(PanelAction::UploadConfig(path));
                }
            }
        });
    });

    if let Some(banner) = banner {
        ui.colored_label(severity_color(banner.severity), &banner.text);
    }
}

/// `edits` holds in-progress name inputs; a row without an entry shows the
/// stored name.
pub fn device_table(
    ui: &mut egui::Ui,
    devices: &[DeviceRecord],
    edits: &mut HashMap<DeviceId, String>,
    actions: &mut Vec<PanelAction>,
) {
    ui.label(roster_stats(devices).summary());

    let rows = project_rows(devices);
    if rows.is_empty() {
        ui.weak(EMPTY_ROSTER_PLACEHOLDER);
        return;
    }

    egui::ScrollArea::vertical()
        .id_salt("device_table_scroll")
        .max_height(260.0)
        .show(ui, |ui| {
            egui::Grid::new("device_table")
                .num_columns(5)
                .striped(true)
                .show(ui, |ui| {
                    ui.strong("Device");
                    ui.strong("Name");
                    ui.strong("Status");
                    ui.strong("Group");
                    ui.strong("Activity");
                    ui.end_row();

                    for row in rows {
                        ui.monospace(row.device_id.as_str());
                        let buffer = edits
                            .entry(row.device_id.clone())
                            .or_insert_with(|| row.name_input.clone());
                        let response = ui.add(
                            egui::TextEdit::singleline(buffer)
                                .hint_text(row.device_id.short())
                                .desired_width(160.0),
                        );
                        if response.lost_focus() {
                            if buffer.trim() != row.name_input {
                                actions.push(PanelAction::CommitName {
                                    device_id: row.device_id.clone(),
                                    input: buffer.clone(),
                                });
                            }
                        } else if !response.has_focus() {
                            *buffer = row.name_input.clone();
                        }
                        status_badge(ui, row.status);
                        ui.label(row.group.as_deref().unwrap_or("-"));
                        ui.label(row.activity.as_deref().unwrap_or("-"));
                        ui.end_row();
                    }
                });
        });
}

fn status_badge(ui: &mut egui::Ui, status: StatusCategory) {
    let color = match status {
        StatusCategory::Online => egui::Color32::from_rgb(90, 180, 110),
        StatusCategory::Registered => egui::Color32::from_rgb(220, 190, 70),
        StatusCategory::Disconnected => egui::Color32::from_rgb(220, 90, 90),
        StatusCategory::Offline => egui::Color32::GRAY,
    };
    ui.colored_label(color, status.label());
}

pub fn question_panel(
    ui: &mut egui::Ui,
    panel: &QuestionPanel,
    confirming_finalize: bool,
    actions: &mut Vec<PanelAction>,
) {
    let Some(question) = panel.active() else {
        ui.weak("No active question");
        return;
    };

    ui.horizontal(|ui| {
        ui.heading(question.headline());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.heading(question.countdown_label());
        });
    });
    ui.label(format!(
        "Answered: {} / {}",
        question.answered_count(),
        question.rows().len()
    ));

    egui::Grid::new("answer_rows")
        .num_columns(3)
        .striped(true)
        .show(ui, |ui| {
            ui.strong("Student");
            ui.strong("Answer");
            ui.strong("Group");
            ui.end_row();
            for row in question.rows() {
                ui.label(&row.label);
                ui.label(row.answer.label());
                ui.label(row.group.as_deref().unwrap_or("-"));
                ui.end_row();
            }
        });

    ui.horizontal(|ui| {
        if confirming_finalize {
            ui.label("Finalize the vote now?");
            if ui.button("Yes, finalize").clicked() {
                actions.push(PanelAction::ConfirmFinalize);
            }
            if ui.button("Cancel").clicked() {
                actions.push(PanelAction::CancelFinalize);
            }
        } else {
            if ui.button("⏹ Finalize vote").clicked() {
                actions.push(PanelAction::RequestFinalize);
            }
            if ui.button("Hide").clicked() {
                actions.push(PanelAction::HideQuestion);
            }
        }
    });
}

pub fn log_panel(
    ui: &mut egui::Ui,
    logs: &LogReconciler,
    search: &mut String,
    now: Instant,
    actions: &mut Vec<PanelAction>,
) {
    ui.horizontal(|ui| {
        let mut debug_visible = logs.debug_visible();
        if ui.checkbox(&mut debug_visible, "Show DEBUG").changed() {
            actions.push(PanelAction::SetDebugVisible(debug_visible));
        }
        let response = ui.add(
            egui::TextEdit::singleline(search)
                .hint_text("Search logs")
                .desired_width(200.0),
        );
        if response.changed() {
            actions.push(PanelAction::SearchChanged(search.clone()));
        }
        if ui.button("🗑 Clear").clicked() {
            actions.push(PanelAction::ClearLogs);
        }
        if ui.button("💾 Export").clicked() {
            actions.push(PanelAction::ExportLogs);
        }
        ui.weak(format!("{} entries", logs.len()));
    });

    let output = egui::ScrollArea::vertical()
        .id_salt("log_scroll")
        .auto_shrink([false, false])
        .stick_to_bottom(logs.auto_scroll().is_active(now))
        .show(ui, |ui| {
            for entry in logs.visible_rows() {
                ui.colored_label(level_color(entry.level), entry.rendered_text());
            }
        });

    if ui.rect_contains_pointer(output.inner_rect) && ui.input(|i| i.pointer.any_pressed()) {
        actions.push(PanelAction::PauseAutoScroll);
    }
}

pub fn alert_window(ctx: &egui::Context, alert: Option<&Alert>, actions: &mut Vec<PanelAction>) {
    let Some(alert) = alert else {
        return;
    };
    egui::Window::new("Notice")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.colored_label(severity_color(alert.severity), &alert.message);
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                actions.push(PanelAction::DismissAlert);
            }
        });
}
