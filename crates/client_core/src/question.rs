//! Active question panel: `Idle -> QuestionActive -> Idle`.

use shared::{
    domain::{DeviceId, DeviceRecord},
    protocol::{AnswerPayload, QuestionPayload},
};

/// Countdown seeded when a question arrives without a usable timeout.
pub const DEFAULT_QUESTION_TIMEOUT_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerState {
    Awaiting,
    Answered(String),
}

impl AnswerState {
    pub fn label(&self) -> &str {
        match self {
            Self::Awaiting => "Awaiting...",
            Self::Answered(answer) if answer.is_empty() => "(empty)",
            Self::Answered(answer) => answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRow {
    pub device_id: DeviceId,
    pub label: String,
    pub answer: AnswerState,
    pub group: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuestion {
    pub index: u32,
    pub kind: String,
    pub num_options: u32,
    pub timeout: Option<u32>,
    /// Last pushed countdown value; only the hub moves it.
    pub countdown: i64,
    rows: Vec<AnswerRow>,
}

impl ActiveQuestion {
    /// Seeds one awaiting row per known device, in roster order.
    pub fn start(question: QuestionPayload, roster: &[DeviceRecord]) -> Self {
        let rows = roster
            .iter()
            .map(|device| AnswerRow {
                device_id: device.id.clone(),
                label: device.display_label().to_string(),
                answer: AnswerState::Awaiting,
                group: device.group.clone(),
                role: device.role.clone(),
            })
            .collect();
        let countdown = match question.timeout {
            Some(timeout) if timeout > 0 => i64::from(timeout),
            _ => DEFAULT_QUESTION_TIMEOUT_SECS,
        };
        Self {
            index: question.index,
            kind: question.kind,
            num_options: question.num_options,
            timeout: question.timeout,
            countdown,
            rows,
        }
    }

    pub fn rows(&self) -> &[AnswerRow] {
        &self.rows
    }

    pub fn headline(&self) -> String {
        format!(
            "Question #{}: {} with {} options",
            self.index, self.kind, self.num_options
        )
    }

    pub fn countdown_label(&self) -> String {
        if self.countdown > 0 {
            format!("{}s", self.countdown)
        } else {
            "Complete".to_string()
        }
    }

    /// Updates the matching row. Devices that were not on the roster when the
    /// question started have no row and are ignored.
    pub fn record_answer(&mut self, answer: &AnswerPayload) -> bool {
        let Some(row) = self
            .rows
            .iter_mut()
            .find(|row| row.device_id == answer.device_id)
        else {
            return false;
        };
        if !answer.name.is_empty() {
            row.label = answer.name.clone();
        }
        row.answer = AnswerState::Answered(answer.answer.clone().unwrap_or_default());
        if answer.group.is_some() {
            row.group = answer.group.clone();
        }
        if answer.role.is_some() {
            row.role = answer.role.clone();
        }
        true
    }

    pub fn answered_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row.answer, AnswerState::Answered(_)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuestionPanel {
    #[default]
    Idle,
    Active(ActiveQuestion),
}

impl QuestionPanel {
    pub fn active(&self) -> Option<&ActiveQuestion> {
        match self {
            Self::Idle => None,
            Self::Active(question) => Some(question),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Replaces whatever was in flight; the previous rows are discarded.
    pub fn set(&mut self, question: Option<ActiveQuestion>) {
        *self = match question {
            Some(question) => Self::Active(question),
            None => Self::Idle,
        };
    }

    pub fn record_answer(&mut self, answer: &AnswerPayload) -> bool {
        match self {
            Self::Idle => false,
            Self::Active(question) => question.record_answer(answer),
        }
    }

    /// Reaching zero only changes the label; the question stays open.
    pub fn set_countdown(&mut self, seconds: i64) -> bool {
        match self {
            Self::Idle => false,
            Self::Active(question) => {
                question.countdown = seconds;
                true
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::Idle;
    }
}
