//! Questionnaire vote owned by a device.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pantry_core::{AnswerId, DeviceId, QuestionId, UserId, VoteId};

#[derive(Debug, Clone, Serialize)]
pub struct Vote {
    pub id: VoteId,
    #[serde(rename = "answer")]
    pub answer_id: AnswerId,
    #[serde(rename = "question")]
    pub question_id: QuestionId,
    #[serde(rename = "device")]
    pub device_id: DeviceId,
    #[serde(skip)]
    pub owner_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
