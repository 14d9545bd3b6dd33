use serde::{Deserialize, Serialize};

/// A named collection of questions. `total_question_count` is fixed once the
/// pool is published; attempts snapshot it at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub total_question_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub pool_id: String,
    pub text: String,
    pub is_active: bool,
}
