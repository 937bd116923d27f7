use garde::Validate;
use serde::{Deserialize, Serialize};

/// Clinician feedback on a completed analysis.
///
/// Delivery is fire-and-forget; validation happens before the request leaves
/// the client so a bad rating never reaches the wire.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Feedback {
    #[garde(length(min = 1, max = 100))]
    pub username: String,

    /// Star rating, 1–5.
    #[garde(range(min = 1, max = 5))]
    pub rating: u8,

    #[garde(length(max = 2000))]
    pub comment: String,
}

impl Feedback {
    pub fn new(username: impl Into<String>, rating: u8, comment: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            rating,
            comment: comment.into(),
        }
    }
}
