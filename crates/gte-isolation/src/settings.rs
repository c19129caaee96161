//! Isolation settings

use serde::{Deserialize, Serialize};

/// Branch naming and commit identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationSettings {
    /// Prefix of every isolation branch
    pub branch_prefix: String,
    /// Prefix of every commit subject
    pub message_prefix: String,
    /// Bot author name
    pub bot_name: String,
    /// Bot author email
    pub bot_email: String,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            branch_prefix: "gte/patch-".to_string(),
            message_prefix: "[gte] ".to_string(),
            bot_name: "GTE Bot".to_string(),
            bot_email: "bot@gte.local".to_string(),
        }
    }
}

impl IsolationSettings {
    /// Signature for commits made now
    ///
    /// # Errors
    /// Returns error if the name or email is rejected by libgit2
    pub fn signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.bot_name, &self.bot_email)
    }
}
