//! Data-transfer types returned by upstream read operations

use serde::{Deserialize, Serialize};

/// A single tweet as exposed to gateway callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub created_at: String,
    /// Screen name of the author.
    pub author: String,
    /// Id of the tweet this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub retweets: u64,
    pub likes: u64,
}

/// A user profile as exposed to gateway callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub screen_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub tweets: u64,
    pub verified: bool,
}
