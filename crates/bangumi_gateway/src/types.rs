//! Identity and upstream payload shapes shared by the auth and catalog modules.

use serde::{Deserialize, Serialize};

/// Normalized Bangumi identity stored with a session and returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BangumiUser {
    pub id: u64,
    pub username: String,
    /// Display name
    pub nickname: String,
    /// Largest available avatar variant
    pub avatar: String,
    /// Profile bio
    pub sign: String,
    /// Profile page URL
    pub url: String,
}

/// Avatar variants as returned by `/v0/me`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarSet {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

impl AvatarSet {
    /// First non-empty variant, largest first
    pub fn largest(&self) -> Option<&str> {
        [&self.large, &self.medium, &self.small]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.is_empty())
    }
}

/// Raw `/v0/me` payload
#[derive(Debug, Clone, Deserialize)]
pub struct BangumiProfile {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<AvatarSet>,
    #[serde(default)]
    pub sign: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<BangumiProfile> for BangumiUser {
    fn from(profile: BangumiProfile) -> Self {
        let avatar = profile
            .avatar
            .as_ref()
            .and_then(AvatarSet::largest)
            .unwrap_or_default()
            .to_string();

        Self {
            id: profile.id,
            username: profile.username.unwrap_or_default(),
            nickname: profile.nickname.unwrap_or_default(),
            avatar,
            sign: profile.sign.unwrap_or_default(),
            url: profile.url.unwrap_or_default(),
        }
    }
}

/// Cover image variants on subjects and search results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub common: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

impl ImageSet {
    pub fn best(&self) -> Option<String> {
        [&self.large, &self.common, &self.medium, &self.small]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}
