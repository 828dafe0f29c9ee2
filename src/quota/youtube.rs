//! YouTube Data API v3 quota costs.

use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    SearchList,
    VideosList,
    ChannelsList,
    PlaylistsList,
    PlaylistItemsList,
    CommentThreadsList,
    VideosUpdate,
    CaptionsList,
    VideosInsert,
    /// Any call whose cost the caller knows
    Custom(i64),
}

impl Endpoint {
    pub const KNOWN: [Endpoint; 9] = [
        Endpoint::SearchList,
        Endpoint::VideosList,
        Endpoint::ChannelsList,
        Endpoint::PlaylistsList,
        Endpoint::PlaylistItemsList,
        Endpoint::CommentThreadsList,
        Endpoint::VideosUpdate,
        Endpoint::CaptionsList,
        Endpoint::VideosInsert,
    ];

    pub fn cost(&self) -> i64 {
        match self {
            Endpoint::SearchList => 100,
            Endpoint::VideosList
            | Endpoint::ChannelsList
            | Endpoint::PlaylistsList
            | Endpoint::PlaylistItemsList
            | Endpoint::CommentThreadsList => 1,
            Endpoint::VideosUpdate | Endpoint::CaptionsList => 50,
            Endpoint::VideosInsert => 1600,
            Endpoint::Custom(cost) => *cost,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::SearchList => "search.list",
            Endpoint::VideosList => "videos.list",
            Endpoint::ChannelsList => "channels.list",
            Endpoint::PlaylistsList => "playlists.list",
            Endpoint::PlaylistItemsList => "playlistItems.list",
            Endpoint::CommentThreadsList => "commentThreads.list",
            Endpoint::VideosUpdate => "videos.update",
            Endpoint::CaptionsList => "captions.list",
            Endpoint::VideosInsert => "videos.insert",
            Endpoint::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Custom(cost) => write!(f, "custom:{}", cost),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TenantError;

    /// Endpoint names, or `custom:<cost>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(cost) = s.strip_prefix("custom:") {
            return match cost.parse::<i64>() {
                Ok(cost) if cost >= 0 => Ok(Endpoint::Custom(cost)),
                _ => Err(TenantError::invalid_value(format!("invalid custom cost '{}'", cost))),
            };
        }
        Endpoint::KNOWN
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| TenantError::invalid_value(format!("unknown YouTube endpoint '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_match_published_table() {
        assert_eq!(Endpoint::SearchList.cost(), 100);
        assert_eq!(Endpoint::VideosList.cost(), 1);
        assert_eq!(Endpoint::VideosUpdate.cost(), 50);
        assert_eq!(Endpoint::VideosInsert.cost(), 1600);
        assert_eq!(Endpoint::Custom(7).cost(), 7);
    }

    #[test]
    fn parses_names_and_custom_costs() {
        for endpoint in Endpoint::KNOWN {
            assert_eq!(endpoint.to_string().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert_eq!("custom:25".parse::<Endpoint>().unwrap(), Endpoint::Custom(25));
        assert!("custom:-1".parse::<Endpoint>().is_err());
        assert!("videos.delete".parse::<Endpoint>().is_err());
    }
}
