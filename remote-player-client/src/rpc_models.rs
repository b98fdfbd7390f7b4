use remote_player_models::{
    EngineVersion, ItemKind, MediaKind, PlayerSnapshot, PlayingItem, RepeatMode, Time,
};
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcTime {
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub milliseconds: u64,
}

impl From<RpcTime> for Time {
    fn from(value: RpcTime) -> Self {
        Time::from_parts(value.hours, value.minutes, value.seconds, value.milliseconds)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub tag: String,
}

impl From<Version> for EngineVersion {
    fn from(value: Version) -> Self {
        Self {
            major: value.major,
            minor: value.minor,
            revision: value.revision,
            tag: value.tag,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationProperties {
    pub volume: f64,
    pub muted: bool,
    #[serde(default)]
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePlayer {
    pub playerid: i32,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ActivePlayer {
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self.kind.as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProperties {
    #[serde(default)]
    pub speed: i32,
    #[serde(default)]
    pub time: RpcTime,
    #[serde(default)]
    pub totaltime: RpcTime,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub shuffled: bool,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub canseek: bool,
    #[serde(default)]
    pub canshuffle: bool,
    #[serde(default)]
    pub canrepeat: bool,
    #[serde(default)]
    pub partymode: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub fanart: Option<String>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub albumid: Option<i64>,
    #[serde(default)]
    pub artist: Vec<String>,
    #[serde(default)]
    pub artistid: Vec<i64>,
    #[serde(default)]
    pub showtitle: Option<String>,
    #[serde(default)]
    pub tvshowid: Option<i64>,
    #[serde(default)]
    pub season: Option<i32>,
    #[serde(default)]
    pub episode: Option<i32>,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResponse {
    #[serde(default)]
    pub item: Item,
}

fn item_kind(kind: &str) -> ItemKind {
    match kind {
        "song" => ItemKind::Song,
        "movie" => ItemKind::Movie,
        "episode" => ItemKind::Episode,
        "musicvideo" => ItemKind::MusicVideo,
        "channel" => ItemKind::Channel,
        "picture" => ItemKind::Picture,
        _ => ItemKind::Unknown,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// The engine reports "no such id" as -1.
fn valid_id<T: PartialOrd + Default>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v >= T::default())
}

impl From<Item> for PlayingItem {
    fn from(item: Item) -> Self {
        let title = if item.title.is_empty() {
            item.label
        } else {
            item.title
        };

        Self {
            id: valid_id(item.id),
            kind: item_kind(&item.kind),
            title,
            thumbnail: non_empty(item.thumbnail),
            fanart: non_empty(item.fanart),
            duration: Time::from_seconds(item.duration),
            album: non_empty(item.album),
            album_id: valid_id(item.albumid),
            artist: item.artist,
            artist_ids: item.artistid,
            show_title: non_empty(item.showtitle),
            tvshow_id: valid_id(item.tvshowid),
            season: valid_id(item.season),
            episode: valid_id(item.episode),
            file: non_empty(item.file),
        }
    }
}

pub fn player_snapshot(
    player: &ActivePlayer,
    properties: PlayerProperties,
    item: Item,
) -> PlayerSnapshot {
    PlayerSnapshot {
        player_id: player.playerid,
        media_kind: player.media_kind().unwrap_or_default(),
        speed: properties.speed,
        position: properties.time.into(),
        total_time: properties.totaltime.into(),
        percentage: properties.percentage,
        playlist_index: properties.position.max(0) as u32,
        shuffled: properties.shuffled,
        repeat: properties.repeat,
        can_seek: properties.canseek,
        can_shuffle: properties.canshuffle,
        can_repeat: properties.canrepeat,
        party_mode: properties.partymode,
        item: item.into(),
    }
}
