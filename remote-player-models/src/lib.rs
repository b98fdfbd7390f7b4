use std::{
    fmt::Display,
    ops::{Add, Sub},
    str::FromStr,
    time::Duration,
};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Remote,
    Local,
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Remote => f.write_str("remote"),
            Backend::Local => f.write_str("local"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "kodi" | "xbmc" => Ok(Backend::Remote),
            "local" | "browser" => Ok(Backend::Local),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// off -> all -> one -> off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "all" => Ok(RepeatMode::All),
            "one" => Ok(RepeatMode::One),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum PlayPhase {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: Option<String>,
    pub tag: String,
}

impl Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.tag != "stable" && !self.tag.is_empty() {
            write!(f, "-{}", self.tag)?;
        }
        Ok(())
    }
}

/// Millisecond resolution play time.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Debug, serde::Deserialize, serde::Serialize,
)]
pub struct Time(u64);

impl Time {
    pub fn from_mseconds(value: u64) -> Self {
        Self(value)
    }

    pub fn from_seconds(value: u64) -> Self {
        Self(value * 1000)
    }

    pub fn from_parts(hours: u64, minutes: u64, seconds: u64, milliseconds: u64) -> Self {
        Self(((hours * 60 + minutes) * 60 + seconds) * 1000 + milliseconds)
    }

    pub fn mseconds(&self) -> u64 {
        self.0
    }

    /// `(hours, minutes, seconds, milliseconds)`
    pub fn parts(&self) -> (u64, u64, u64, u64) {
        let milliseconds = self.0 % 1000;
        let total_seconds = self.0 / 1000;
        (
            total_seconds / 3600,
            (total_seconds / 60) % 60,
            total_seconds % 60,
            milliseconds,
        )
    }

    /// Share of `total` covered by `self`, in percent.
    pub fn percentage_of(&self, total: Time) -> f64 {
        if total.0 == 0 {
            return 0.0;
        }
        (self.0 as f64 / total.0 as f64 * 100.0).clamp(0.0, 100.0)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hours, minutes, seconds, _) = self.parts();
        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{minutes:02}:{seconds:02}")
        }
    }
}

impl From<Duration> for Time {
    fn from(value: Duration) -> Self {
        Time::from_mseconds(value.as_millis() as u64)
    }
}

impl From<Time> for Duration {
    fn from(value: Time) -> Self {
        Duration::from_millis(value.0)
    }
}

impl Add for Time {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Time::from_mseconds(self.0 + rhs.0)
    }
}

impl Sub for Time {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Time::from_mseconds(self.0.saturating_sub(rhs.0))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Song,
    Movie,
    Episode,
    #[serde(rename = "musicvideo")]
    MusicVideo,
    Channel,
    Picture,
    #[default]
    Unknown,
}

/// What a player reports as its current item. Replaced wholesale on
/// every refresh.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlayingItem {
    pub id: Option<i64>,
    pub kind: ItemKind,
    pub title: String,
    pub thumbnail: Option<String>,
    pub fanart: Option<String>,
    pub duration: Time,
    pub album: Option<String>,
    pub album_id: Option<i64>,
    pub artist: Vec<String>,
    pub artist_ids: Vec<i64>,
    pub show_title: Option<String>,
    pub tvshow_id: Option<i64>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub file: Option<String>,
}

impl PlayingItem {
    /// The item shown while nothing is playing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.file.is_none() && self.title.is_empty()
    }

    /// Items without a library id (plain files, streams) are identified
    /// by their path.
    pub fn same_item(&self, other: &PlayingItem) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.file == other.file,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ApplicationState {
    pub active_backend: Backend,
    pub volume: u8,
    pub muted: bool,
    pub last_volume: u8,
    pub shuffled: bool,
    pub repeat: RepeatMode,
    pub media_kind: MediaKind,
    pub version: EngineVersion,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            active_backend: Backend::Remote,
            volume: 50,
            muted: false,
            last_volume: 50,
            shuffled: false,
            repeat: RepeatMode::Off,
            media_kind: MediaKind::Audio,
            version: EngineVersion::default(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackState {
    pub playing: bool,
    pub paused: bool,
    pub phase: PlayPhase,
    pub item: PlayingItem,
    pub item_changed: bool,
    pub position: Time,
    pub total_time: Time,
    pub percentage: f64,
    pub playlist_index: u32,
    pub speed: i32,
    pub can_seek: bool,
    pub can_shuffle: bool,
    pub can_repeat: bool,
    pub party_mode: bool,
    pub player_id: Option<i32>,
}

/// Everything one full refresh returns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub volume: u8,
    pub muted: bool,
    pub version: EngineVersion,
    pub player: Option<PlayerSnapshot>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub player_id: i32,
    pub media_kind: MediaKind,
    pub speed: i32,
    pub position: Time,
    pub total_time: Time,
    pub percentage: f64,
    pub playlist_index: u32,
    pub shuffled: bool,
    pub repeat: RepeatMode,
    pub can_seek: bool,
    pub can_shuffle: bool,
    pub can_repeat: bool,
    pub party_mode: bool,
    pub item: PlayingItem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_parts() {
        let time = Time::from_parts(1, 2, 3, 456);
        assert_eq!(time.mseconds(), 3_723_456);
        assert_eq!(time.parts(), (1, 2, 3, 456));
        assert_eq!(time.to_string(), "1:02:03");
        assert_eq!(Time::from_seconds(65).to_string(), "01:05");
    }

    #[test]
    fn time_subtraction_saturates() {
        assert_eq!(Time::from_seconds(1) - Time::from_seconds(5), Time::default());
    }

    #[test]
    fn percentage_of_empty_total_is_zero() {
        assert_eq!(Time::from_seconds(10).percentage_of(Time::default()), 0.0);
        assert_eq!(
            Time::from_seconds(30).percentage_of(Time::from_seconds(120)),
            25.0
        );
    }

    #[test]
    fn repeat_cycles_through_all_modes() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
    }

    #[test]
    fn items_without_id_compare_by_file() {
        let a = PlayingItem {
            file: Some("/music/a.flac".into()),
            ..Default::default()
        };
        let b = PlayingItem {
            file: Some("/music/b.flac".into()),
            ..Default::default()
        };
        assert!(a.same_item(&a.clone()));
        assert!(!a.same_item(&b));
        assert!(PlayingItem::empty().is_empty());
    }

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("Remote".parse::<Backend>(), Ok(Backend::Remote));
        assert_eq!("local".parse::<Backend>(), Ok(Backend::Local));
        assert!("cloud".parse::<Backend>().is_err());
    }
}
