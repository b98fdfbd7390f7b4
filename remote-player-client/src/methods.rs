use remote_player_models::{MediaKind, RepeatMode, Snapshot};
use serde_json::{Value, json};

use crate::{
    Error, Result,
    client::{Request, Response},
    rpc_models::{ActivePlayer, ApplicationProperties, ItemResponse, PlayerProperties, player_snapshot},
};

/// Player slots queried by every refresh.
pub const AUDIO_PLAYER: i32 = 0;
pub const VIDEO_PLAYER: i32 = 1;

const APPLICATION_PROPERTIES: &[&str] = &["volume", "muted", "version"];

const PLAYER_PROPERTIES: &[&str] = &[
    "speed",
    "time",
    "totaltime",
    "percentage",
    "position",
    "shuffled",
    "repeat",
    "canseek",
    "canshuffle",
    "canrepeat",
    "partymode",
    "type",
];

const ITEM_PROPERTIES: &[&str] = &[
    "title",
    "thumbnail",
    "fanart",
    "duration",
    "album",
    "albumid",
    "artist",
    "artistid",
    "showtitle",
    "tvshowid",
    "season",
    "episode",
    "file",
];

pub fn default_player_id(kind: MediaKind) -> i32 {
    match kind {
        MediaKind::Audio => AUDIO_PLAYER,
        MediaKind::Video => VIDEO_PLAYER,
    }
}

pub fn ping() -> Request {
    Request::without_params("JSONRPC.Ping")
}

/// Application properties, the active players, and properties plus current
/// item of both player slots. The inactive slot answers with errors.
pub fn full_state() -> Vec<Request> {
    let mut requests = vec![
        Request::new(
            "Application.GetProperties",
            json!({ "properties": APPLICATION_PROPERTIES }),
        ),
        Request::without_params("Player.GetActivePlayers"),
    ];

    for player_id in [AUDIO_PLAYER, VIDEO_PLAYER] {
        requests.push(Request::new(
            "Player.GetProperties",
            json!({ "playerid": player_id, "properties": PLAYER_PROPERTIES }),
        ));
        requests.push(Request::new(
            "Player.GetItem",
            json!({ "playerid": player_id, "properties": ITEM_PROPERTIES }),
        ));
    }

    requests
}

fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    Ok(serde_json::from_value(response?)?)
}

pub fn decode_full_state(responses: Vec<Response>) -> Result<Snapshot> {
    let expected = full_state().len();
    if responses.len() != expected {
        return Err(Error::Batch {
            message: format!("expected {expected} responses, got {}", responses.len()),
        });
    }

    let mut responses = responses.into_iter();
    let mut next = || {
        responses.next().ok_or_else(|| Error::Batch {
            message: "response ended early".to_string(),
        })
    };

    let application: ApplicationProperties = decode(next()?)?;
    let active: Vec<ActivePlayer> = decode(next()?)?;
    let audio = (next()?, next()?);
    let video = (next()?, next()?);

    let active = active
        .iter()
        .find(|player| player.playerid == AUDIO_PLAYER || player.playerid == VIDEO_PLAYER);

    let player = match active {
        Some(active) => {
            let (properties, item) = if active.playerid == AUDIO_PLAYER {
                audio
            } else {
                video
            };

            let properties: PlayerProperties = decode(properties)?;
            let item: ItemResponse = decode(item)?;
            Some(player_snapshot(active, properties, item.item))
        }
        None => None,
    };

    Ok(Snapshot {
        volume: application.volume.round().clamp(0.0, 100.0) as u8,
        muted: application.muted,
        version: application.version.into(),
        player,
    })
}

pub fn play_pause(player_id: i32, play: bool) -> Request {
    Request::new(
        "Player.PlayPause",
        json!({ "playerid": player_id, "play": play }),
    )
}

pub fn stop(player_id: i32) -> Request {
    Request::new("Player.Stop", json!({ "playerid": player_id }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoTo {
    Next,
    Previous,
    Index(u32),
}

pub fn go_to(player_id: i32, to: GoTo) -> Request {
    let to = match to {
        GoTo::Next => json!("next"),
        GoTo::Previous => json!("previous"),
        GoTo::Index(index) => json!(index),
    };

    Request::new("Player.GoTo", json!({ "playerid": player_id, "to": to }))
}

pub fn seek(player_id: i32, percentage: f64) -> Request {
    Request::new(
        "Player.Seek",
        json!({ "playerid": player_id, "value": { "percentage": percentage } }),
    )
}

pub fn set_volume(volume: u8) -> Request {
    Request::new("Application.SetVolume", json!({ "volume": volume }))
}

pub fn set_mute(muted: bool) -> Request {
    Request::new("Application.SetMute", json!({ "mute": muted }))
}

pub fn set_shuffle(player_id: i32, shuffled: bool) -> Request {
    Request::new(
        "Player.SetShuffle",
        json!({ "playerid": player_id, "shuffle": shuffled }),
    )
}

pub fn set_repeat(player_id: i32, repeat: RepeatMode) -> Request {
    Request::new(
        "Player.SetRepeat",
        json!({ "playerid": player_id, "repeat": repeat.as_str() }),
    )
}

pub fn toggle_party_mode(player_id: i32) -> Request {
    Request::new(
        "Player.SetPartymode",
        json!({ "playerid": player_id, "partymode": Value::from("toggle") }),
    )
}
