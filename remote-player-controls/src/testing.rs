use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use remote_player_client::client::{Request, Response, RpcTransport};
use remote_player_models::{Backend, PlayingItem};
use serde_json::{Value, json};
use tokio::sync::{RwLock, mpsc};

use crate::{
    Result,
    broadcast::Broadcast,
    local::{LocalEngine, LocalEvent, LocalEventReceiver, LocalEventSender, LocalPlayer},
    notification::NotificationBroadcast,
    progress::ProgressTimer,
    refresh::Refresher,
    store::StateStore,
    tracklist::Tracklist,
};

#[derive(Debug, Default)]
struct Script {
    item: Option<i64>,
    speed: i32,
    seconds: u64,
    volume: u8,
    muted: bool,
}

/// In-memory engine answering the calls the player makes.
#[derive(Debug)]
pub struct ScriptedRpc {
    reachable: AtomicBool,
    script: Mutex<Script>,
    methods: Mutex<Vec<String>>,
    batches: Mutex<usize>,
}

impl ScriptedRpc {
    pub fn idle() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            script: Mutex::new(Script {
                seconds: 10,
                volume: 50,
                ..Default::default()
            }),
            methods: Default::default(),
            batches: Default::default(),
        }
    }

    pub fn playing(item: i64) -> Self {
        let rpc = Self::idle();
        rpc.set_playing(Some(item));
        rpc
    }

    pub fn set_playing(&self, item: Option<i64>) {
        let mut script = self.script.lock().unwrap();
        script.item = item;
        script.speed = if item.is_some() { 1 } else { 0 };
    }

    /// Playback position the engine reports, in seconds.
    pub fn set_position(&self, seconds: u64) {
        self.script.lock().unwrap().seconds = seconds;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Every method called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    pub fn pings(&self) -> usize {
        self.methods()
            .iter()
            .filter(|method| *method == "JSONRPC.Ping")
            .count()
    }

    /// Number of full state batches answered.
    pub fn batches(&self) -> usize {
        *self.batches.lock().unwrap()
    }

    fn answer(&self, request: &Request) -> Response {
        let script = self.script.lock().unwrap();
        let player = request.params["playerid"].as_i64();

        let not_active = || {
            Err(remote_player_client::Error::Rpc {
                code: -32100,
                message: "Failed to execute method.".to_string(),
            })
        };

        match request.method.as_str() {
            "JSONRPC.Ping" => Ok(json!("pong")),
            "Application.GetProperties" => Ok(json!({
                "volume": script.volume,
                "muted": script.muted,
                "version": { "major": 21, "minor": 1, "tag": "stable" },
            })),
            "Player.GetActivePlayers" => Ok(match script.item {
                Some(_) => json!([{ "playerid": 0, "type": "audio" }]),
                None => json!([]),
            }),
            "Player.GetProperties" => match (script.item, player) {
                (Some(_), Some(0)) => Ok(json!({
                    "speed": script.speed,
                    "time": { "minutes": script.seconds / 60, "seconds": script.seconds % 60 },
                    "totaltime": { "minutes": 3 },
                    "percentage": 5.5,
                    "position": 0,
                    "shuffled": false,
                    "repeat": "off",
                    "canseek": true,
                })),
                _ => not_active(),
            },
            "Player.GetItem" => match (script.item, player) {
                (Some(id), Some(0)) => Ok(json!({
                    "item": { "id": id, "type": "song", "label": format!("item {id}") }
                })),
                _ => not_active(),
            },
            _ => Ok(Value::from("OK")),
        }
    }
}

#[async_trait]
impl RpcTransport for ScriptedRpc {
    async fn batch(&self, requests: Vec<Request>) -> remote_player_client::Result<Vec<Response>> {
        self.methods
            .lock()
            .unwrap()
            .extend(requests.iter().map(|request| request.method.clone()));

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(remote_player_client::Error::Http {
                message: "connection refused".to_string(),
            });
        }

        if requests.len() > 1 {
            *self.batches.lock().unwrap() += 1;
        }

        Ok(requests.iter().map(|request| self.answer(request)).collect())
    }
}

/// The remote side of a player without push or polling.
#[derive(Debug)]
pub struct Remote {
    pub store: Arc<StateStore>,
    pub broadcast: Arc<Broadcast>,
    pub notifications: Arc<NotificationBroadcast>,
    pub progress: Arc<ProgressTimer>,
    pub refresher: Arc<Refresher>,
}

pub fn remote(rpc: Arc<ScriptedRpc>) -> Remote {
    let store = Arc::new(StateStore::new(Backend::Remote));
    let broadcast = Arc::new(Broadcast::new());
    let notifications = Arc::new(NotificationBroadcast::new());
    let progress = Arc::new(ProgressTimer::new(store.clone(), broadcast.clone()));
    let refresher = Arc::new(Refresher::new(
        rpc,
        store.clone(),
        broadcast.clone(),
        progress.clone(),
        Duration::from_millis(300),
    ));

    Remote {
        store,
        broadcast,
        notifications,
        progress,
        refresher,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(Option<i64>),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(u8),
}

/// Local engine that records calls and answers with the events a real
/// engine would send.
#[derive(Debug)]
pub struct RecordingEngine {
    events: LocalEventSender,
    calls: Mutex<Vec<EngineCall>>,
    position: Mutex<Duration>,
}

impl RecordingEngine {
    pub fn new(events: LocalEventSender) -> Self {
        Self {
            events,
            calls: Default::default(),
            position: Default::default(),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock().unwrap() = position;
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn emit(&self, event: LocalEvent) {
        _ = self.events.send(event);
    }

    /// Feeds every pending engine event back into the player.
    pub async fn drain(player: &mut LocalPlayer<RecordingEngine>, events: &mut LocalEventReceiver) {
        while let Ok(event) = events.try_recv() {
            player.handle_event(event).await.unwrap();
        }
    }
}

impl LocalEngine for RecordingEngine {
    fn load(&mut self, item: &PlayingItem) -> Result<()> {
        self.record(EngineCall::Load(item.id));
        self.set_position(Duration::ZERO);
        self.emit(LocalEvent::Started {
            duration: Some(item.duration.into()),
        });
        Ok(())
    }

    fn play(&mut self) {
        self.record(EngineCall::Play);
        self.emit(LocalEvent::Resumed);
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause);
        self.emit(LocalEvent::Paused);
    }

    fn stop(&mut self) {
        self.record(EngineCall::Stop);
        self.emit(LocalEvent::Stopped);
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.record(EngineCall::Seek(position));
        self.set_position(position);
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) {
        self.record(EngineCall::Volume(volume));
    }

    fn position(&self) -> Duration {
        *self.position.lock().unwrap()
    }
}

pub fn local_player() -> (LocalPlayer<RecordingEngine>, LocalEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let player = LocalPlayer::new(
        RecordingEngine::new(tx),
        Arc::new(StateStore::new(Backend::Local)),
        Arc::new(Broadcast::new()),
        Arc::new(NotificationBroadcast::new()),
        Arc::new(RwLock::new(Tracklist::new())),
    );
    (player, rx)
}
