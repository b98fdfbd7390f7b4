use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use remote_player_models::PlayingItem;
use rodio::{Source, decoder::DecoderBuilder};
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::local::{LocalEngine, LocalEvent, LocalEventSender};
use crate::{Error, Result};

const TICK: Duration = Duration::from_millis(500);

/// Plays local files and http streams on the default output device.
pub struct Sink {
    stream_handle: Option<rodio::OutputStream>,
    sink: Option<Arc<rodio::Sink>>,
    current_load: Option<JoinHandle<()>>,
    client: reqwest::Client,
    events: LocalEventSender,
    volume: u8,
}

impl Sink {
    pub fn new(events: LocalEventSender, volume: u8) -> Self {
        Self {
            stream_handle: None,
            sink: None,
            current_load: None,
            client: reqwest::Client::new(),
            events,
            volume: volume.min(100),
        }
    }

    fn clear(&mut self) {
        if let Some(handle) = self.current_load.take() {
            handle.abort();
        }

        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn output(&mut self) -> Result<&rodio::OutputStream> {
        if self.stream_handle.is_none() {
            let mut stream_handle = rodio::OutputStreamBuilder::from_default_device()?.open_stream()?;
            stream_handle.log_on_drop(false);
            self.stream_handle = Some(stream_handle);
        }

        self.stream_handle.as_ref().ok_or(Error::StreamError {
            message: "no output stream".to_string(),
        })
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("loaded", &self.sink.is_some())
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

async fn read_bytes(client: &reqwest::Client, location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = client.get(location).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(fs::read(location).await?)
    }
}

impl LocalEngine for Sink {
    #[instrument(skip(self, item), fields(title = %item.title))]
    fn load(&mut self, item: &PlayingItem) -> Result<()> {
        let Some(location) = item.file.clone() else {
            return Err(Error::Engine {
                message: format!("{} has no file to play", item.title),
            });
        };

        self.clear();

        let sink = Arc::new(rodio::Sink::connect_new(self.output()?.mixer()));
        set_volume(&sink, self.volume);
        self.sink = Some(sink.clone());

        let client = self.client.clone();
        let events = self.events.clone();

        self.current_load = Some(tokio::spawn(async move {
            let bytes = match read_bytes(&client, &location).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    _ = events.send(LocalEvent::Failed(format!(
                        "Unable to read {location}: {error}"
                    )));
                    return;
                }
            };

            let source = match DecoderBuilder::new()
                .with_data(Cursor::new(bytes))
                .with_seekable(true)
                .build()
            {
                Ok(source) => source,
                Err(error) => {
                    _ = events.send(LocalEvent::Failed(format!(
                        "Unable to decode {location}: {error}"
                    )));
                    return;
                }
            };

            let duration = source.total_duration();
            sink.append(source);
            sink.play();
            debug!(?duration, "local item started");
            _ = events.send(LocalEvent::Started { duration });

            let mut interval = tokio::time::interval(TICK);
            loop {
                interval.tick().await;

                if sink.empty() {
                    _ = events.send(LocalEvent::Finished);
                    break;
                }

                if !sink.is_paused()
                    && events
                        .send(LocalEvent::Position {
                            position: sink.get_pos(),
                            duration,
                        })
                        .is_err()
                {
                    break;
                }
            }
        }));

        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
            _ = self.events.send(LocalEvent::Resumed);
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
            _ = self.events.send(LocalEvent::Paused);
        }
    }

    fn stop(&mut self) {
        self.clear();
        _ = self.events.send(LocalEvent::Stopped);
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if let Some(sink) = &self.sink {
            sink.try_seek(position)?;
        }

        Ok(())
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        if let Some(sink) = &self.sink {
            set_volume(sink, self.volume);
        }
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos())
            .unwrap_or_default()
    }
}

fn set_volume(sink: &rodio::Sink, volume: u8) {
    let volume = (volume as f32 / 100.0).clamp(0.0, 1.0).powi(3);
    sink.set_volume(volume);
}
