//! Typed wrappers over the raw control protocol: pipelines, endpoints and
//! the media profiles recordings are written with.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{EventSubscription, PipelineClient};
use crate::error::{ClientError, ClientResult};
use crate::protocol::{events, operations};

/// Container profile a recorder writes, and the codecs a correct recording
/// of that profile is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaProfile {
    #[default]
    Webm,
    Mp4,
    WebmVideoOnly,
    WebmAudioOnly,
    Mp4VideoOnly,
    Mp4AudioOnly,
}

impl MediaProfile {
    /// Wire name of the profile.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaProfile::Webm => "WEBM",
            MediaProfile::Mp4 => "MP4",
            MediaProfile::WebmVideoOnly => "WEBM_VIDEO_ONLY",
            MediaProfile::WebmAudioOnly => "WEBM_AUDIO_ONLY",
            MediaProfile::Mp4VideoOnly => "MP4_VIDEO_ONLY",
            MediaProfile::Mp4AudioOnly => "MP4_AUDIO_ONLY",
        }
    }

    /// File extension for recordings of this profile, with the dot.
    pub fn file_extension(&self) -> &'static str {
        match self {
            MediaProfile::Webm | MediaProfile::WebmVideoOnly | MediaProfile::WebmAudioOnly => ".webm",
            MediaProfile::Mp4 | MediaProfile::Mp4VideoOnly | MediaProfile::Mp4AudioOnly => ".mp4",
        }
    }

    /// Video codec a recording of this profile should carry, when it has a
    /// video track at all.
    pub fn expected_video_codec(&self) -> Option<&'static str> {
        match self {
            MediaProfile::Webm | MediaProfile::WebmVideoOnly => Some("VP8"),
            MediaProfile::Mp4 | MediaProfile::Mp4VideoOnly => Some("AVC"),
            MediaProfile::WebmAudioOnly | MediaProfile::Mp4AudioOnly => None,
        }
    }

    /// Audio codec a recording of this profile should carry, when it has an
    /// audio track at all.
    pub fn expected_audio_codec(&self) -> Option<&'static str> {
        match self {
            MediaProfile::Webm | MediaProfile::WebmAudioOnly => Some("Vorbis"),
            MediaProfile::Mp4 | MediaProfile::Mp4AudioOnly => Some("MPEG-4 AAC"),
            MediaProfile::WebmVideoOnly | MediaProfile::Mp4VideoOnly => None,
        }
    }
}

impl fmt::Display for MediaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ICE candidate exchanged between a browser and a WebRTC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: String,
    pub sdp_m_line_index: u32,
}

/// Anything that lives in a pipeline and can be wired to other elements.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Server-side object reference.
    fn object(&self) -> &str;

    fn client(&self) -> &PipelineClient;

    /// Connects this element's output to `sink`.
    async fn connect(&self, sink: &dyn MediaElement) -> ClientResult<()> {
        self.client()
            .invoke(self.object(), operations::CONNECT, json!({"sink": sink.object()}))
            .await
            .map(drop)
    }

    /// Subscribes to an event type on this element.
    async fn subscribe(&self, event_type: &str) -> ClientResult<EventSubscription> {
        self.client().subscribe(self.object(), event_type).await
    }

    async fn subscribe_error(&self) -> ClientResult<EventSubscription> {
        self.subscribe(events::ERROR).await
    }

    /// Releases this element on the server.
    async fn release(&self) -> ClientResult<()> {
        self.client().release(self.object()).await
    }
}

/// A media pipeline, owner of every element created inside it.
///
/// Releasing the pipeline releases all of its elements; further operations
/// on any of them fail with [`ClientError::ObjectNotFound`].
#[derive(Clone)]
pub struct MediaPipeline {
    client: PipelineClient,
    object: String,
}

impl MediaPipeline {
    /// Creates a new pipeline on the server.
    pub async fn create(client: &PipelineClient) -> ClientResult<Self> {
        let object = client.create("MediaPipeline", json!({})).await?;
        Ok(Self { client: client.clone(), object })
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn client(&self) -> &PipelineClient {
        &self.client
    }

    /// Starts building a player that reads from `uri`.
    pub fn create_player(&self, uri: impl Into<String>) -> PlayerEndpointBuilder<'_> {
        PlayerEndpointBuilder {
            pipeline: self,
            uri: uri.into(),
            use_encoded_media: false,
        }
    }

    /// Starts building a recorder that writes to `uri`.
    pub fn create_recorder(&self, uri: impl Into<String>) -> RecorderEndpointBuilder<'_> {
        RecorderEndpointBuilder {
            pipeline: self,
            uri: uri.into(),
            profile: MediaProfile::default(),
            stop_on_end_of_stream: false,
        }
    }

    /// Starts building a WebRTC endpoint.
    pub fn create_webrtc(&self) -> WebRtcEndpointBuilder<'_> {
        WebRtcEndpointBuilder {
            pipeline: self,
            recvonly: false,
            sendonly: false,
        }
    }

    /// Releases the pipeline and everything in it.
    pub async fn release(&self) -> ClientResult<()> {
        self.client.release(&self.object).await
    }
}

impl fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline").field("object", &self.object).finish_non_exhaustive()
    }
}

pub struct PlayerEndpointBuilder<'a> {
    pipeline: &'a MediaPipeline,
    uri: String,
    use_encoded_media: bool,
}

impl PlayerEndpointBuilder<'_> {
    /// Pass media through without transcoding.
    pub fn with_encoded_media(mut self) -> Self {
        self.use_encoded_media = true;
        self
    }

    pub async fn build(self) -> ClientResult<PlayerEndpoint> {
        let mut ctor = json!({
            "mediaPipeline": self.pipeline.object,
            "uri": self.uri,
        });
        if self.use_encoded_media {
            ctor["useEncodedMedia"] = json!(true);
        }
        let object = self.pipeline.client.create("PlayerEndpoint", ctor).await?;
        Ok(PlayerEndpoint {
            client: self.pipeline.client.clone(),
            object,
            uri: self.uri,
        })
    }
}

/// Plays a media file into its pipeline and fires `EndOfStream` when the
/// media runs out.
#[derive(Clone)]
pub struct PlayerEndpoint {
    client: PipelineClient,
    object: String,
    uri: String,
}

impl PlayerEndpoint {
    /// URI this player reads from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn play(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::PLAY, json!({})).await.map(drop)
    }

    /// Pauses playback. Pausing a player that is not playing is a no-op.
    pub async fn pause(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::PAUSE, json!({})).await.map(drop)
    }

    /// Stops playback and rewinds to the start.
    pub async fn stop(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::STOP, json!({})).await.map(drop)
    }

    /// Seeks to `position` from the start of the media.
    pub async fn set_position(&self, position: Duration) -> ClientResult<()> {
        let params = json!({"position": position.as_millis() as u64});
        self.client.invoke(&self.object, operations::SET_POSITION, params).await.map(drop)
    }

    /// Current playback position.
    pub async fn position(&self) -> ClientResult<Duration> {
        let value = self.client.invoke(&self.object, operations::GET_POSITION, json!({})).await?;
        let millis = value
            .as_u64()
            .ok_or_else(|| ClientError::protocol("getPosition returned a non-integer"))?;
        Ok(Duration::from_millis(millis))
    }

    pub async fn subscribe_end_of_stream(&self) -> ClientResult<EventSubscription> {
        self.subscribe(events::END_OF_STREAM).await
    }
}

#[async_trait]
impl MediaElement for PlayerEndpoint {
    fn object(&self) -> &str {
        &self.object
    }

    fn client(&self) -> &PipelineClient {
        &self.client
    }
}

pub struct RecorderEndpointBuilder<'a> {
    pipeline: &'a MediaPipeline,
    uri: String,
    profile: MediaProfile,
    stop_on_end_of_stream: bool,
}

impl RecorderEndpointBuilder<'_> {
    pub fn with_media_profile(mut self, profile: MediaProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Stop recording automatically when the source signals end of stream.
    pub fn with_stop_on_end_of_stream(mut self) -> Self {
        self.stop_on_end_of_stream = true;
        self
    }

    pub async fn build(self) -> ClientResult<RecorderEndpoint> {
        let mut ctor = json!({
            "mediaPipeline": self.pipeline.object,
            "uri": self.uri,
            "mediaProfile": self.profile.as_str(),
        });
        if self.stop_on_end_of_stream {
            ctor["stopOnEndOfStream"] = json!(true);
        }
        let object = self.pipeline.client.create("RecorderEndpoint", ctor).await?;
        Ok(RecorderEndpoint {
            client: self.pipeline.client.clone(),
            object,
            uri: self.uri,
            profile: self.profile,
        })
    }
}

/// Writes whatever is connected to it into a file.
#[derive(Clone)]
pub struct RecorderEndpoint {
    client: PipelineClient,
    object: String,
    uri: String,
    profile: MediaProfile,
}

impl RecorderEndpoint {
    /// URI the recording is written to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn profile(&self) -> MediaProfile {
        self.profile
    }

    /// Starts recording. The server confirms with a `Recording` event.
    pub async fn record(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::RECORD, json!({})).await.map(drop)
    }

    pub async fn pause(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::PAUSE, json!({})).await.map(drop)
    }

    /// Stops recording without waiting for the file to be finalized.
    pub async fn stop(&self) -> ClientResult<()> {
        self.client.invoke(&self.object, operations::STOP, json!({})).await.map(drop)
    }

    /// Stops recording and waits for the server's `Stopped` event, which
    /// means the file is complete on disk.
    pub async fn stop_and_wait(&self, timeout: Duration) -> ClientResult<()> {
        let mut stopped = self.subscribe(events::STOPPED).await?;
        self.client.invoke(&self.object, operations::STOP, json!({})).await?;
        match stopped.wait(timeout).await {
            Some(_) => Ok(()),
            None => Err(ClientError::Timeout { timeout }),
        }
    }

    pub async fn subscribe_recording(&self) -> ClientResult<EventSubscription> {
        self.subscribe(events::RECORDING).await
    }
}

#[async_trait]
impl MediaElement for RecorderEndpoint {
    fn object(&self) -> &str {
        &self.object
    }

    fn client(&self) -> &PipelineClient {
        &self.client
    }
}

pub struct WebRtcEndpointBuilder<'a> {
    pipeline: &'a MediaPipeline,
    recvonly: bool,
    sendonly: bool,
}

impl WebRtcEndpointBuilder<'_> {
    /// Endpoint only receives media from the peer.
    pub fn recvonly(mut self) -> Self {
        self.recvonly = true;
        self
    }

    /// Endpoint only sends media to the peer.
    pub fn sendonly(mut self) -> Self {
        self.sendonly = true;
        self
    }

    pub async fn build(self) -> ClientResult<WebRtcEndpoint> {
        let mut ctor = json!({"mediaPipeline": self.pipeline.object});
        if self.recvonly {
            ctor["recvonly"] = json!(true);
        }
        if self.sendonly {
            ctor["sendonly"] = json!(true);
        }
        let object = self.pipeline.client.create("WebRtcEndpoint", ctor).await?;
        Ok(WebRtcEndpoint {
            client: self.pipeline.client.clone(),
            object,
        })
    }
}

/// Terminates a WebRTC session with a browser.
#[derive(Clone)]
pub struct WebRtcEndpoint {
    client: PipelineClient,
    object: String,
}

impl WebRtcEndpoint {
    /// Feeds the browser's SDP offer to the endpoint and returns its answer.
    pub async fn process_offer(&self, offer: &str) -> ClientResult<String> {
        let value = self
            .client
            .invoke(&self.object, operations::PROCESS_OFFER, json!({"offer": offer}))
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::protocol("processOffer returned no SDP answer"))
    }

    /// Starts ICE gathering. Candidates arrive as `IceCandidateFound` events
    /// followed by one `IceGatheringDone`.
    pub async fn gather_candidates(&self) -> ClientResult<()> {
        self.client
            .invoke(&self.object, operations::GATHER_CANDIDATES, json!({}))
            .await
            .map(drop)
    }

    /// Adds a remote candidate received from the browser.
    pub async fn add_ice_candidate(&self, candidate: &IceCandidate) -> ClientResult<()> {
        let params = json!({"candidate": serde_json::to_value(candidate)?});
        self.client
            .invoke(&self.object, operations::ADD_ICE_CANDIDATE, params)
            .await
            .map(drop)
    }

    pub async fn subscribe_ice_candidate_found(&self) -> ClientResult<EventSubscription> {
        self.subscribe(events::ICE_CANDIDATE_FOUND).await
    }

    pub async fn subscribe_ice_gathering_done(&self) -> ClientResult<EventSubscription> {
        self.subscribe(events::ICE_GATHERING_DONE).await
    }
}

#[async_trait]
impl MediaElement for WebRtcEndpoint {
    fn object(&self) -> &str {
        &self.object
    }

    fn client(&self) -> &PipelineClient {
        &self.client
    }
}
