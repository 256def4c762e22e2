//! Track search over YouTube via `rusty_ytdl`.

use crate::errors::ChorusError;
use crate::track::{SearchOutcome, TrackRef, UNKNOWN_AUTHOR};
use crate::traits::TrackSearch;

use async_trait::async_trait;
use rusty_ytdl::search::{Playlist, PlaylistSearchOptions, SearchOptions, SearchResult, YouTube};
use rusty_ytdl::{RequestOptions, Video, VideoOptions};
use tracing::debug;

pub const DEFAULT_PLAYLIST_LIMIT: u64 = 50;
pub const DEFAULT_SEARCH_LIMIT: u64 = 5;

/// What kind of thing a raw query string is asking for.
#[derive(Clone, Debug, PartialEq, Eq)]
enum YtQuery {
    VideoLink(String),
    PlaylistLink(String),
    Keywords(String),
}

/// Classify a query: YouTube playlist URL, plain video URL, or keywords.
fn classify(query: &str) -> YtQuery {
    let Ok(url) = url::Url::parse(query) else {
        return YtQuery::Keywords(query.to_string());
    };
    if url.path().contains("playlist")
        || url.query_pairs().any(|(k, _)| k == "list") && url.path().contains("watch")
    {
        YtQuery::PlaylistLink(url.to_string())
    } else {
        YtQuery::VideoLink(url.to_string())
    }
}

/// Production [`TrackSearch`] over the `rusty_ytdl` search and video clients.
pub struct YtSearch {
    yt: YouTube,
    video_opts: VideoOptions,
}

impl YtSearch {
    /// Build a search client sharing the process-wide reqwest client.
    ///
    /// # Errors
    /// Returns an error if the YouTube client cannot be constructed.
    pub fn new(req_client: reqwest::Client) -> Result<Self, ChorusError> {
        let request_options = RequestOptions {
            client: Some(req_client),
            ..Default::default()
        };
        let yt = YouTube::new_with_options(&request_options).map_err(search_err)?;
        let video_opts = VideoOptions {
            request_options,
            ..Default::default()
        };
        Ok(YtSearch { yt, video_opts })
    }

    /// Resolve a direct video URL to a single track.
    async fn resolve_url(&self, url: &str) -> Result<TrackRef, ChorusError> {
        let video = Video::new_with_options(url, self.video_opts.clone()).map_err(search_err)?;
        let info = video.get_info().await.map_err(search_err)?;
        let details = info.video_details;
        let duration_ms = details.length_seconds.parse::<u64>().unwrap_or(0) * 1000;
        let author = details
            .author
            .map(|a| a.name)
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let mut track = TrackRef::new(details.title, author, duration_ms, details.video_url);
        if let Some(thumb) = details.thumbnails.first() {
            track = track.with_artwork(thumb.url.clone());
        }
        debug!(track = %track, "resolved video link");
        Ok(track)
    }

    /// Resolve keywords to a handful of candidate tracks, best match first.
    async fn resolve_keywords(&self, keywords: &str) -> Result<Vec<TrackRef>, ChorusError> {
        let options = SearchOptions {
            limit: DEFAULT_SEARCH_LIMIT,
            ..Default::default()
        };
        let results = self
            .yt
            .search(keywords, Some(&options))
            .await
            .map_err(search_err)?;
        let tracks = results
            .into_iter()
            .filter_map(|result| match result {
                SearchResult::Video(video) => Some(video_to_track(video)),
                _ => None,
            })
            .collect();
        Ok(tracks)
    }

    /// Resolve a playlist URL, capped at [`DEFAULT_PLAYLIST_LIMIT`] tracks.
    async fn resolve_playlist(&self, url: &str) -> Result<SearchOutcome, ChorusError> {
        let options = PlaylistSearchOptions {
            limit: DEFAULT_PLAYLIST_LIMIT,
            request_options: Some(self.video_opts.request_options.clone()),
            ..Default::default()
        };
        let playlist = Playlist::get(url, Some(&options)).await.map_err(search_err)?;
        let tracks = playlist.videos.into_iter().map(video_to_track).collect();
        Ok(SearchOutcome::Playlist {
            name: playlist.name,
            tracks,
        })
    }
}

#[async_trait]
impl TrackSearch for YtSearch {
    async fn search(&self, query: &str) -> Result<SearchOutcome, ChorusError> {
        match classify(query) {
            YtQuery::VideoLink(url) => {
                Ok(SearchOutcome::Tracks(vec![self.resolve_url(&url).await?]))
            }
            YtQuery::PlaylistLink(url) => self.resolve_playlist(&url).await,
            YtQuery::Keywords(words) => {
                Ok(SearchOutcome::Tracks(self.resolve_keywords(&words).await?))
            }
        }
    }
}

fn video_to_track(video: rusty_ytdl::search::Video) -> TrackRef {
    let mut track = TrackRef::new(video.title, video.channel.name, video.duration, video.url);
    if let Some(thumb) = video.thumbnails.first() {
        track = track.with_artwork(thumb.url.clone());
    }
    track
}

fn search_err(e: rusty_ytdl::VideoError) -> ChorusError {
    ChorusError::SearchFailed(e.to_string())
}
