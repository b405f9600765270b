//! YouTube Data API v3 client.
//!
//! Covers the handful of calls the bot needs: who am I, channel search,
//! locating an active broadcast's live chat, and live chat read/write.
//! Request/response shapes are defined by the API, not by us.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{ChatMessage, ChatPage, ChatPlatform};
use crate::session::ChannelInfo;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Every request carries this timeout; the API itself imposes none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct YouTubeClient {
    client: reqwest::Client,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(access_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{API_BASE}/{path}");
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to call {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("YouTube API error ({}): {}", status, error_body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {path} response"))
    }

    /// The authenticated user's own channel (channels.list with mine=true).
    pub async fn my_channel(&self) -> Result<ChannelInfo> {
        let resp: ChannelListResponse = self
            .get_json(
                "channels",
                &[("part", "id,snippet,statistics"), ("mine", "true")],
            )
            .await?;

        let item = resp
            .items
            .into_iter()
            .next()
            .context("No channel for the authenticated user")?;
        Ok(item.into_info())
    }

    /// Look a channel up by name via the search endpoint.
    pub async fn search_channel(&self, query: &str) -> Result<Option<ChannelInfo>> {
        let resp: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "channel"),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        let channel_id = match resp.items.into_iter().next().and_then(|i| i.channel_id()) {
            Some(id) => id,
            None => return Ok(None),
        };

        let resp: ChannelListResponse = self
            .get_json(
                "channels",
                &[("part", "id,snippet,statistics"), ("id", &channel_id)],
            )
            .await?;
        Ok(resp.items.into_iter().next().map(|i| i.into_info()))
    }

    /// Find the live chat id of the channel's currently live broadcast, if any.
    pub async fn find_live_chat_id(&self, channel_id: &str) -> Result<Option<String>> {
        let resp: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", "id"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        let video_id = match resp.items.into_iter().next().and_then(|i| i.video_id()) {
            Some(id) => id,
            None => return Ok(None),
        };

        let resp: VideoListResponse = self
            .get_json(
                "videos",
                &[("part", "liveStreamingDetails"), ("id", &video_id)],
            )
            .await?;

        Ok(resp
            .items
            .into_iter()
            .next()
            .and_then(|v| v.live_streaming_details)
            .and_then(|d| d.active_live_chat_id))
    }
}

#[async_trait]
impl ChatPlatform for YouTubeClient {
    async fn list_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> Result<ChatPage> {
        let mut query = vec![
            ("liveChatId", live_chat_id),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let resp: LiveChatMessageListResponse =
            self.get_json("liveChat/messages", &query).await?;

        let messages = resp
            .items
            .into_iter()
            .filter_map(|item| {
                let text = item.snippet.display_message?;
                Some(ChatMessage {
                    author_display_name: item.author_details.display_name,
                    author_channel_id: item.author_details.channel_id,
                    text,
                    published_at: item.snippet.published_at,
                })
            })
            .collect();

        Ok(ChatPage {
            messages,
            next_page_token: resp.next_page_token,
        })
    }

    async fn send_message(&self, live_chat_id: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "snippet": {
                "liveChatId": live_chat_id,
                "type": "textMessageEvent",
                "textMessageDetails": { "messageText": text },
            }
        });

        let url = format!("{API_BASE}/liveChat/messages");
        let response = self
            .client
            .post(&url)
            .query(&[("part", "snippet")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send chat message")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("YouTube API error ({}): {}", status, error_body);
        }

        Ok(())
    }
}

// ── API response shapes ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: Option<ChannelStatistics>,
}

impl ChannelItem {
    fn into_info(self) -> ChannelInfo {
        let subscriber_count = self
            .statistics
            .and_then(|s| s.subscriber_count)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        ChannelInfo {
            id: self.id,
            title: self.snippet.title,
            subscriber_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    // The API returns counts as strings.
    subscriber_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: Option<SearchItemId>,
    #[serde(default)]
    snippet: Option<SearchSnippet>,
}

impl SearchItem {
    fn channel_id(self) -> Option<String> {
        self.snippet.and_then(|s| s.channel_id)
    }

    fn video_id(self) -> Option<String> {
        self.id.and_then(|i| i.video_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageListResponse {
    #[serde(default)]
    items: Vec<LiveChatMessageItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageItem {
    snippet: LiveChatMessageSnippet,
    author_details: AuthorDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageSnippet {
    display_message: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    display_name: String,
    channel_id: String,
}
