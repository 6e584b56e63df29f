//! Stack Exchange chat HTTP client
//!
//! The chat site has no token API: requests ride on login cookies and each
//! state-changing POST carries the page's `fkey`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use seirc_core::ChatUser;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Result, StackError};
use crate::types::{
    PollResponse, PollSection, RoomEventsResponse, RoomThumb, SendResponse, UserThumb, pingable_names,
};

static FKEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="fkey"[^>]*value="([0-9a-fA-F]+)""#).expect("valid regex"));

static ACTIVE_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"id="active-user"[^>]*class="[^"]*\buser-(\d+)"#).expect("valid regex")
});

static RETRY_AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"again in (\d+) seconds?").expect("valid regex"));

/// Attempts for a rate-limited POST before giving up
const MAX_ATTEMPTS: usize = 3;

const USER_AGENT: &str = concat!("seirc/", env!("CARGO_PKG_VERSION"));

/// Chat site client for one login
pub struct StackApi {
    client: Client,
    chat_origin: Url,
    login_origin: Url,
    fkey: RwLock<String>,
}

impl StackApi {
    pub fn new(chat_origin: Url, login_origin: Url) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            chat_origin,
            login_origin,
            fkey: RwLock::new(String::new()),
        })
    }

    pub fn chat_origin(&self) -> &Url {
        &self.chat_origin
    }

    fn chat_url(&self, path: &str) -> Result<Url> {
        Ok(self.chat_origin.join(path)?)
    }

    fn login_url(&self, path: &str) -> Result<Url> {
        Ok(self.login_origin.join(path)?)
    }

    /// Log in with site credentials and return the chat identity
    pub async fn login(&self, email: &str, password: &str) -> Result<ChatUser> {
        let login_url = self.login_url("/users/login")?;

        let page = self.get_text(login_url.clone()).await?;
        let login_fkey = extract_fkey(&page)
            .ok_or_else(|| StackError::Login("login page has no fkey".to_string()))?;

        let response = self
            .client
            .post(login_url)
            .form(&[("fkey", login_fkey.as_str()), ("email", email), ("password", password)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StackError::Login(format!("login rejected ({})", response.status())));
        }

        let chat_page = self.get_text(self.chat_url("/chats/join/favorite")?).await?;
        let user_id = extract_user_id(&chat_page)
            .ok_or_else(|| StackError::Login("bad credentials".to_string()))?;
        let chat_fkey = extract_fkey(&chat_page)
            .ok_or_else(|| StackError::Login("chat page has no fkey".to_string()))?;
        *self.fkey.write().await = chat_fkey;

        let thumb: UserThumb = self
            .get_json(self.chat_url(&format!("/users/thumbs/{}", user_id))?)
            .await?;

        info!(user_id = thumb.id, name = %thumb.name, "Chat login complete");
        Ok(ChatUser::new(thumb.id, thumb.name))
    }

    /// Room id and name, or `RoomNotFound`
    pub async fn room_info(&self, room_id: &str) -> Result<RoomThumb> {
        let url = self.chat_url(&format!("/rooms/thumbs/{}", room_id))?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StackError::RoomNotFound(room_id.to_string()));
        }
        let response = check(response).await?;
        response.json().await.map_err(|e| StackError::Parse(e.to_string()))
    }

    /// Enter a room; returns the event cursor to poll from
    pub async fn join_room(&self, room_id: &str) -> Result<u64> {
        let url = self.chat_url(&format!("/chats/{}/events", room_id))?;
        let form = vec![
            ("since".to_string(), "0".to_string()),
            ("mode".to_string(), "Messages".to_string()),
            ("msgCount".to_string(), "100".to_string()),
        ];

        let response = self.post_form(url, form).await.map_err(|e| match e {
            StackError::Api(msg) if msg.starts_with("403") || msg.starts_with("404") => {
                StackError::AccessDenied(room_id.to_string())
            }
            other => other,
        })?;

        let body: RoomEventsResponse =
            response.json().await.map_err(|e| StackError::Parse(e.to_string()))?;
        debug!(room_id = %room_id, cursor = body.time, "Joined room");
        Ok(body.time)
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<()> {
        let url = self.chat_url(&format!("/chats/leave/{}", room_id))?;
        self.post_form(url, vec![("quiet".to_string(), "true".to_string())]).await?;
        Ok(())
    }

    /// Display names of users a mention in `room_id` would reach
    pub async fn pingable(&self, room_id: &str) -> Result<Vec<String>> {
        let body: Vec<serde_json::Value> = self
            .get_json(self.chat_url(&format!("/rooms/pingable/{}", room_id))?)
            .await?;
        Ok(pingable_names(&body))
    }

    /// Post a message; returns its id
    pub async fn send_message(&self, room_id: &str, text: &str) -> Result<u64> {
        let url = self.chat_url(&format!("/chats/{}/messages/new", room_id))?;
        let response = self.post_form(url, vec![("text".to_string(), text.to_string())]).await?;

        let body: SendResponse = response.json().await.map_err(|e| StackError::Parse(e.to_string()))?;
        debug!(room_id = %room_id, message_id = body.id, "Message posted");
        Ok(body.id)
    }

    pub async fn edit_message(&self, message_id: u64, text: &str) -> Result<()> {
        let url = self.chat_url(&format!("/messages/{}", message_id))?;
        let response = self.post_form(url, vec![("text".to_string(), text.to_string())]).await?;

        let body = response.text().await?;
        if body.trim().trim_matches('"') != "ok" {
            return Err(StackError::Api(format!("edit of {} refused: {}", message_id, body)));
        }
        Ok(())
    }

    /// Events in `room_id` after `cursor`
    pub async fn poll(&self, room_id: &str, cursor: u64) -> Result<PollSection> {
        let url = self.chat_url("/events")?;
        let key = format!("r{}", room_id);
        let response = self.post_form(url, vec![(key.clone(), cursor.to_string())]).await?;

        let mut body: PollResponse = response.json().await.map_err(|e| StackError::Parse(e.to_string()))?;
        Ok(body.remove(&key).unwrap_or_default())
    }

    pub async fn logout(&self) -> Result<()> {
        let url = self.login_url("/users/logout")?;
        let fkey = self.fkey.read().await.clone();
        let response = self
            .client
            .post(url)
            .form(&[("fkey", fkey.as_str()), ("returnUrl", "/")])
            .send()
            .await?;
        check(response).await?;
        info!("Logged out of chat");
        Ok(())
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = check(self.client.get(url).send().await?).await?;
        response.json().await.map_err(|e| StackError::Parse(e.to_string()))
    }

    /// POST a form with the session fkey, waiting out rate limits
    async fn post_form(&self, url: Url, mut form: Vec<(String, String)>) -> Result<Response> {
        form.push(("fkey".to_string(), self.fkey.read().await.clone()));

        let mut attempt = 1;
        loop {
            let response = self.client.post(url.clone()).form(&form).send().await?;

            match check(response).await {
                Err(StackError::RateLimited(secs)) if attempt < MAX_ATTEMPTS => {
                    warn!(url = %url, "Rate limited, retrying in {}s", secs);
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Pass through successful responses; turn the rest into errors
async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::CONFLICT {
        if let Some(secs) = retry_after(&body) {
            return Err(StackError::RateLimited(secs));
        }
    }

    error!("Chat API error: {} - {}", status, body);
    Err(StackError::Api(format!("{} - {}", status.as_u16(), body)))
}

fn retry_after(body: &str) -> Option<u64> {
    RETRY_AFTER_RE.captures(body)?.get(1)?.as_str().parse().ok()
}

fn extract_fkey(html: &str) -> Option<String> {
    FKEY_RE.captures(html).map(|caps| caps[1].to_string())
}

fn extract_user_id(html: &str) -> Option<u64> {
    ACTIVE_USER_RE.captures(html)?.get(1)?.as_str().parse().ok()
}
