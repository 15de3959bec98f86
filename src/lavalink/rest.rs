//! Lavalink REST client.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serenity::model::id::GuildId;
use tracing::debug;

use super::model::{ErrorResponse, LoadResult, UpdatePlayer};
use crate::config::LavalinkConfig;
use crate::player::BackendError;

/// Thin wrapper over the v4 REST endpoints the bot uses.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    password: String,
}

impl RestClient {
    /// Creates a REST client for a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LavalinkConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .user_agent(super::CLIENT_NAME)
            .build()?;

        Ok(Self {
            http,
            base_url: config.rest_url(),
            password: config.password.clone(),
        })
    }

    /// Loads tracks for an identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the node rejects it.
    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, BackendError> {
        debug!("Loading tracks: {}", identifier);

        let response = self
            .http
            .get(format!("{}/v4/loadtracks", self.base_url))
            .header(AUTHORIZATION, &self.password)
            .query(&[("identifier", identifier)])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Creates or updates the player of a guild.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the node rejects it.
    pub async fn update_player(
        &self,
        session_id: &str,
        guild_id: GuildId,
        update: &UpdatePlayer,
    ) -> Result<(), BackendError> {
        let response = self
            .http
            .patch(self.player_url(session_id, guild_id))
            .header(AUTHORIZATION, &self.password)
            .query(&[("noReplace", "false")])
            .json(update)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Destroys the player of a guild. A missing player is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the node rejects it.
    pub async fn destroy_player(&self, session_id: &str, guild_id: GuildId) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.player_url(session_id, guild_id))
            .header(AUTHORIZATION, &self.password)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No player to destroy for guild {}", guild_id);
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    fn player_url(&self, session_id: &str, guild_id: GuildId) -> String {
        format!(
            "{}/v4/sessions/{session_id}/players/{guild_id}",
            self.base_url
        )
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Turns a non-success response into [`BackendError::Api`].
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| if e.message.is_empty() { e.error } else { e.message })
        .unwrap_or(body);

    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(&LavalinkConfig {
            host: "lavalink".to_owned(),
            port: 2333,
            password: "pw".to_owned(),
        })
        .unwrap()
    }

    #[test]
    fn test_player_url() {
        assert_eq!(
            client().player_url("sess", GuildId::new(99)),
            "http://lavalink:2333/v4/sessions/sess/players/99"
        );
    }

    #[test]
    fn test_debug_hides_password() {
        assert!(!format!("{:?}", client()).contains("pw"));
    }
}
