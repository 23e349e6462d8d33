//! reqwest implementation of [`MailApi`]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::MailApi;
use crate::alias::{AliasKind, AliasList};
use crate::config::ServerConfig;
use crate::error::{Mail3Error, Mail3Result};
use crate::mailbox::Mailbox;
use crate::message::{FlagAction, MessageDetail, MessageFlag, MessageSummary, MessageText};
use crate::types::{CommunityMessage, Cursor, Page, ProfileUpdate, Subscriber, UploadedImage, UserInfo};

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    #[serde(default)]
    avatar: String,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    eth_address: String,
}

/// HTTP client for the Mail3 REST API
#[derive(Debug, Clone)]
pub struct HttpMailApi {
    client: Client,
    base_url: Url,
}

impl HttpMailApi {
    /// Build a client for the server described by `config`
    pub fn new(config: &ServerConfig) -> Mail3Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Mail3Error::config("Bearer token contains invalid characters"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Mail3Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Mail3Error::config(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn page_query(cursor: Option<&Cursor>, count: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("count", count.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        query
    }

    async fn send(&self, request: RequestBuilder) -> Mail3Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Mail3Error::from_response(status.as_u16(), &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Mail3Result<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.get(url).query(query)).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MailApi for HttpMailApi {
    async fn mailbox_messages(
        &self,
        mailbox: Mailbox,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<MessageSummary>> {
        self.get_json(&["mailbox", mailbox.as_str()], &Self::page_query(cursor, count))
            .await
    }

    async fn message_detail(&self, id: &str) -> Mail3Result<MessageDetail> {
        self.get_json(&["mailbox", "account", "message", id], &[]).await
    }

    async fn message_text(&self, text_id: &str) -> Mail3Result<MessageText> {
        self.get_json(&["mailbox", "account", "text", text_id], &[]).await
    }

    async fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Mail3Result<Vec<u8>> {
        let url = self.endpoint(&["mailbox", "account", "message", message_id, "attachment", attachment_id])?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn flag_message(&self, id: &str, action: FlagAction, flags: &[MessageFlag]) -> Mail3Result<()> {
        let url = self.endpoint(&["mailbox", "account", "message", id, "flags"])?;
        let body = json!({ "action": action, "flags": flags });
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_message(&self, id: &str, permanent: bool) -> Mail3Result<()> {
        let url = self.endpoint(&["mailbox", "account", "message", id])?;
        let request = self.client.delete(url).query(&[("force", permanent)]);
        self.send(request).await?;
        Ok(())
    }

    async fn batch_delete(&self, ids: &[String]) -> Mail3Result<()> {
        let url = self.endpoint(&["mailbox", "account", "messages", "batch_delete"])?;
        self.send(self.client.post(url).json(&json!({ "uuids": ids }))).await?;
        Ok(())
    }

    async fn move_message(&self, id: &str, mailbox: Mailbox) -> Mail3Result<()> {
        let url = self.endpoint(&["mailbox", "account", "message", id, "move"])?;
        self.send(self.client.put(url).json(&json!({ "mailbox": mailbox })))
            .await?;
        Ok(())
    }

    async fn aliases(&self) -> Mail3Result<AliasList> {
        self.get_json(&["account", "aliases"], &[]).await
    }

    async fn set_default_alias(&self, uuid: &str) -> Mail3Result<()> {
        let url = self.endpoint(&["account", "default_sent_address"])?;
        self.send(self.client.put(url).json(&json!({ "uuid": uuid }))).await?;
        Ok(())
    }

    async fn refresh_aliases(&self, kind: AliasKind) -> Mail3Result<()> {
        let segment = match kind {
            AliasKind::EnsLike => "ens",
            AliasKind::BitLike => "bit",
            other => {
                return Err(Mail3Error::validation(format!("{other} aliases cannot be refreshed")))
            }
        };
        let url = self.endpoint(&["account", "aliases", segment])?;
        self.send(self.client.put(url)).await?;
        Ok(())
    }

    async fn user_info(&self) -> Mail3Result<UserInfo> {
        self.get_json(&["account", "settings"], &[]).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Mail3Result<()> {
        let url = self.endpoint(&["account", "profile"])?;
        self.send(self.client.put(url).json(update)).await?;
        Ok(())
    }

    async fn upload_image(&self, filename: &str, bytes: Vec<u8>) -> Mail3Result<UploadedImage> {
        let url = self.endpoint(&["upload", "image"])?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.send(self.client.post(url).multipart(form)).await?;
        Ok(response.json().await?)
    }

    async fn community_messages(
        &self,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<CommunityMessage>> {
        self.get_json(&["community", "messages"], &Self::page_query(cursor, count))
            .await
    }

    async fn community_subscribers(&self, cursor: Option<&Cursor>, count: u32) -> Mail3Result<Page<Subscriber>> {
        self.get_json(&["community", "subscribers"], &Self::page_query(cursor, count))
            .await
    }

    async fn avatar(&self, address: &str) -> Mail3Result<String> {
        let response: AvatarResponse = self.get_json(&["avatar", address], &[]).await?;
        Ok(response.avatar)
    }

    async fn primitive_address(&self, domain: &str) -> Mail3Result<String> {
        let response: AddressResponse = self.get_json(&["addresses", domain], &[]).await?;
        Ok(response.eth_address)
    }
}
