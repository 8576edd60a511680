//! Typed wrapper over a small messaging API, written the way an endpoint
//! definition layer would drive the template engine: one raw template per
//! operation, static query baked into the template, runtime values bound per call.

use http::StatusCode;
use stencil_core::prelude::*;

pub mod models {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Message {
        pub id: String,
        pub sender: String,
        pub text: String,
        #[serde(rename = "createdAt", default)]
        pub created_at: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct NewMessage {
        pub sender: String,
        pub text: String,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct MessagePage {
        pub items: Vec<Message>,
        #[serde(rename = "nextToken", default)]
        pub next_token: Option<String>,
    }
}

use models::{Message, MessagePage, NewMessage};

pub const GET_MESSAGE: &str = "/apis/v1/messages/{message}?Action=GetMessage&Version=2020-01-01";
pub const DELETE_MESSAGE: &str = "/apis/v1/messages/{message}?Action=DeleteMessage&Version=2020-01-01";
pub const MESSAGE_EXISTS: &str = "/apis/v1/messages/{message}";
pub const LIST_MESSAGES: &str =
    "/apis/v1/mailboxes/{mailbox}/messages?Action=ListMessages&Version=2020-01-01";
pub const SEND_MESSAGE: &str =
    "/apis/v1/mailboxes/{mailbox}/messages?Action=SendMessage&Version=2020-01-01";

#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub max_results: Option<u32>,
    pub next_token: Option<String>,
    /// Extra `Filter` values, sent in addition to any baked into the template.
    pub filters: Vec<String>,
}

#[derive(Clone)]
pub struct MessagesApi<T: Transport = ReqwestTransport> {
    client: RestClient<T>,
}

impl MessagesApi<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ApiClientError> {
        Ok(Self::with_client(RestClient::new(config)?))
    }
}

impl<T: Transport> MessagesApi<T> {
    #[inline]
    pub fn with_client(client: RestClient<T>) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &RestClient<T> {
        &self.client
    }

    pub async fn get_message(&self, id: &str) -> Result<Message, ApiClientError> {
        self.client
            .get(GET_MESSAGE)
            .operation("GetMessage")
            .param("message", id)
            .execute::<Json, Message>()
            .await
    }

    pub async fn list_messages(&self, mailbox: &str, opts: &ListOptions) -> Result<MessagePage, ApiClientError> {
        tracing::debug!(mailbox, max_results = ?opts.max_results, "listing messages");
        let mut req = self
            .client
            .get(LIST_MESSAGES)
            .operation("ListMessages")
            .param("mailbox", mailbox)
            .query_opt("MaxResults", opts.max_results)
            .query_opt("NextToken", opts.next_token.as_deref());
        if !opts.filters.is_empty() {
            req = req.query_merge(QueryMerge::Append);
            for f in &opts.filters {
                req = req.query("Filter", f);
            }
        }
        req.execute::<Json, MessagePage>().await
    }

    pub async fn send_message(&self, mailbox: &str, msg: &NewMessage) -> Result<Message, ApiClientError> {
        self.client
            .post(SEND_MESSAGE)
            .operation("SendMessage")
            .param("mailbox", mailbox)
            .json(msg)
            .execute::<Json, Message>()
            .await
    }

    pub async fn delete_message(&self, id: &str) -> Result<(), ApiClientError> {
        self.client
            .delete(DELETE_MESSAGE)
            .operation("DeleteMessage")
            .param("message", id)
            .execute::<NoContent, ()>()
            .await
    }

    /// `HEAD` probe; a 404 means "no such message" rather than an error.
    pub async fn message_exists(&self, id: &str) -> Result<bool, ApiClientError> {
        let res = self
            .client
            .head(MESSAGE_EXISTS)
            .operation("MessageExists")
            .param("message", id)
            .execute::<NoContent, ()>()
            .await;
        match res {
            Ok(()) => Ok(true),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
