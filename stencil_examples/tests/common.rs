use stencil_core::prelude::*;
use stencil_examples::messages::MessagesApi;
use stencil_test_support::*;

#[allow(unused)]
pub const HOST: &str = "api.example.com";

#[allow(unused)]
pub fn client_with(config: ClientConfig, replies: Vec<MockReply>) -> (RestClient<MockTransport>, MockHandle) {
    let (transport, handle) = mock().replies(replies).build();
    let client = RestClient::with_transport(config, transport)
        .unwrap()
        .with_debug_sink(NoopDebugSink);
    (client, handle)
}

#[allow(unused)]
pub fn client(replies: Vec<MockReply>) -> (RestClient<MockTransport>, MockHandle) {
    client_with(ClientConfig::https(HOST), replies)
}

#[allow(unused)]
pub fn messages_api(replies: Vec<MockReply>) -> (MessagesApi<MockTransport>, MockHandle) {
    let (client, handle) = client(replies);
    (MessagesApi::with_client(client), handle)
}
