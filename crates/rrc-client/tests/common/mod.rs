//! Shared harness for client integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rmpv::Value;
use rrc_client::testing::{MockIdentity, MockSession, MockTransport};
use rrc_client::{Callbacks, Client, ClientConfig, SessionHandler};
use rrc_core::{
    DestinationHash, Envelope, IdentityHash, MessageType, ResourceAnnouncement, ResourceKind,
};

pub const HUB_IDENTITY: IdentityHash = IdentityHash::new([0x7e; 16]);
pub const CLIENT_IDENTITY: [u8; 16] = [0x11; 16];

pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub client: Client,
    pub hub: DestinationHash,
    pub events: Arc<Events>,
}

impl Harness {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, MockTransport::new())
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<MockTransport>) -> Self {
        rrc_client::logging::init_for_tests();
        let hub = transport.add_hub(&config.dest_name, HUB_IDENTITY);
        let client = Client::new(
            transport.clone(),
            MockIdentity::new(CLIENT_IDENTITY),
            config,
        )
        .unwrap();
        let events = Arc::new(Events::default());
        client.set_callbacks(events.callbacks());
        Self {
            transport,
            client,
            hub,
            events,
        }
    }

    /// Connect without waiting for WELCOME and report the session as
    /// established.
    pub async fn connected(config: ClientConfig) -> Self {
        let h = Self::new(config);
        h.client
            .connect(h.hub, false, Duration::from_secs(5))
            .await
            .unwrap();
        h.handler().on_established();
        // Let the HELLO task identify and send its first attempt.
        tokio::time::sleep(Duration::from_millis(10)).await;
        h
    }

    pub fn handler(&self) -> Arc<dyn SessionHandler> {
        self.transport.handler().expect("no session opened")
    }

    pub fn session(&self) -> Arc<MockSession> {
        self.transport.session().expect("no session opened")
    }

    pub fn deliver(&self, env: &Envelope) {
        self.handler().on_frame(&env.encode().unwrap());
    }

    /// Frames the client sent of one type.
    pub fn sent_of(&self, msg_type: MessageType) -> Vec<Envelope> {
        self.session()
            .sent_envelopes()
            .into_iter()
            .filter(|e| e.msg_type == msg_type)
            .collect()
    }
}

pub fn hub_frame(msg_type: MessageType) -> Envelope {
    Envelope::new(msg_type, &HUB_IDENTITY)
}

pub fn welcome() -> Envelope {
    hub_frame(MessageType::Welcome).with_body(Value::Map(vec![
        (Value::from(0u64), Value::from("test-hub")),
        (Value::from(1u64), Value::from("1.0")),
        (Value::from(2u64), Value::from("hello")),
    ]))
}

pub fn announcement(
    id: &[u8],
    kind: ResourceKind,
    size: u64,
    sha256: Option<[u8; 32]>,
    encoding: Option<&str>,
) -> Envelope {
    let body = ResourceAnnouncement {
        id: id.to_vec(),
        kind,
        size,
        sha256,
        encoding: encoding.map(str::to_owned),
    };
    hub_frame(MessageType::ResourceEnvelope).with_body(body.to_value())
}

/// Every callback invocation, recorded.
#[derive(Default)]
pub struct Events {
    pub welcomes: Mutex<Vec<Envelope>>,
    pub messages: Mutex<Vec<Envelope>>,
    pub notices: Mutex<Vec<Envelope>>,
    pub errors: Mutex<Vec<Envelope>>,
    pub joined: Mutex<Vec<Envelope>>,
    pub parted: Mutex<Vec<Envelope>>,
    pub pongs: Mutex<Vec<Envelope>>,
    pub warnings: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
}

impl Events {
    pub fn callbacks(self: &Arc<Self>) -> Callbacks {
        let warnings = Arc::clone(self);
        let closes = Arc::clone(self);
        Callbacks::new()
            .on_welcome(recorder(Arc::clone(self), |e| &e.welcomes))
            .on_message(recorder(Arc::clone(self), |e| &e.messages))
            .on_notice(recorder(Arc::clone(self), |e| &e.notices))
            .on_error(recorder(Arc::clone(self), |e| &e.errors))
            .on_joined(recorder(Arc::clone(self), |e| &e.joined))
            .on_parted(recorder(Arc::clone(self), |e| &e.parted))
            .on_pong(recorder(Arc::clone(self), |e| &e.pongs))
            .on_resource_warning(move |text| warnings.warnings.lock().unwrap().push(text.to_owned()))
            .on_close(move || {
                closes.closes.fetch_add(1, Ordering::SeqCst);
            })
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn notices(&self) -> Vec<Envelope> {
        self.notices.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Envelope> {
        self.messages.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

fn recorder(
    events: Arc<Events>,
    slot: fn(&Events) -> &Mutex<Vec<Envelope>>,
) -> impl Fn(&Envelope) + Send + Sync + 'static {
    move |env: &Envelope| slot(&events).lock().unwrap().push(env.clone())
}
