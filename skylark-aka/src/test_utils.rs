// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic fixtures wiring the three roles together.
use skylark_core::{DeviceId, ManualClock, RelayId, Supi};

use crate::message::AssistedAuthReply;
use crate::{Anchor, AnchorConfig, Device, LongTermKey, Relay, Rng};

/// Installs a `RUST_LOG`-controlled subscriber for test debugging; safe to
/// call from every test.
#[cfg(test)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// One anchor with a seeded random source and a manually driven clock.
pub struct TestNetwork {
    pub anchor: Anchor,
    pub clock: ManualClock,
    pub rng: Rng,
}

pub fn network() -> TestNetwork {
    network_with_seed([7; 32])
}

/// Distinct seeds yield anchors with distinct key material, for scenarios
/// spanning more than one network.
pub fn network_with_seed(seed: [u8; 32]) -> TestNetwork {
    let rng = Rng::from_seed(seed);
    let anchor = Anchor::new(AnchorConfig::default(), &rng).expect("anchor setup");
    TestNetwork {
        anchor,
        clock: ManualClock::new(1_700_000_000),
        rng,
    }
}

/// Provisions a relay and runs service authentication to completion.
pub fn authenticated_relay(net: &mut TestNetwork, id: u64, passphrase: &str) -> Relay {
    let relay_id = RelayId::new(id);
    let key = LongTermKey::from_passphrase(passphrase);
    net.anchor.provision_relay(relay_id, key.clone());
    let serving_network = net.anchor.config().serving_network.clone();
    let mut relay = Relay::new(relay_id, key, serving_network);

    let challenge = net
        .anchor
        .initiate_relay_authentication(relay_id, &net.rng)
        .expect("relay challenge");
    let confirmation = relay.receive_auth_challenge(challenge).expect("relay confirmation");
    net.anchor
        .receive_relay_confirmation(confirmation)
        .expect("relay authorization");
    relay
}

/// Provisions a device subscription on both sides.
pub fn provisioned_device(net: &mut TestNetwork, supi: &str, passphrase: &str) -> Device {
    let supi = Supi::from(supi);
    let key = LongTermKey::from_passphrase(passphrase);
    net.anchor.provision_device(supi.clone(), key.clone());
    Device::new(
        supi,
        key,
        net.anchor.config().amf,
        net.anchor.config().serving_network.clone(),
        net.anchor.encapsulation_key(),
    )
}

/// Runs one full assisted authentication round trip, delivering the reply to
/// the device when it was accepted.
pub fn connect(
    net: &mut TestNetwork,
    relay: &mut Relay,
    device: &mut Device,
    device_id: u64,
) -> AssistedAuthReply {
    let suci = device.initiate_connection(&net.rng).expect("connection attempt");
    let request = relay
        .receive_connection_request(DeviceId::new(device_id), suci)
        .expect("request forwarding");
    let reply = net
        .anchor
        .process_device_auth_request(request, &net.clock, &net.rng)
        .expect("anchor processing");
    let reply = relay.receive_device_auth_reply(reply).expect("reply forwarding");
    if let AssistedAuthReply::Accepted(response) = &reply {
        device
            .handle_assisted_auth_response(response.clone(), &net.clock)
            .expect("device verification");
    }
    reply
}
