// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario tests exercising the three phases end to end.
use skylark_core::{Clock, DeviceId, RelayId, Supi};

use crate::message::{AssistedAuthReply, DeviceAuthReply, RelayConfirmation};
use crate::test_utils::{
    authenticated_relay, connect, init_logging, network, network_with_seed, provisioned_device,
};
use crate::{AnchorError, Device, DeviceError, DeviceState, LongTermKey, RelayError, RelayPhase};

#[test]
fn relay_service_authentication() {
    let mut net = network();
    let relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");

    let relay_id = RelayId::new(1);
    assert_eq!(net.anchor.relay_phase(relay_id), Some(RelayPhase::Authorized));
    assert_eq!(relay.tid(), net.anchor.relay_tid(relay_id));
    assert!(net.anchor.relay_session_key(relay_id).is_some());
}

#[test]
fn relay_rejects_forged_anchor() {
    let mut net = network();
    let relay_id = RelayId::new(1);
    net.anchor
        .provision_relay(relay_id, LongTermKey::from_passphrase("UAV_KEY_1"));
    let mut relay = crate::Relay::new(
        relay_id,
        LongTermKey::from_passphrase("UAV_KEY_2"),
        net.anchor.config().serving_network.clone(),
    );

    let challenge = net
        .anchor
        .initiate_relay_authentication(relay_id, &net.rng)
        .unwrap();
    assert!(matches!(
        relay.receive_auth_challenge(challenge),
        Err(RelayError::AnchorAuthenticationFailed)
    ));
    assert_eq!(relay.tid(), None);
}

#[test]
fn relay_confirmation_requires_pending_challenge() {
    let mut net = network();
    assert!(matches!(
        net.anchor.receive_relay_confirmation(RelayConfirmation {
            relay_id: RelayId::new(99),
        }),
        Err(AnchorError::NoPendingAuthentication(_))
    ));
}

// Pins the protocol as designed: the confirmation carries no proof, so the
// anchor authorizes any confirmation naming a challenged relay, even when
// the challenge never reached it.
#[test]
fn relay_confirmation_is_taken_on_trust() {
    let mut net = network();
    let relay_id = RelayId::new(1);
    net.anchor
        .provision_relay(relay_id, LongTermKey::from_passphrase("UAV_KEY_1"));
    let _dropped_challenge = net
        .anchor
        .initiate_relay_authentication(relay_id, &net.rng)
        .unwrap();

    net.anchor
        .receive_relay_confirmation(RelayConfirmation { relay_id })
        .unwrap();
    assert_eq!(net.anchor.relay_phase(relay_id), Some(RelayPhase::Authorized));
}

#[test]
fn assisted_authentication_happy_path() {
    init_logging();
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");

    let reply = connect(&mut net, &mut relay, &mut device, 1);
    assert!(matches!(reply, AssistedAuthReply::Accepted(_)));

    assert_eq!(device.state(), DeviceState::Connected);
    let tid = device.temporary_id().unwrap();
    assert!(relay.is_serving(&tid));
    assert_eq!(device.relay_tid(), relay.tid());
    // Both ends of the device↔relay link hold the same session key.
    assert_eq!(device.session_key(), relay.device_key(&tid));

    assert_eq!(
        net.anchor.last_accepted_sqn(&Supi::from("imsi-001")).unwrap(),
        1
    );
    let token = device.token().unwrap();
    assert_eq!(token.expires_at(), net.clock.now() + 3600);
}

#[test]
fn pending_relay_cannot_forward_device_authentication() {
    let mut net = network();
    let relay_id = RelayId::new(1);
    let key = LongTermKey::from_passphrase("UAV_KEY_1");
    net.anchor.provision_relay(relay_id, key.clone());
    let mut relay = crate::Relay::new(relay_id, key, net.anchor.config().serving_network.clone());
    let challenge = net
        .anchor
        .initiate_relay_authentication(relay_id, &net.rng)
        .unwrap();
    // The relay verifies the challenge, but the confirmation never reaches
    // the anchor.
    relay.receive_auth_challenge(challenge).unwrap();

    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    let suci = device.initiate_connection(&net.rng).unwrap();
    let request = relay
        .receive_connection_request(DeviceId::new(1), suci)
        .unwrap();
    assert!(matches!(
        net.anchor.process_device_auth_request(request, &net.clock, &net.rng),
        Err(AnchorError::UnauthorizedRelay(_))
    ));
}

#[test]
fn replayed_request_triggers_sync_failure_without_moving_baseline() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    let supi = Supi::from("imsi-001");

    let suci = device.initiate_connection(&net.rng).unwrap();
    let request = relay
        .receive_connection_request(DeviceId::new(1), suci)
        .unwrap();
    let replayed = request.clone();

    let reply = net
        .anchor
        .process_device_auth_request(request, &net.clock, &net.rng)
        .unwrap();
    assert!(matches!(reply, DeviceAuthReply::Accepted(_)));
    assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 1);

    // Replaying the identical request is rejected as stale, twice over, and
    // the baseline never moves.
    for _ in 0..2 {
        let reply = net
            .anchor
            .process_device_auth_request(replayed.clone(), &net.clock, &net.rng)
            .unwrap();
        assert!(matches!(reply, DeviceAuthReply::SyncFailure(_)));
        assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 1);
    }
}

#[test]
fn tampered_mac_is_rejected_and_recoverable() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    let supi = Supi::from("imsi-001");

    let mut suci = device.initiate_connection(&net.rng).unwrap();
    suci.mac[0] ^= 0x01;
    let request = relay
        .receive_connection_request(DeviceId::new(1), suci)
        .unwrap();
    let reply = net
        .anchor
        .process_device_auth_request(request, &net.clock, &net.rng)
        .unwrap();
    assert!(matches!(reply, DeviceAuthReply::MacFailure));
    assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 0);

    device.handle_mac_failure().unwrap();
    assert_eq!(device.state(), DeviceState::Failed);

    // A fresh, untampered attempt from the failed state succeeds.
    let reply = connect(&mut net, &mut relay, &mut device, 1);
    assert!(matches!(reply, AssistedAuthReply::Accepted(_)));
    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 2);
}

#[test]
fn unknown_subscription_is_indistinguishable_from_mac_failure() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut stranger = Device::new(
        Supi::from("imsi-999"),
        LongTermKey::from_passphrase("UE_KEY_X"),
        net.anchor.config().amf,
        net.anchor.config().serving_network.clone(),
        net.anchor.encapsulation_key(),
    );

    let reply = connect(&mut net, &mut relay, &mut stranger, 9);
    assert!(matches!(reply, AssistedAuthReply::MacFailure));
}

#[test]
fn restarted_device_resynchronises_and_reconnects() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    let supi = Supi::from("imsi-001");

    // Several sessions move the anchor's baseline ahead.
    for _ in 0..3 {
        let reply = connect(&mut net, &mut relay, &mut device, 1);
        assert!(matches!(reply, AssistedAuthReply::Accepted(_)));
    }
    assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 3);

    // A restarted device loses its counter and presents a stale value.
    let mut restarted = Device::new(
        supi.clone(),
        LongTermKey::from_passphrase("UE_KEY_1"),
        net.anchor.config().amf,
        net.anchor.config().serving_network.clone(),
        net.anchor.encapsulation_key(),
    );
    let reply = connect(&mut net, &mut relay, &mut restarted, 1);
    let auts = match reply {
        AssistedAuthReply::SyncFailure(auts) => auts,
        other => panic!("expected sync failure, got {other:?}"),
    };

    restarted.handle_sync_failure(auts).unwrap();
    assert_eq!(restarted.state(), DeviceState::Idle);
    assert_eq!(restarted.sqn(), 3);

    // The retry advances past the adopted baseline and succeeds.
    let reply = connect(&mut net, &mut relay, &mut restarted, 1);
    assert!(matches!(reply, AssistedAuthReply::Accepted(_)));
    assert_eq!(restarted.state(), DeviceState::Connected);
    assert_eq!(net.anchor.last_accepted_sqn(&supi).unwrap(), 4);
}

#[test]
fn handover_between_relays() {
    init_logging();
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut target = authenticated_relay(&mut net, 2, "UAV_KEY_2");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);
    let device_tid = device.temporary_id().unwrap();

    let request = device
        .initiate_handover(target.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    let challenge = target
        .receive_handover_request(request, &net.clock, &net.rng)
        .unwrap();
    let confirm = device.handle_handover_challenge(challenge).unwrap();
    let inform = target.receive_handover_confirm(device_tid, confirm).unwrap();
    net.anchor.receive_handover_inform(inform, &net.clock);
    assert!(source.release(&device_tid));

    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(device.relay_tid(), target.tid());
    assert_eq!(device.session_key(), target.device_key(&device_tid));
    assert!(!source.is_serving(&device_tid));

    let log: Vec<_> = net.anchor.handover_log().collect();
    assert_eq!(
        log,
        vec![(target.tid().unwrap(), device_tid, net.clock.now())]
    );
}

#[test]
fn expired_token_blocks_handover() {
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut target = authenticated_relay(&mut net, 2, "UAV_KEY_2");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);
    let expires_at = device.token().unwrap().expires_at();

    // The expiry second itself is already too late.
    net.clock.set(expires_at);
    assert!(matches!(
        device.initiate_handover(target.tid().unwrap(), &net.clock, &net.rng),
        Err(DeviceError::TokenExpired)
    ));
    assert_eq!(device.state(), DeviceState::Connected);

    // A request minted just in time can still expire in flight; the target
    // relay applies the same boundary.
    net.clock.set(expires_at - 1);
    let request = device
        .initiate_handover(target.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    net.clock.set(expires_at);
    assert!(matches!(
        target.receive_handover_request(request, &net.clock, &net.rng),
        Err(RelayError::TokenExpired { .. })
    ));
}

#[test]
fn rejected_handover_can_be_abandoned() {
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut target = authenticated_relay(&mut net, 2, "UAV_KEY_2");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);
    let device_tid = device.temporary_id().unwrap();
    let expires_at = device.token().unwrap().expires_at();

    // The token expires while the request is in flight; the target rejects
    // it and the device is left mid-handover.
    net.clock.set(expires_at - 1);
    let request = device
        .initiate_handover(target.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    net.clock.set(expires_at);
    assert!(matches!(
        target.receive_handover_request(request, &net.clock, &net.rng),
        Err(RelayError::TokenExpired { .. })
    ));
    assert_eq!(device.state(), DeviceState::Handover);
    assert!(matches!(
        device.initiate_connection(&net.rng),
        Err(DeviceError::InvalidState(DeviceState::Handover))
    ));

    // Abandoning the attempt restores the existing relay link untouched.
    device.abandon_handover().unwrap();
    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(device.relay_tid(), source.tid());
    assert_eq!(device.session_key(), source.device_key(&device_tid));

    // From there a fresh connection (and with it a fresh token) is possible.
    let reply = connect(&mut net, &mut source, &mut device, 1);
    assert!(matches!(reply, AssistedAuthReply::Accepted(_)));
}

#[test]
fn foreign_relay_cannot_verify_handover_token() {
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);

    // A relay serving a different anchor holds a different group key and
    // cannot recompute the token's temporary group key.
    let mut foreign_net = network_with_seed([8; 32]);
    let mut foreign = authenticated_relay(&mut foreign_net, 7, "UAV_KEY_7");

    let request = device
        .initiate_handover(foreign.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    assert!(matches!(
        foreign.receive_handover_request(request, &net.clock, &net.rng),
        Err(RelayError::HandoverTokenInvalid)
    ));
}

#[test]
fn tampered_handover_challenge_reverts_to_current_relay() {
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut target = authenticated_relay(&mut net, 2, "UAV_KEY_2");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);
    let device_tid = device.temporary_id().unwrap();

    let request = device
        .initiate_handover(target.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    let mut challenge = target
        .receive_handover_request(request, &net.clock, &net.rng)
        .unwrap();
    challenge.hres[0] ^= 0x01;

    assert!(matches!(
        device.handle_handover_challenge(challenge),
        Err(DeviceError::HandoverRejected)
    ));
    // The device stays on its current relay as if nothing happened.
    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(device.relay_tid(), source.tid());
    assert_eq!(device.session_key(), source.device_key(&device_tid));
}

#[test]
fn mismatched_handover_confirmation_discards_pending_state() {
    let mut net = network();
    let mut source = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut target = authenticated_relay(&mut net, 2, "UAV_KEY_2");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut source, &mut device, 1);
    let device_tid = device.temporary_id().unwrap();

    let request = device
        .initiate_handover(target.tid().unwrap(), &net.clock, &net.rng)
        .unwrap();
    let challenge = target
        .receive_handover_request(request, &net.clock, &net.rng)
        .unwrap();
    let mut confirm = device.handle_handover_challenge(challenge).unwrap();
    confirm.xres[0] ^= 0x01;

    assert!(matches!(
        target.receive_handover_confirm(device_tid, confirm.clone()),
        Err(RelayError::HandoverMismatch)
    ));
    // The pending state was consumed; even a correct confirmation is now
    // too late.
    confirm.xres[0] ^= 0x01;
    assert!(matches!(
        target.receive_handover_confirm(device_tid, confirm),
        Err(RelayError::NoPendingHandover(_))
    ));
    assert!(!target.is_serving(&device_tid));
}

#[test]
fn disconnect_and_reconnect() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut relay, &mut device, 1);

    device.disconnect();
    assert_eq!(device.state(), DeviceState::Idle);
    assert_eq!(device.temporary_id(), None);

    // The sequence counter survives the disconnect.
    let reply = connect(&mut net, &mut relay, &mut device, 1);
    assert!(matches!(reply, AssistedAuthReply::Accepted(_)));
    assert_eq!(device.sqn(), 2);
}

#[test]
fn reconnecting_abandons_current_session() {
    let mut net = network();
    let mut relay = authenticated_relay(&mut net, 1, "UAV_KEY_1");
    let mut device = provisioned_device(&mut net, "imsi-001", "UE_KEY_1");
    connect(&mut net, &mut relay, &mut device, 1);
    assert!(device.temporary_id().is_some());

    device.initiate_connection(&net.rng).unwrap();
    assert_eq!(device.state(), DeviceState::Connecting);
    assert_eq!(device.temporary_id(), None);

    // An attempt already in flight must conclude first.
    assert!(matches!(
        device.initiate_connection(&net.rng),
        Err(DeviceError::InvalidState(DeviceState::Connecting))
    ));
}
