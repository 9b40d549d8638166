//! End-to-end tests for the pairing state machine
//!
//! Each test drives a session through its public API with fake scanner and
//! transport collaborators and a shared in-memory registration store.

use std::sync::Arc;
use std::time::Duration;

use acinfinity_core::{
    AbortReason, DeviceAddress, DeviceModel, EmptyScanPolicy, MemoryRegistrationStore,
    PairingError, PairingState, RegistrationRecord, RegistrationStore, ScanError, SessionEntry,
    SessionErrorCode, StepOutcome, TransportErrorKind,
};
use tokio::sync::Notify;

use test_utils::{
    foreign_sighting, payload, session, test_config, vendor_sighting, FakeScanner, FakeTransport,
    ProbeScript,
};

const ADDR: &str = "AA:BB:CC:DD:EE:FF";
const OTHER: &str = "11:22:33:44:55:66";

fn expect_candidates(outcome: StepOutcome) -> (Vec<acinfinity_core::Candidate>, Option<SessionErrorCode>) {
    match outcome {
        StepOutcome::ShowCandidates { candidates, error } => (candidates, error),
        other => panic!("expected candidate list, got {:?}", other),
    }
}

fn registration_for(address: &str) -> RegistrationRecord {
    let identity = acinfinity_core::decode(&payload(DeviceModel::Controller69)).unwrap();
    RegistrationRecord {
        address: DeviceAddress::new(address),
        display_name: identity.name.clone(),
        identity,
    }
}

// ----------------------------------------------------------------------------
// Push Path
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_push_happy_path_registers_device() {
    let scanner = FakeScanner::with_visible(vec![]);
    let transport = FakeTransport::scripted(vec![ProbeScript::Respond(payload(DeviceModel::Controller69))]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let outcome = session
        .start(SessionEntry::Push(vendor_sighting(ADDR, DeviceModel::Controller69)))
        .await
        .unwrap();

    let (candidates, error) = expect_candidates(outcome);
    assert_eq!(session.state(), PairingState::AwaitingSelection);
    assert_eq!(session.title_name(), Some("UIS Controller 69"));
    assert_eq!(error, None);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].label, "UIS Controller 69 (AA:BB:CC:DD:EE:FF)");
    assert_eq!(scanner.scans(), 0);

    let outcome = session.select(&DeviceAddress::new(ADDR)).await.unwrap();
    let record = match outcome {
        StepOutcome::Completed(record) => record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(record.address, DeviceAddress::new(ADDR));
    assert_eq!(record.display_name, "UIS Controller 69");
    assert_eq!(session.state(), PairingState::Done);
    assert_eq!(transport.closed(), 1);
    assert_eq!(store.registrations().await, vec![record]);
}

#[tokio::test]
async fn test_push_for_registered_device_aborts_immediately() {
    let scanner = FakeScanner::with_visible(vec![]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    store.create_registration(registration_for(ADDR)).await.unwrap();
    let mut session = session(test_config(), &scanner, &transport, &store);

    let outcome = session
        .start(SessionEntry::Push(vendor_sighting(ADDR, DeviceModel::Controller69)))
        .await
        .unwrap();

    assert_eq!(outcome, StepOutcome::Aborted(AbortReason::AlreadyConfigured));
    assert_eq!(session.state(), PairingState::Aborted(AbortReason::AlreadyConfigured));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_push_without_vendor_payload_is_not_supported() {
    let scanner = FakeScanner::with_visible(vec![]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let outcome = session
        .start(SessionEntry::Push(foreign_sighting(ADDR)))
        .await
        .unwrap();

    assert_eq!(outcome, StepOutcome::Aborted(AbortReason::NotSupported));
}

#[tokio::test]
async fn test_rescan_unavailable_for_push_sessions() {
    let scanner = FakeScanner::with_visible(vec![]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session
        .start(SessionEntry::Push(vendor_sighting(ADDR, DeviceModel::Controller67)))
        .await
        .unwrap();

    assert!(matches!(session.rescan().await, Err(PairingError::RescanUnavailable)));
    assert_eq!(session.state(), PairingState::AwaitingSelection);
}

// ----------------------------------------------------------------------------
// Manual Path
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_manual_without_vendor_devices_aborts() {
    let scanner = FakeScanner::with_visible(vec![foreign_sighting(ADDR), foreign_sighting(OTHER)]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let outcome = session.start(SessionEntry::Manual).await.unwrap();

    assert_eq!(outcome, StepOutcome::Aborted(AbortReason::NoDevicesFound));
    assert_eq!(session.state(), PairingState::Aborted(AbortReason::NoDevicesFound));
    assert!(matches!(
        session.start(SessionEntry::Manual).await,
        Err(PairingError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_manual_lists_only_unregistered_vendor_devices() {
    let scanner = FakeScanner::with_visible(vec![
        vendor_sighting(ADDR, DeviceModel::Controller69),
        vendor_sighting(OTHER, DeviceModel::Controller69Pro),
        vendor_sighting(OTHER, DeviceModel::Controller69Pro),
        foreign_sighting("22:22:22:22:22:22"),
    ]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    store.create_registration(registration_for(ADDR)).await.unwrap();
    let mut session = session(test_config(), &scanner, &transport, &store);

    let (candidates, _) = expect_candidates(session.start(SessionEntry::Manual).await.unwrap());

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].address, DeviceAddress::new(OTHER));
    assert_eq!(candidates[0].label, "UIS Controller 69 Pro (11:22:33:44:55:66)");

    // Registered devices can't be paired by naming them directly either.
    assert!(matches!(
        session.select(&DeviceAddress::new(ADDR)).await,
        Err(PairingError::UnknownCandidate { .. })
    ));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_scan_failure_propagates() {
    let scanner = FakeScanner::with_visible(vec![]);
    scanner.fail_next(ScanError::AdapterNotAvailable);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let result = session.start(SessionEntry::Manual).await;
    assert!(matches!(result, Err(PairingError::Scan(ScanError::AdapterNotAvailable))));
    assert_eq!(session.state(), PairingState::Start);
}

#[tokio::test]
async fn test_allow_rescan_policy_keeps_session_restartable() {
    let scanner = FakeScanner::with_visible(vec![]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let config = test_config().with_empty_scan_policy(EmptyScanPolicy::AllowRescan);
    let mut session = session(config, &scanner, &transport, &store);

    let outcome = session.start(SessionEntry::Manual).await.unwrap();
    assert_eq!(outcome, StepOutcome::Aborted(AbortReason::NoDevicesFound));
    assert_eq!(session.state(), PairingState::Start);

    scanner.set_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let (candidates, _) = expect_candidates(session.start(SessionEntry::Manual).await.unwrap());
    assert_eq!(candidates.len(), 1);
    assert_eq!(scanner.scans(), 2);
}

#[tokio::test]
async fn test_rescan_merges_newly_visible_devices() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session.start(SessionEntry::Manual).await.unwrap();

    scanner.set_visible(vec![vendor_sighting(OTHER, DeviceModel::Controller67)]);
    let (candidates, _) = expect_candidates(session.rescan().await.unwrap());

    let addresses: Vec<_> = candidates.iter().map(|c| c.address.to_string()).collect();
    assert_eq!(addresses, vec![OTHER, ADDR]);
}

// ----------------------------------------------------------------------------
// Verification
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_failure_then_retry_succeeds() {
    let scanner = FakeScanner::with_visible(vec![
        vendor_sighting(ADDR, DeviceModel::Controller69),
        vendor_sighting(OTHER, DeviceModel::Controller67),
    ]);
    let transport = FakeTransport::scripted(vec![
        ProbeScript::Fail(TransportErrorKind::Timeout),
        ProbeScript::Respond(payload(DeviceModel::Controller69)),
    ]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let (listed, _) = expect_candidates(session.start(SessionEntry::Manual).await.unwrap());
    let address = DeviceAddress::new(ADDR);

    let (relisted, error) = expect_candidates(session.select(&address).await.unwrap());
    assert_eq!(error, Some(SessionErrorCode::CannotConnect));
    assert_eq!(session.last_error(), Some(SessionErrorCode::CannotConnect));
    assert_eq!(session.state(), PairingState::AwaitingSelection);
    assert_eq!(relisted, listed);
    assert_eq!(transport.closed(), 1);
    assert!(store.registrations().await.is_empty());

    let outcome = session.select(&address).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Completed(ref r) if r.address == address));
    assert_eq!(session.state(), PairingState::Done);
    assert_eq!(session.last_error(), None);
    assert_eq!(transport.closed(), 2);
    assert_eq!(transport.probed(), vec![address.clone(), address]);
}

#[tokio::test]
async fn test_unexpected_failure_annotates_unknown() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::scripted(vec![ProbeScript::Unexpected("gatt cache corrupt".into())]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session.start(SessionEntry::Manual).await.unwrap();
    let (candidates, error) = expect_candidates(session.select(&DeviceAddress::new(ADDR)).await.unwrap());

    assert_eq!(error, Some(SessionErrorCode::Unknown));
    assert_eq!(candidates.len(), 1);
    assert_eq!(transport.closed(), 1);
}

#[tokio::test]
async fn test_registered_between_listing_and_selection_aborts_without_probe() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::scripted(vec![ProbeScript::Respond(payload(DeviceModel::Controller69))]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    let (candidates, _) = expect_candidates(session.start(SessionEntry::Manual).await.unwrap());
    assert_eq!(candidates.len(), 1);

    // Another session wins the race.
    store.create_registration(registration_for(ADDR)).await.unwrap();

    let outcome = session.select(&DeviceAddress::new(ADDR)).await.unwrap();
    assert_eq!(outcome, StepOutcome::Aborted(AbortReason::AlreadyConfigured));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_registered_during_verification_aborts() {
    let gate = Arc::new(Notify::new());
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::gated(
        vec![ProbeScript::Respond(payload(DeviceModel::Controller69))],
        gate.clone(),
    );
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);
    session.start(SessionEntry::Manual).await.unwrap();

    let address = DeviceAddress::new(ADDR);
    let (outcome, _) = tokio::join!(session.select(&address), async {
        transport.wait_for_open().await;
        store.create_registration(registration_for(ADDR)).await.unwrap();
        gate.notify_one();
    });

    assert_eq!(outcome.unwrap(), StepOutcome::Aborted(AbortReason::AlreadyConfigured));
    assert_eq!(transport.closed(), 1);
    assert_eq!(store.registrations().await, vec![registration_for(ADDR)]);
}

#[tokio::test]
async fn test_refreshed_payload_names_registration() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::scripted(vec![ProbeScript::Respond(payload(
        DeviceModel::Controller69ProPlus,
    ))]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session.start(SessionEntry::Manual).await.unwrap();
    let outcome = session.select(&DeviceAddress::new(ADDR)).await.unwrap();

    match outcome {
        StepOutcome::Completed(record) => {
            assert_eq!(record.display_name, "UIS Controller 69 Pro+");
            assert_eq!(record.identity.model_info.model, DeviceModel::Controller69ProPlus);
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_refresh_keeps_advertised_identity() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller67)]);
    let transport = FakeTransport::scripted(vec![ProbeScript::Respond(vec![0x01])]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session.start(SessionEntry::Manual).await.unwrap();
    let outcome = session.select(&DeviceAddress::new(ADDR)).await.unwrap();

    assert!(matches!(outcome, StepOutcome::Completed(ref r) if r.display_name == "Controller 67"));
}

// ----------------------------------------------------------------------------
// Abort and Cancellation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_explicit_abort_ends_session() {
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::scripted(vec![]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);

    session.start(SessionEntry::Manual).await.unwrap();
    assert_eq!(session.abort().unwrap(), StepOutcome::Aborted(AbortReason::Cancelled));
    assert!(session.state().is_terminal());
    assert!(session.candidates().await.unwrap().is_empty());
    assert!(matches!(
        session.select(&DeviceAddress::new(ADDR)).await,
        Err(PairingError::InvalidState { .. })
    ));
    assert!(session.abort().is_err());
}

#[tokio::test]
async fn test_abandoned_verification_still_releases_connection() {
    let gate = Arc::new(Notify::new());
    let scanner = FakeScanner::with_visible(vec![vendor_sighting(ADDR, DeviceModel::Controller69)]);
    let transport = FakeTransport::gated(
        vec![ProbeScript::Respond(payload(DeviceModel::Controller69))],
        gate.clone(),
    );
    let store = Arc::new(MemoryRegistrationStore::new());
    let mut session = session(test_config(), &scanner, &transport, &store);
    session.start(SessionEntry::Manual).await.unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        session.select(&DeviceAddress::new(ADDR)),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(session.state(), PairingState::Verifying);

    gate.notify_one();
    transport.wait_for_closed(1).await;
    assert_eq!(transport.closed(), 1);

    assert_eq!(session.abort().unwrap(), StepOutcome::Aborted(AbortReason::Cancelled));
    assert!(store.registrations().await.is_empty());
}

// ----------------------------------------------------------------------------
// Concurrent Sessions
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_sessions_register_each_address_once() {
    let scanner = FakeScanner::with_visible(vec![
        vendor_sighting(ADDR, DeviceModel::Controller69),
        vendor_sighting(OTHER, DeviceModel::Controller67),
    ]);
    let store = Arc::new(MemoryRegistrationStore::new());
    let first_transport = FakeTransport::scripted(vec![
        ProbeScript::Respond(payload(DeviceModel::Controller69)),
    ]);
    let second_transport = FakeTransport::scripted(vec![
        ProbeScript::Respond(payload(DeviceModel::Controller67)),
    ]);
    let mut first = session(test_config(), &scanner, &first_transport, &store);
    let mut second = session(test_config(), &scanner, &second_transport, &store);

    first.start(SessionEntry::Manual).await.unwrap();
    second.start(SessionEntry::Manual).await.unwrap();

    let first_outcome = first.select(&DeviceAddress::new(ADDR)).await.unwrap();
    assert!(matches!(first_outcome, StepOutcome::Completed(_)));

    // The second session now only offers the remaining device.
    let remaining = second.candidates().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].address, DeviceAddress::new(OTHER));

    let second_outcome = second.select(&DeviceAddress::new(ADDR)).await.unwrap();
    assert_eq!(second_outcome, StepOutcome::Aborted(AbortReason::AlreadyConfigured));
    assert_eq!(second_transport.opened(), 0);
    assert_eq!(store.registrations().await.len(), 1);
}
