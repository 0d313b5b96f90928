//! Property-based tests for the trust engine.
//!
//! These tests drive the engine with arbitrary event sequences and verify:
//!
//! - Trust always stays in [0, 1]
//! - There is at most one coordinator, and it is eligible
//! - Blacklisting is permanent
//! - Elections are deterministic

use proptest::prelude::*;

use crate::election::{elect_coordinator, is_eligible};
use crate::{ConnectionRequest, Device, DeviceProfile, DeviceType, OwnershipType, TrustEngine};
use chrono::Utc;

const IDS: [&str; 5] = ["rsu-1", "pc-1", "pc-2", "phone-1", "sensor-1"];

#[derive(Clone, Debug)]
enum Event {
    Connect(usize, usize, bool),
    Rate(usize, usize, f64),
    Leave(usize),
    Rejoin(usize),
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        6 => (0..IDS.len(), 0..IDS.len(), any::<bool>()).prop_map(|(a, b, s)| Event::Connect(a, b, s)),
        3 => (0..IDS.len(), 0..IDS.len(), 0.0f64..=1.0).prop_map(|(a, b, s)| Event::Rate(a, b, s)),
        1 => (0..IDS.len()).prop_map(Event::Leave),
        1 => (0..IDS.len()).prop_map(Event::Rejoin),
    ]
}

fn profile(index: usize) -> DeviceProfile {
    let (device_type, ownership, memory) = match index {
        0 => (DeviceType::Rsu, OwnershipType::Internal, 16.0),
        1 | 2 => (DeviceType::Computer, OwnershipType::Internal, 8.0),
        3 => (DeviceType::Smartphone, OwnershipType::External, 4.0),
        _ => (DeviceType::Sensor, OwnershipType::Internal, 1.0),
    };
    DeviceProfile::new(IDS[index], device_type, ownership, memory)
}

fn populated_engine() -> TrustEngine {
    let engine = TrustEngine::default();
    for index in 0..IDS.len() {
        let _ = engine.register_device(profile(index));
    }
    engine
}

fn apply(engine: &TrustEngine, event: &Event) {
    // Refusals are part of the property: they must not corrupt state.
    let _ = match event {
        Event::Connect(a, b, success) => engine
            .record_connection(ConnectionRequest::new(IDS[*a], IDS[*b], *success))
            .map(|_| ()),
        Event::Rate(a, b, score) => engine
            .submit_rating(IDS[*a], IDS[*b], *score, None)
            .map(|_| ()),
        Event::Leave(a) => engine.leave_device(IDS[*a]).map(|_| ()),
        Event::Rejoin(a) => engine.register_device(profile(*a)).map(|_| ()),
    };
}

// ==================== Engine Invariant Property Tests ====================

proptest! {
    /// Trust stays in range and structural invariants hold after every event.
    #[test]
    fn invariants_hold_over_event_sequences(events in prop::collection::vec(event_strategy(), 1..60)) {
        let engine = populated_engine();
        for event in &events {
            apply(&engine, event);
            prop_assert!(engine.check_invariants().is_ok());
            for device in engine.devices() {
                prop_assert!((0.0..=1.0).contains(&device.trust()));
            }
        }
    }

    /// The coordinator, if any, is always eligible.
    #[test]
    fn coordinator_is_eligible(events in prop::collection::vec(event_strategy(), 1..60)) {
        let engine = populated_engine();
        for event in &events {
            apply(&engine, event);
            if let Some(id) = engine.coordinator() {
                let device = engine.device(&id).unwrap();
                prop_assert!(is_eligible(&device, engine.config().trust_threshold()));
            }
        }
    }

    /// A blacklisted device never comes back.
    #[test]
    fn blacklisting_is_permanent(events in prop::collection::vec(event_strategy(), 1..60)) {
        let engine = populated_engine();
        let mut blacklisted: Vec<String> = Vec::new();
        for event in &events {
            apply(&engine, event);
            for id in &blacklisted {
                let device = engine.device(id).unwrap();
                prop_assert!(device.is_blacklisted);
                prop_assert!(!device.is_active);
            }
            for device in engine.devices() {
                if device.is_blacklisted && !blacklisted.contains(&device.id) {
                    blacklisted.push(device.id);
                }
            }
        }
    }
}

// ==================== Election Property Tests ====================

fn device_strategy() -> impl Strategy<Value = Device> {
    (
        "[a-z]{1,6}",
        prop_oneof![
            Just(DeviceType::Rsu),
            Just(DeviceType::Computer),
            Just(DeviceType::Smartphone),
        ],
        any::<bool>(),
        any::<bool>(),
        0.0f64..=1.0,
    )
        .prop_map(|(id, device_type, internal, active, trust)| {
            let ownership = if internal {
                OwnershipType::Internal
            } else {
                OwnershipType::External
            };
            let mut device =
                Device::from_profile(DeviceProfile::new(id, device_type, ownership, 8.0), trust, Utc::now());
            device.is_active = active;
            device
        })
}

proptest! {
    /// Input order does not change the winner.
    #[test]
    fn election_is_order_independent(devices in prop::collection::vec(device_strategy(), 0..12)) {
        let forward = elect_coordinator(devices.iter(), None, 0.3);
        let backward = elect_coordinator(devices.iter().rev(), None, 0.3);
        prop_assert_eq!(forward.coordinator(), backward.coordinator());
    }

    /// A winner exists exactly when some device is eligible.
    #[test]
    fn election_finds_eligible_device(devices in prop::collection::vec(device_strategy(), 0..12)) {
        let outcome = elect_coordinator(devices.iter(), None, 0.3);
        let any_eligible = devices.iter().any(|d| is_eligible(d, 0.3));
        prop_assert_eq!(outcome.coordinator().is_some(), any_eligible);
    }
}
