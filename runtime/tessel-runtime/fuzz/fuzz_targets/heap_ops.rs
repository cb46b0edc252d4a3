#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tessel_runtime::boundary::calls::{object_clone_ref, object_drop_ref};
use tessel_runtime::{BridgeConfig, BridgeError, Guest, HostValue, SimGuest};

#[derive(Arbitrary, Debug)]
enum Op {
    Number(f64),
    Drop(u16),
    Clone(u16),
    Take(u16),
    Raw(u32),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut sim = SimGuest::new(BridgeConfig::default());
    let mut live: Vec<u32> = Vec::new();
    for op in ops {
        match op {
            Op::Number(value) => live.push(sim.bridge_mut().add(HostValue::Number(value))),
            Op::Drop(pick) if !live.is_empty() => {
                let raw = live.swap_remove(pick as usize % live.len());
                object_drop_ref(&mut sim, raw).expect("live handle");
            }
            Op::Clone(pick) if !live.is_empty() => {
                let raw = live[pick as usize % live.len()];
                live.push(object_clone_ref(&mut sim, raw).expect("live handle"));
            }
            Op::Take(pick) if !live.is_empty() => {
                let raw = live.swap_remove(pick as usize % live.len());
                let bridge = sim.bridge_mut();
                assert!(matches!(bridge.take(raw), Ok(HostValue::Number(_))));
                assert!(matches!(bridge.value(raw), Err(BridgeError::StaleHandle(_))));
            }
            Op::Raw(raw) => {
                // Arbitrary handles either resolve or report staleness.
                let _ = sim.bridge().value(raw);
            }
            _ => {}
        }
        assert_eq!(sim.bridge().heap.live(), live.len());
    }
});
