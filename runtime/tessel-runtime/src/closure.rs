//! Host-callable wrappers around module closures.
//!
//! A module closure is a `(state, vtable)` pointer pair plus two
//! function-table slots: one that invokes it and one that destroys it. The
//! wrapper clears its state before every invocation so a re-entrant call
//! can never observe a closure that is mid-call or already gone.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::{ArgKind, ClosureShim};
use crate::error::BridgeError;
use crate::guest::{Guest, GuestVal};
use crate::value::HostValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClosureKind {
    /// Consumed by its first invocation.
    Once,
    /// Reference counted; may be invoked any number of times.
    Shared,
}

pub struct Trampoline {
    kind: ClosureKind,
    arg: ArgKind,
    invoke: u32,
    destroy: u32,
    vtable: u32,
    state: Cell<u32>,
    count: Cell<u32>,
}

impl Trampoline {
    pub fn new(shim: &ClosureShim, state: u32, vtable: u32) -> Rc<Self> {
        Rc::new(Self {
            kind: if shim.once {
                ClosureKind::Once
            } else {
                ClosureKind::Shared
            },
            arg: shim.arg,
            invoke: shim.invoke,
            destroy: shim.destroy,
            vtable,
            state: Cell::new(state),
            count: Cell::new(1),
        })
    }

    pub fn kind(&self) -> ClosureKind {
        self.kind
    }

    /// Outstanding references held by the module.
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.count.get() == 0
    }

    pub fn invoke<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        arg: HostValue,
    ) -> Result<Option<GuestVal>, BridgeError> {
        match self.kind {
            ClosureKind::Once => self.invoke_once(guest, arg),
            ClosureKind::Shared => self.invoke_shared(guest, arg),
        }
    }

    fn invoke_once<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        arg: HostValue,
    ) -> Result<Option<GuestVal>, BridgeError> {
        let state = self.state.replace(0);
        if state == 0 {
            return Err(BridgeError::ClosureConsumed);
        }
        self.count.set(0);
        trace!(state, vtable = self.vtable, "invoking single-shot closure");
        let arg = self.marshal(guest, arg);
        let result = self.call_body(guest, state, arg);
        let destroyed = self.run_destructor(guest, state);
        let value = result?;
        destroyed?;
        Ok(value)
    }

    fn invoke_shared<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        arg: HostValue,
    ) -> Result<Option<GuestVal>, BridgeError> {
        if self.is_destroyed() {
            return Err(BridgeError::ClosureConsumed);
        }
        let state = self.state.replace(0);
        if state == 0 {
            return Err(BridgeError::ClosureReentered);
        }
        self.count.set(self.count.get() + 1);
        trace!(state, vtable = self.vtable, count = self.count.get(), "invoking closure");
        let arg = self.marshal(guest, arg);
        let result = self.call_body(guest, state, arg);

        let remaining = self.count.get() - 1;
        self.count.set(remaining);
        if remaining == 0 {
            let destroyed = self.run_destructor(guest, state);
            let value = result?;
            destroyed?;
            Ok(value)
        } else {
            self.state.set(state);
            result
        }
    }

    /// Another module-held reference to this wrapper came into existence.
    pub fn retain(&self) {
        if !self.is_destroyed() {
            self.count.set(self.count.get() + 1);
        }
    }

    /// Drops one module-held reference and runs the destructor when it was
    /// the last. Returns whether the closure was destroyed.
    pub fn release<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<bool, BridgeError> {
        let count = self.count.get();
        if count == 0 {
            return Ok(false);
        }
        self.count.set(count - 1);
        if count > 1 {
            return Ok(false);
        }
        let state = self.state.replace(0);
        self.run_destructor(guest, state)?;
        Ok(true)
    }

    fn marshal<G: Guest + ?Sized>(&self, guest: &mut G, arg: HostValue) -> GuestVal {
        match self.arg {
            ArgKind::Object => GuestVal::handle(guest.bridge_mut().heap.allocate(arg)),
            ArgKind::F64 => GuestVal::F64(match arg {
                HostValue::Number(value) => value,
                HostValue::Bool(value) => f64::from(u8::from(value)),
                _ => f64::NAN,
            }),
        }
    }

    fn run_destructor<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        state: u32,
    ) -> Result<(), BridgeError> {
        debug!(state, vtable = self.vtable, "destroying closure");
        let args = [GuestVal::I32(state as i32), GuestVal::I32(self.vtable as i32)];
        guest.call_indirect(self.destroy, &args).map(drop)
    }

    fn call_body<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        state: u32,
        arg: GuestVal,
    ) -> Result<Option<GuestVal>, BridgeError> {
        let args = [GuestVal::I32(state as i32), GuestVal::I32(self.vtable as i32), arg];
        guest.call_indirect(self.invoke, &args)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::BridgeConfig;
    use crate::sim::SimGuest;

    const INVOKE: u32 = 1;
    const DESTROY: u32 = 2;

    #[derive(Default)]
    struct Log {
        calls: Vec<(i32, i32, GuestVal)>,
        destroyed: Vec<(i32, i32)>,
    }

    fn shim(once: bool, arg: ArgKind) -> ClosureShim {
        ClosureShim {
            import: "__wbindgen_closure_wrapper1".to_string(),
            invoke: INVOKE,
            destroy: DESTROY,
            arg,
            once,
        }
    }

    fn sim_with_log() -> (SimGuest, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut sim = SimGuest::new(BridgeConfig::default());
        let calls = log.clone();
        sim.register(INVOKE, move |_, args| {
            let [GuestVal::I32(a), GuestVal::I32(b), arg] = args else {
                panic!("unexpected args {args:?}");
            };
            calls.borrow_mut().calls.push((*a, *b, *arg));
            Ok(None)
        });
        let destroyed = log.clone();
        sim.register(DESTROY, move |_, args| {
            let [GuestVal::I32(a), GuestVal::I32(b)] = args else {
                panic!("unexpected args {args:?}");
            };
            destroyed.borrow_mut().destroyed.push((*a, *b));
            Ok(None)
        });
        (sim, log)
    }

    #[test]
    fn single_shot_runs_once_then_rejects() {
        let (mut sim, log) = sim_with_log();
        let closure = Trampoline::new(&shim(true, ArgKind::F64), 0x100, 0x200);
        closure.invoke(&mut sim, HostValue::Number(1.5)).unwrap();
        assert!(matches!(
            closure.invoke(&mut sim, HostValue::Number(2.0)),
            Err(BridgeError::ClosureConsumed)
        ));
        let log = log.borrow();
        assert_eq!(log.calls, vec![(0x100, 0x200, GuestVal::F64(1.5))]);
        assert_eq!(log.destroyed, vec![(0x100, 0x200)]);
    }

    #[test]
    fn shared_closure_survives_calls() {
        let (mut sim, log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::F64), 0x100, 0x200);
        for ts in [16.0, 32.0, 48.0] {
            closure.invoke(&mut sim, HostValue::Number(ts)).unwrap();
        }
        assert_eq!(closure.count(), 1);
        assert_eq!(log.borrow().calls.len(), 3);
        assert!(log.borrow().destroyed.is_empty());
    }

    #[test]
    fn destructor_runs_after_last_release() {
        let (mut sim, log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::Object), 0x100, 0x200);
        closure.retain();
        closure.retain();
        assert_eq!(closure.count(), 3);
        assert!(!closure.release(&mut sim).unwrap());
        closure.invoke(&mut sim, HostValue::Null).unwrap();
        assert!(!closure.release(&mut sim).unwrap());
        assert!(log.borrow().destroyed.is_empty());
        assert!(closure.release(&mut sim).unwrap());
        assert_eq!(log.borrow().destroyed, vec![(0x100, 0x200)]);
        assert!(!closure.release(&mut sim).unwrap());
        assert_eq!(log.borrow().destroyed.len(), 1);
    }

    #[test]
    fn object_argument_arrives_as_fresh_handle() {
        let (mut sim, log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::Object), 0x100, 0x200);
        closure.invoke(&mut sim, HostValue::string("click")).unwrap();
        let (_, _, arg) = log.borrow().calls[0];
        let GuestVal::I32(raw) = arg else {
            panic!("expected a handle, got {arg:?}");
        };
        let heap = &sim.bridge().heap;
        assert!(raw as u32 >= heap.layout().threshold());
        assert_eq!(heap.live(), 1);
    }

    #[test]
    fn state_is_cleared_during_invocation() {
        let (mut sim, _log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::F64), 0x100, 0x200);
        let inner = closure.clone();
        let seen = Rc::new(Cell::new(u32::MAX));
        let observed = seen.clone();
        sim.register(INVOKE, move |_, _| {
            observed.set(inner.state.get());
            Ok(None)
        });
        closure.invoke(&mut sim, HostValue::Number(0.0)).unwrap();
        assert_eq!(seen.get(), 0);
        assert_eq!(closure.state.get(), 0x100);
    }

    #[test]
    fn recursive_invocation_is_rejected() {
        let (mut sim, _log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::F64), 0x100, 0x200);
        let inner = closure.clone();
        let nested = Rc::new(RefCell::new(None));
        let nested_result = nested.clone();
        sim.register(INVOKE, move |guest, _| {
            let outcome = inner.invoke(guest, HostValue::Number(1.0));
            let rejected = matches!(outcome, Err(BridgeError::ClosureReentered));
            *nested_result.borrow_mut() = Some(rejected);
            Ok(None)
        });
        closure.invoke(&mut sim, HostValue::Number(0.0)).unwrap();
        assert_eq!(*nested.borrow(), Some(true));
        assert_eq!(closure.count(), 1);
    }

    #[test]
    fn release_during_call_defers_destructor() {
        let (mut sim, log) = sim_with_log();
        let closure = Trampoline::new(&shim(false, ArgKind::F64), 0x100, 0x200);
        let inner = closure.clone();
        sim.register(INVOKE, move |guest, _| {
            assert!(!inner.release(guest)?);
            Ok(None)
        });
        closure.invoke(&mut sim, HostValue::Number(0.0)).unwrap();
        assert!(closure.is_destroyed());
        assert_eq!(log.borrow().destroyed, vec![(0x100, 0x200)]);
    }
}
