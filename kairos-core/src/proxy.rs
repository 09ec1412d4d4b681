//! ## kairos-core::proxy
//! **Scheduling plain objects through the controller**
//!
//! [`wrap`] registers an ordinary value behind a [`Proxy`] entity. Calls made
//! through the returned reference are dispatched as events like any entity
//! call, and the wrapped value receives a plain synchronous
//! [`Proxied::invoke`] once its turn comes.
//!
//! The interface declarations passed to `wrap` are checked up front: an
//! operation is either fire-and-forget (no return value, no declared
//! failures) or explicitly marked blocking. Every violation across every
//! interface is reported at once.

use std::any::TypeId;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::controller::Sim;
use crate::entity::{short_type_name, Context, Entity, Failure, Handler, Operation, Ref, Reply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("invalid proxy interface: {}", .0.join("; "))]
    InvalidInterface(Vec<String>),

    #[error("operation {0} is not declared by any proxied interface")]
    Undeclared(&'static str),
}

/// Implemented by the wrapped value for every operation it accepts.
pub trait Proxied<M: Operation> {
    fn invoke(&mut self, op: M) -> Result<M::Output, Failure>;
}

/// Declared shape of one proxied operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    operation: TypeId,
    pub name: &'static str,
    pub returns_value: bool,
    pub declares_failures: bool,
    pub blocking: bool,
}

impl Signature {
    /// Signature of `M`; a non-unit output counts as returning a value.
    pub fn of<M: Operation>() -> Self {
        Self {
            operation: TypeId::of::<M>(),
            name: M::name(),
            returns_value: TypeId::of::<M::Output>() != TypeId::of::<()>(),
            declares_failures: false,
            blocking: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.declares_failures = true;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    fn violations(&self, interface: &str) -> Vec<String> {
        let mut found = Vec::new();
        if !self.blocking && self.returns_value {
            found.push(format!("{interface}.{}: non-blocking operation returns a value", self.name));
        }
        if !self.blocking && self.declares_failures {
            found.push(format!("{interface}.{}: non-blocking operation declares failures", self.name));
        }
        found
    }
}

/// A named group of operation signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub name: &'static str,
    pub operations: Vec<Signature>,
}

impl InterfaceDecl {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            operations: Vec::new(),
        }
    }

    pub fn with(mut self, signature: Signature) -> Self {
        self.operations.push(signature);
        self
    }
}

/// Entity wrapper around a value that knows nothing about scheduling.
pub struct Proxy<T> {
    target: T,
    interfaces: Vec<&'static str>,
    declared: BTreeSet<TypeId>,
}

impl<T> Proxy<T> {
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Matched by type; operations sharing a name stay distinct.
    pub fn declares<M: Operation>(&self) -> bool {
        self.declared.contains(&TypeId::of::<M>())
    }
}

impl<T: 'static> Entity for Proxy<T> {
    fn describe(&self) -> String {
        format!(
            "proxy({}: {})",
            short_type_name::<T>(),
            self.interfaces.join(", ")
        )
    }
}

impl<T, M> Handler<M> for Proxy<T>
where
    T: Proxied<M> + 'static,
    M: Operation,
{
    fn handle(&mut self, op: M, _cx: &mut Context<'_, Self, M::Output>) -> Reply<M::Output> {
        if !self.declares::<M>() {
            return Reply::err(ProxyError::Undeclared(M::name()));
        }
        Reply::Ready(self.target.invoke(op))
    }
}

/// Validate `interfaces` and register `target` behind a proxy entity.
pub fn wrap<T: 'static>(
    sim: &Sim,
    target: T,
    interfaces: &[InterfaceDecl],
) -> Result<Ref<Proxy<T>>, ProxyError> {
    let mut violations: Vec<String> = interfaces
        .iter()
        .flat_map(|iface| {
            iface
                .operations
                .iter()
                .flat_map(move |sig| sig.violations(iface.name))
        })
        .collect();
    if interfaces.is_empty() {
        violations.push("no interface declared".to_owned());
    }
    if !violations.is_empty() {
        return Err(ProxyError::InvalidInterface(violations));
    }

    let proxy = Proxy {
        target,
        interfaces: interfaces.iter().map(|iface| iface.name).collect(),
        declared: interfaces
            .iter()
            .flat_map(|iface| iface.operations.iter().map(|sig| sig.operation))
            .collect(),
    };
    Ok(sim.create(proxy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Account {
        balance: i64,
    }

    struct Deposit(i64);
    struct Withdraw(i64);
    struct Balance;

    impl Operation for Deposit {
        type Output = ();
    }
    impl Operation for Withdraw {
        type Output = i64;
    }
    impl Operation for Balance {
        type Output = i64;
    }

    impl Proxied<Deposit> for Account {
        fn invoke(&mut self, op: Deposit) -> Result<(), Failure> {
            self.balance += op.0;
            Ok(())
        }
    }

    impl Proxied<Withdraw> for Account {
        fn invoke(&mut self, op: Withdraw) -> Result<i64, Failure> {
            if op.0 > self.balance {
                return Err(anyhow!("insufficient funds"));
            }
            self.balance -= op.0;
            Ok(self.balance)
        }
    }

    impl Proxied<Balance> for Account {
        fn invoke(&mut self, _op: Balance) -> Result<i64, Failure> {
            Ok(self.balance)
        }
    }

    fn bank() -> InterfaceDecl {
        InterfaceDecl::new("Bank")
            .with(Signature::of::<Deposit>())
            .with(Signature::of::<Withdraw>().failing().blocking())
    }

    #[test]
    fn every_violation_is_reported() {
        let sim = Sim::new();
        let bad = InterfaceDecl::new("Bad")
            .with(Signature::of::<Balance>())
            .with(Signature::of::<Deposit>().failing());
        let also_bad = InterfaceDecl::new("AlsoBad").with(Signature::of::<Withdraw>().failing());

        let err = wrap(&sim, Account::default(), &[bad, bank(), also_bad]).unwrap_err();
        let ProxyError::InvalidInterface(violations) = err else {
            panic!("expected an interface error");
        };
        assert_eq!(violations.len(), 4);
        assert!(violations[0].starts_with("Bad.Balance"));
        assert!(violations.iter().any(|v| v.contains("Deposit") && v.contains("failures")));
        assert!(violations
            .iter()
            .filter(|v| v.starts_with("AlsoBad.Withdraw"))
            .count()
            == 2);
    }

    #[test]
    fn empty_interface_list_is_rejected() {
        let sim = Sim::new();
        assert!(matches!(
            wrap(&sim, Account::default(), &[]),
            Err(ProxyError::InvalidInterface(_))
        ));
    }

    #[test]
    fn proxied_calls_run_as_events() {
        let sim = Sim::new();
        let account = wrap(&sim, Account::default(), &[bank()]).unwrap();
        assert_eq!(sim.describe(account.raw()).unwrap(), "proxy(Account: Bank)");

        sim.send_after(account, Deposit(50), 3).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        sim.run_at(5, move |sim| {
            log.borrow_mut().push(sim.with(account, |p| p.target().balance)?);
            Ok(())
        })
        .unwrap();

        sim.run().unwrap();
        assert_eq!(*seen.borrow(), vec![50]);
    }

    mod ledger {
        pub struct Get;
        impl crate::entity::Operation for Get {
            type Output = ();
        }
    }

    mod audit {
        pub struct Get;
        impl crate::entity::Operation for Get {
            type Output = ();
        }
    }

    impl Proxied<ledger::Get> for Account {
        fn invoke(&mut self, _op: ledger::Get) -> Result<(), Failure> {
            Ok(())
        }
    }

    impl Proxied<audit::Get> for Account {
        fn invoke(&mut self, _op: audit::Get) -> Result<(), Failure> {
            Ok(())
        }
    }

    #[test]
    fn same_named_operations_are_declared_separately() {
        let sim = Sim::new();
        let iface = InterfaceDecl::new("Ledger").with(Signature::of::<ledger::Get>());
        let account = wrap(&sim, Account::default(), &[iface]).unwrap();
        assert!(sim.with(account, |p| p.declares::<ledger::Get>()).unwrap());
        assert!(!sim.with(account, |p| p.declares::<audit::Get>()).unwrap());

        sim.send(account, ledger::Get).unwrap();
        sim.send(account, audit::Get).unwrap();
        let err = sim.run().unwrap_err();
        assert_eq!(
            err.failure().and_then(|f| f.downcast_ref::<ProxyError>()),
            Some(&ProxyError::Undeclared("Get"))
        );
    }

    #[test]
    fn undeclared_operation_aborts_the_run() {
        let sim = Sim::new();
        let account = wrap(&sim, Account::default(), &[bank()]).unwrap();
        sim.send(account, Balance).unwrap();
        let err = sim.run().unwrap_err();
        let failure = err.failure().expect("application failure");
        assert_eq!(
            failure.downcast_ref::<ProxyError>(),
            Some(&ProxyError::Undeclared("Balance"))
        );
    }
}
